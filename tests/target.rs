// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

#[cfg(test)]
mod tests
{
	use std::time::Duration;

	use color_eyre::eyre::Result;
	use rvdtm::geometry::{BUS_RAM_WORDS, MAX_RAM_WORDS};
	use rvdtm::riscv::program::Program;
	use rvdtm::riscv::{self, CSR_MISA, Xlen, ZERO};
	use rvdtm::sim::{DebugModule, Harness, SimConfig};
	use rvdtm::{DebugTarget, DtmConfig, DtmError};

	const PATTERN: [u32; 4] = [0x00abcdef, 0x00fedcba, 0x01234567, 0x76543210];

	fn config() -> DtmConfig
	{
		DtmConfig::default()
			.with_response_timeout(Duration::from_secs(10))
			.with_program_timeout(Duration::from_secs(10))
	}

	fn sim(xlen: Xlen, ram_words: usize) -> SimConfig
	{
		SimConfig {
			xlen,
			ram_words,
			..SimConfig::default()
		}
	}

	fn start(sim: SimConfig) -> Result<(DebugTarget, Harness)>
	{
		let config = config();
		let (port, tick) = rvdtm::channel(&config);
		let harness = Harness::spawn(tick, DebugModule::new(sim));
		let target = DebugTarget::initialize(port, &config)?;
		Ok((target, harness))
	}

	fn finish(target: DebugTarget, harness: Harness) -> Result<DebugModule>
	{
		drop(target);
		Ok(harness.join()?)
	}

	fn pattern_bytes() -> Vec<u8>
	{
		PATTERN.iter().flat_map(|word| word.to_le_bytes()).collect()
	}

	#[test]
	fn initialize_discovers_geometry() -> Result<()>
	{
		for xlen in [Xlen::Rv32, Xlen::Rv64] {
			let (target, harness) = start(sim(xlen, 16))?;
			assert_eq!(target.xlen(), xlen);
			assert_eq!(target.ram_words(), 16);
			assert_eq!(target.dminfo(), 15 << 10);
			assert_eq!(target.chunk_align(), xlen.bytes());
			finish(target, harness)?;
		}
		Ok(())
	}

	#[test]
	fn bus_write_then_read() -> Result<()>
	{
		let (mut target, harness) = start(sim(Xlen::Rv64, 16))?;
		assert_eq!(target.write(0x1000, 0x42)?, 0x42);
		assert_eq!(target.read(0x1000)?, 0x42);
		target.nop()?;
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn run_program_returns_result_slot() -> Result<()>
	{
		let (mut target, harness) = start(sim(Xlen::Rv64, 16))?;
		// Pre-load the result slot with a sentinel, then run a program that only returns to the ROM
		target.write(1, 0xdead_beef)?;
		let program = Program::new(vec![riscv::jal(ZERO, 0x404)], 1);
		assert_eq!(target.run_program(&program)?, 0xdead_beef);
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn chunk_round_trip() -> Result<()>
	{
		for xlen in [Xlen::Rv32, Xlen::Rv64] {
			let (mut target, harness) = start(sim(xlen, 16))?;
			target.write_chunk(0x8000_0000, &pattern_bytes())?;
			let mut readback = [0u8; 16];
			target.read_chunk(0x8000_0000, &mut readback)?;
			assert_eq!(readback[..], pattern_bytes()[..]);

			let module = finish(target, harness)?;
			assert_eq!(module.hart().read_memory(0x8000_0000, 16), pattern_bytes());
		}
		Ok(())
	}

	#[test]
	fn read_chunk_sees_target_memory() -> Result<()>
	{
		let config = config();
		let (port, tick) = rvdtm::channel(&config);
		let mut module = DebugModule::new(sim(Xlen::Rv32, 16));
		module.hart_mut().write_memory(0x1000, &pattern_bytes());
		let harness = Harness::spawn(tick, module);
		let mut target = DebugTarget::initialize(port, &config)?;

		let mut chunk = [0u8; 8];
		target.read_chunk(0x1008, &mut chunk)?;
		assert_eq!(chunk[..], pattern_bytes()[8..]);
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn memory_spanning_several_chunks() -> Result<()>
	{
		for xlen in [Xlen::Rv32, Xlen::Rv64] {
			let (mut target, harness) = start(sim(xlen, 16))?;
			let data: Vec<u8> = (0..48).collect();
			target.write_memory(0x2000, &data)?;
			let mut readback = vec![0; data.len()];
			target.read_memory(0x2000, &mut readback)?;
			assert_eq!(readback, data);
			finish(target, harness)?;
		}
		Ok(())
	}

	#[test]
	fn csr_round_trip() -> Result<()>
	{
		let (mut target, harness) = start(sim(Xlen::Rv64, 16))?;
		target.write_csr(0x7b0, 0x1122_3344_5566_7788)?;
		assert_eq!(target.read_csr(0x7b0)?, 0x1122_3344_5566_7788);
		// Both halves of a 64-bit CSR must make it back
		assert_eq!(target.read_csr(CSR_MISA)?, 2 << 62);
		let module = finish(target, harness)?;
		assert_eq!(module.hart().csr(0x7b0), 0x1122_3344_5566_7788);

		let (mut target, harness) = start(sim(Xlen::Rv32, 16))?;
		target.write_csr(0x7b0, 0x1122_3344_5566_7788)?;
		assert_eq!(target.read_csr(0x7b0)?, 0x5566_7788);
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn oversized_chunk_rejected_before_transport() -> Result<()>
	{
		let (mut target, harness) = start(sim(Xlen::Rv64, 16))?;
		let mut buffer = [0u8; 24];
		assert!(matches!(
			target.read_chunk(0x1000, &mut buffer),
			Err(DtmError::ChunkTooLarge { length: 24, max: 16 })
		));
		// The handshake is untouched, so the target keeps working
		target.read_chunk(0x1000, &mut buffer[..16])?;
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn failed_status_desynchronises() -> Result<()>
	{
		let faulting = SimConfig {
			fault_address: Some(0x30),
			..sim(Xlen::Rv64, 16)
		};
		let (mut target, harness) = start(faulting)?;
		assert!(matches!(target.read(0x30), Err(DtmError::ProtocolDesync { address: 0x30, .. })));
		assert!(matches!(target.read(0x1000), Err(DtmError::Desynchronised)));
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn largest_bus_mapped_ram() -> Result<()>
	{
		for xlen in [Xlen::Rv32, Xlen::Rv64] {
			// Anything larger is cut back so the RAM stays clear of dmcontrol and dminfo
			for ram_words in [BUS_RAM_WORDS, MAX_RAM_WORDS] {
				let (mut target, harness) = start(sim(xlen, ram_words))?;
				assert_eq!(target.ram_words(), BUS_RAM_WORDS);
				let data: Vec<u8> = (0..target.chunk_max_size() as u8).collect();
				target.write_chunk(0x3000, &data)?;
				let mut readback = vec![0; data.len()];
				target.read_chunk(0x3000, &mut readback)?;
				assert_eq!(readback, data);
				finish(target, harness)?;
			}
		}
		Ok(())
	}

	#[test]
	fn too_little_debug_ram()
	{
		let config = config();
		let (port, tick) = rvdtm::channel(&config);
		let harness = Harness::spawn(tick, DebugModule::new(sim(Xlen::Rv64, 4)));
		let result = DebugTarget::initialize(port, &config);
		assert!(matches!(result, Err(DtmError::RamWindowTooSmall { ram_words: 4, required: 6 })));
		assert!(harness.join().is_ok());
	}

	#[test]
	fn runaway_program_times_out() -> Result<()>
	{
		let config = DtmConfig::default()
			.with_response_timeout(Duration::from_secs(10))
			.with_program_timeout(Duration::from_millis(50));
		let (port, tick) = rvdtm::channel(&config);
		let harness = Harness::spawn(tick, DebugModule::new(sim(Xlen::Rv64, 16)));
		let mut target = DebugTarget::initialize(port, &config)?;

		// jal x0, 0 spins in place forever
		let program = Program::new(vec![riscv::jal(ZERO, 0)], 0);
		assert!(matches!(target.run_program(&program), Err(DtmError::Timeout { .. })));
		// The hart is still spinning in debug RAM, so nothing more may be sent
		assert!(matches!(target.read(0x1000), Err(DtmError::Desynchronised)));
		assert!(matches!(target.run_program(&program), Err(DtmError::Desynchronised)));
		finish(target, harness)?;
		Ok(())
	}

	#[test]
	fn randomized_bus_timing() -> Result<()>
	{
		for seed in 0..4 {
			let slow = SimConfig {
				ready_probability: 0.3,
				max_latency: 5,
				seed,
				..sim(Xlen::Rv64, 16)
			};
			let (mut target, harness) = start(slow)?;
			let data: Vec<u8> = (0..target.chunk_max_size() as u8).rev().collect();
			target.write_chunk(0x4000, &data)?;
			let mut readback = vec![0; data.len()];
			target.read_chunk(0x4000, &mut readback)?;
			assert_eq!(readback, data);
			finish(target, harness)?;
		}
		Ok(())
	}
}
