// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::DtmConfig;
use crate::dtm::INTERRUPT_BIT;
use crate::dtm::handshake::CommandPort;
use crate::error::DtmError;
use crate::geometry::{DMINFO_ADDRESS, RamWindow, TargetGeometry};
use crate::log_and_return;
use crate::riscv::Xlen;
use crate::riscv::program::Program;

/// Smallest debug RAM the XLEN probe and the CSR programs can run in
pub const MIN_RAM_WORDS: usize = 6;

/// A fully initialised handle on a target's debug module, with its geometry discovered
pub struct DebugTarget
{
	port: CommandPort,
	geometry: TargetGeometry,
	dminfo: u32,
	program_timeout: Option<Duration>,
}

impl DebugTarget
{
	/// Read `dminfo` to size the debug RAM window, then run the XLEN probe on the hart
	pub fn initialize(mut port: CommandPort, config: &DtmConfig) -> Result<Self, DtmError>
	{
		// Start by finding out how much debug RAM there is to work with
		let dminfo = port.read(DMINFO_ADDRESS)? as u32;
		let window = RamWindow::from_dminfo(dminfo);
		if window.words() < MIN_RAM_WORDS {
			return Err(DtmError::RamWindowTooSmall {
				ram_words: window.words(),
				required: MIN_RAM_WORDS,
			});
		}

		// Now use that to have the hart tell us how wide it is
		let probe = Program::xlen_probe(&window);
		let xlen = Xlen::try_from(run_program(&mut port, &window, &probe, config.program_timeout)?)?;
		info!("dminfo {:#x}: {} words of debug RAM, {} hart", dminfo, window.words(), xlen);

		Ok(Self {
			port,
			geometry: TargetGeometry::new(window, xlen),
			dminfo,
			program_timeout: config.program_timeout,
		})
	}

	pub fn geometry(&self) -> &TargetGeometry
	{
		&self.geometry
	}

	pub fn dminfo(&self) -> u32
	{
		self.dminfo
	}

	pub fn xlen(&self) -> Xlen
	{
		self.geometry.xlen()
	}

	pub fn ram_words(&self) -> usize
	{
		self.geometry.ram_words()
	}

	pub fn chunk_align(&self) -> usize
	{
		self.geometry.chunk_align()
	}

	pub fn chunk_max_size(&self) -> usize
	{
		self.geometry.chunk_max_size()
	}

	/// Raw debug bus read
	pub fn read(&mut self, address: u32) -> Result<u64, DtmError>
	{
		self.port.read(address)
	}

	/// Raw debug bus write
	pub fn write(&mut self, address: u32, data: u64) -> Result<u64, DtmError>
	{
		self.port.write(address, data)
	}

	pub fn nop(&mut self) -> Result<(), DtmError>
	{
		self.port.nop()
	}

	/// Upload a program, start it and wait for it to complete, returning its result slot
	pub fn run_program(&mut self, program: &Program) -> Result<u32, DtmError>
	{
		run_program(&mut self.port, self.geometry.window(), program, self.program_timeout)
	}

	/// Read `dst.len()` bytes of target memory at `address` through a single program run
	pub fn read_chunk(&mut self, address: u64, dst: &mut [u8]) -> Result<(), DtmError>
	{
		let program = Program::read_chunk(&self.geometry, address, dst.len())?;
		let result_word = program.result_slot();

		// The first word comes back as the program's result, the rest are read out of RAM
		let mut words = Vec::with_capacity(dst.len() / 4);
		words.push(self.run_program(&program)?);
		for index in 1..dst.len() / 4 {
			words.push(self.port.read((result_word + index) as u32)? as u32);
		}

		for (bytes, word) in dst.chunks_exact_mut(4).zip(words) {
			bytes.copy_from_slice(&word.to_le_bytes());
		}
		Ok(())
	}

	/// Write `src` to target memory at `address` through a single program run
	pub fn write_chunk(&mut self, address: u64, src: &[u8]) -> Result<(), DtmError>
	{
		let program = Program::write_chunk(&self.geometry, address, src)?;
		self.run_program(&program)?;
		Ok(())
	}

	/// Read target memory of any aligned length, one chunk-sized program at a time
	pub fn read_memory(&mut self, address: u64, dst: &mut [u8]) -> Result<(), DtmError>
	{
		let step = self.memory_step(dst.len())?;
		for (index, chunk) in dst.chunks_mut(step).enumerate() {
			let chunk_address = self.offset_address(address, index * step)?;
			self.read_chunk(chunk_address, chunk)?;
		}
		Ok(())
	}

	/// Write target memory of any aligned length, one chunk-sized program at a time
	pub fn write_memory(&mut self, address: u64, src: &[u8]) -> Result<(), DtmError>
	{
		let step = self.memory_step(src.len())?;
		for (index, chunk) in src.chunks(step).enumerate() {
			let chunk_address = self.offset_address(address, index * step)?;
			self.write_chunk(chunk_address, chunk)?;
		}
		Ok(())
	}

	pub fn write_csr(&mut self, csr: u16, value: u64) -> Result<(), DtmError>
	{
		debug!("Writing CSR {:#05x} <- {:#x}", csr, value);
		let program = Program::write_csr(&self.geometry, csr, value);
		self.run_program(&program)?;
		Ok(())
	}

	pub fn read_csr(&mut self, csr: u16) -> Result<u64, DtmError>
	{
		let program = Program::read_csr(&self.geometry, csr);
		let mut value = u64::from(self.run_program(&program)?);
		// On RV64 the upper half sits in the following RAM word
		if self.xlen() == Xlen::Rv64 {
			let high = self.port.read((program.result_slot() + 1) as u32)? as u32;
			value |= u64::from(high) << 32;
		}
		debug!("Read CSR {:#05x} -> {:#x}", csr, value);
		Ok(value)
	}

	/// Give back the underlying command port, e.g. to keep issuing raw bus transactions
	pub fn into_port(self) -> CommandPort
	{
		self.port
	}

	fn offset_address(&self, address: u64, offset: usize) -> Result<u64, DtmError>
	{
		address.checked_add(offset as u64).ok_or(DtmError::AddressTooWide {
			address,
			xlen: self.xlen(),
		})
	}

	fn memory_step(&self, length: usize) -> Result<usize, DtmError>
	{
		let align = self.chunk_align();
		let max = self.chunk_max_size();
		if length % align != 0 {
			return Err(DtmError::MisalignedChunk {
				length,
				align,
			});
		}
		if max == 0 {
			return Err(DtmError::ChunkTooLarge {
				length,
				max,
			});
		}
		Ok(max)
	}
}

/// The execution engine: write the program into RAM word by word, tagging the last word with the
/// interrupt bit to set the hart going, then spin on the result slot until the tag clears
fn run_program(
	port: &mut CommandPort,
	window: &RamWindow,
	program: &Program,
	timeout: Option<Duration>,
) -> Result<u32, DtmError>
{
	program.validate(window)?;
	debug!("Running {} word program, result in word {}", program.len(), program.result_slot());

	let last = program.len().saturating_sub(1);
	for (index, &word) in program.words().iter().enumerate() {
		let tag = if index == last { INTERRUPT_BIT } else { 0 };
		port.write(index as u32, u64::from(word) | tag)?;
	}

	let deadline = timeout.map(|timeout| Instant::now() + timeout);
	loop {
		let data = port.read(program.result_slot() as u32)?;
		if data & INTERRUPT_BIT == 0 {
			return Ok(data as u32);
		}
		if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			// The hart may still be running out of debug RAM, so nothing else can be uploaded safely
			port.poison();
			log_and_return!(DtmError::Timeout {
				operation: "debug program completion",
			});
		}
	}
}
