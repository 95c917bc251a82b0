// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::time::Duration;

use proptest::prelude::*;
use rvdtm::geometry::{BUS_RAM_WORDS, RamWindow, TargetGeometry};
use rvdtm::riscv::Xlen;
use rvdtm::riscv::encoding::*;
use rvdtm::riscv::program::Program;
use rvdtm::sim::{DebugModule, Harness, SimConfig};
use rvdtm::{DebugTarget, DtmConfig};

fn xlen_strategy() -> impl Strategy<Value = Xlen>
{
	prop_oneof![Just(Xlen::Rv32), Just(Xlen::Rv64)]
}

proptest! {
	#[test]
	fn itype_round_trip(offset in -2048i32..2048)
	{
		let imm = encode_itype_imm(offset);
		prop_assert_eq!(imm & 0x000f_ffff, 0);
		prop_assert_eq!(decode_itype_imm(imm), offset);
	}

	#[test]
	fn stype_round_trip(offset in -2048i32..2048)
	{
		let imm = encode_stype_imm(offset);
		// rs1, rs2, funct3 and the opcode must be left alone
		prop_assert_eq!(imm & 0x01ff_f07f, 0);
		prop_assert_eq!(decode_stype_imm(imm), offset);
	}

	#[test]
	fn sbtype_round_trip(half in -2048i32..2048)
	{
		let offset = half * 2;
		let imm = encode_sbtype_imm(offset);
		prop_assert_eq!(imm & 0x01ff_f07f, 0);
		prop_assert_eq!(decode_sbtype_imm(imm), offset);
	}

	#[test]
	fn utype_round_trip(upper in any::<i32>())
	{
		let offset = upper & !0xfff;
		let imm = encode_utype_imm(offset);
		prop_assert_eq!(imm & 0xfff, 0);
		prop_assert_eq!(decode_utype_imm(imm), offset);
	}

	#[test]
	fn ujtype_round_trip(half in -(1i32 << 19)..(1i32 << 19))
	{
		let offset = half * 2;
		let imm = encode_ujtype_imm(offset);
		prop_assert_eq!(imm & 0xfff, 0);
		prop_assert_eq!(decode_ujtype_imm(imm), offset);
	}

	#[test]
	fn chunk_max_size_monotonic(ram_words in 1usize..64, xlen in xlen_strategy())
	{
		let smaller = TargetGeometry::new(RamWindow::new(ram_words), xlen);
		let larger = TargetGeometry::new(RamWindow::new(ram_words + 1), xlen);
		prop_assert!(smaller.chunk_max_size() <= larger.chunk_max_size());
	}

	#[test]
	fn max_chunk_programs_fit(ram_words in 10usize..=64, xlen in xlen_strategy(), address in 0u64..0x1000_0000)
	{
		let geometry = TargetGeometry::new(RamWindow::new(ram_words), xlen);
		let max = geometry.chunk_max_size();
		let address = address & !(geometry.chunk_align() as u64 - 1);
		let read = Program::read_chunk(&geometry, address, max).unwrap();
		prop_assert!(read.validate(geometry.window()).is_ok());
		let write = Program::write_chunk(&geometry, address, &vec![0xa5; max]).unwrap();
		prop_assert!(write.validate(geometry.window()).is_ok());
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(16))]

	#[test]
	fn write_chunk_then_read_chunk(
		xlen in xlen_strategy(),
		ram_words in 10usize..=BUS_RAM_WORDS,
		units in 1usize..=4,
		address in 0u64..0x1000_0000,
		bytes in prop::collection::vec(any::<u8>(), 16),
	)
	{
		let config = DtmConfig::default()
			.with_response_timeout(Duration::from_secs(10))
			.with_program_timeout(Duration::from_secs(10));
		let (port, tick) = rvdtm::channel(&config);
		let harness = Harness::spawn(tick, DebugModule::new(SimConfig {
			xlen,
			ram_words,
			..SimConfig::default()
		}));
		let mut target = DebugTarget::initialize(port, &config).unwrap();

		let align = target.chunk_align();
		let length = (units * align).min(target.chunk_max_size());
		let address = address & !(align as u64 - 1);
		let data = &bytes[..length];

		target.write_chunk(address, data).unwrap();
		let mut readback = vec![0; length];
		target.read_chunk(address, &mut readback).unwrap();
		prop_assert_eq!(&readback[..], data);

		drop(target);
		harness.join().unwrap();
	}
}
