// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The handful of RISC-V instructions the debug RAM programs are built from

use std::fmt::{self, Display, Formatter};

use crate::error::DtmError;
use crate::riscv::encoding::{encode_itype_imm, encode_stype_imm, encode_ujtype_imm};

pub mod encoding;
pub mod program;

pub const OPCODE_LOAD: u32 = 0x03;
pub const OPCODE_OP_IMM: u32 = 0x13;
pub const OPCODE_STORE: u32 = 0x23;
pub const OPCODE_OP: u32 = 0x33;
pub const OPCODE_JAL: u32 = 0x6f;
pub const OPCODE_SYSTEM: u32 = 0x73;

pub const FUNCT3_ADDI: u32 = 0;
pub const FUNCT3_SLL: u32 = 1;
pub const FUNCT3_SLTI: u32 = 2;
pub const FUNCT3_ANDI: u32 = 7;
pub const FUNCT3_WORD: u32 = 2;
pub const FUNCT3_DOUBLE: u32 = 3;
pub const FUNCT3_CSRRW: u32 = 1;
pub const FUNCT3_CSRRS: u32 = 2;

/// Integer register numbers used by the synthesized programs
pub type Register = u32;

pub const ZERO: Register = 0;
pub const S0: Register = 8;
pub const S1: Register = 9;

/// The machine ISA CSR (`mcpuid` in the v1.9 privileged architecture) whose top bits identify the base XLEN
pub const CSR_MISA: u16 = 0xf10;

/// Native integer register width of the target hart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Xlen
{
	Rv32,
	Rv64,
}

impl Xlen
{
	pub fn bits(self) -> u32
	{
		match self {
			Xlen::Rv32 => 32,
			Xlen::Rv64 => 64,
		}
	}

	/// Width of a target word in bytes, which is also the alignment every chunk transfer obeys
	pub fn bytes(self) -> usize
	{
		self.bits() as usize / 8
	}

	/// How many 32-bit debug RAM words one target word occupies
	pub fn ram_words(self) -> usize
	{
		self.bits() as usize / 32
	}

	fn access_funct3(self) -> u32
	{
		match self {
			Xlen::Rv32 => FUNCT3_WORD,
			Xlen::Rv64 => FUNCT3_DOUBLE,
		}
	}
}

impl TryFrom<u32> for Xlen
{
	type Error = DtmError;

	fn try_from(value: u32) -> Result<Self, Self::Error>
	{
		match value {
			32 => Ok(Xlen::Rv32),
			64 => Ok(Xlen::Rv64),
			_ => Err(DtmError::UnsupportedXlen(value)),
		}
	}
}

impl Display for Xlen
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
	{
		write!(f, "RV{}", self.bits())
	}
}

fn itype(opcode: u32, funct3: u32, rd: Register, rs1: Register, imm: i32) -> u32
{
	opcode | (rd << 7) | (funct3 << 12) | (rs1 << 15) | encode_itype_imm(imm)
}

fn stype(opcode: u32, funct3: u32, rs1: Register, rs2: Register, imm: i32) -> u32
{
	opcode | (funct3 << 12) | (rs1 << 15) | (rs2 << 20) | encode_stype_imm(imm)
}

/// `lw`/`ld rd, offset(rs1)` depending on the target word width
pub fn load(xlen: Xlen, rd: Register, rs1: Register, offset: i32) -> u32
{
	itype(OPCODE_LOAD, xlen.access_funct3(), rd, rs1, offset)
}

/// `lw rd, offset(rs1)` regardless of the target word width
pub fn load_word(rd: Register, rs1: Register, offset: i32) -> u32
{
	itype(OPCODE_LOAD, FUNCT3_WORD, rd, rs1, offset)
}

/// `sw`/`sd rs2, offset(rs1)` depending on the target word width
pub fn store(xlen: Xlen, rs2: Register, rs1: Register, offset: i32) -> u32
{
	stype(OPCODE_STORE, xlen.access_funct3(), rs1, rs2, offset)
}

/// `sw rs2, offset(rs1)` regardless of the target word width
pub fn store_word(rs2: Register, rs1: Register, offset: i32) -> u32
{
	stype(OPCODE_STORE, FUNCT3_WORD, rs1, rs2, offset)
}

pub fn addi(rd: Register, rs1: Register, imm: i32) -> u32
{
	itype(OPCODE_OP_IMM, FUNCT3_ADDI, rd, rs1, imm)
}

pub fn slti(rd: Register, rs1: Register, imm: i32) -> u32
{
	itype(OPCODE_OP_IMM, FUNCT3_SLTI, rd, rs1, imm)
}

pub fn sll(rd: Register, rs1: Register, rs2: Register) -> u32
{
	OPCODE_OP | (rd << 7) | (FUNCT3_SLL << 12) | (rs1 << 15) | (rs2 << 20)
}

pub fn jal(rd: Register, offset: i32) -> u32
{
	OPCODE_JAL | (rd << 7) | encode_ujtype_imm(offset)
}

/// `csrrw rd, csr, rs1` - the CSR number lives in the I-type immediate field
pub fn csrrw(rd: Register, csr: u16, rs1: Register) -> u32
{
	itype(OPCODE_SYSTEM, FUNCT3_CSRRW, rd, rs1, i32::from(csr))
}

/// `csrrs rd, csr, rs1`, which with `rs1 = x0` is a plain CSR read
pub fn csrrs(rd: Register, csr: u16, rs1: Register) -> u32
{
	itype(OPCODE_SYSTEM, FUNCT3_CSRRS, rd, rs1, i32::from(csr))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn instruction_words()
	{
		assert_eq!(load(Xlen::Rv32, S0, ZERO, 0), 0x00002403);
		assert_eq!(load(Xlen::Rv64, S0, ZERO, 0), 0x00003403);
		assert_eq!(load(Xlen::Rv32, S1, S0, 0), 0x00042483);
		assert_eq!(load(Xlen::Rv64, S1, S0, 0), 0x00043483);
		assert_eq!(store(Xlen::Rv32, S1, ZERO, 0), 0x00902023);
		assert_eq!(store(Xlen::Rv64, S1, S0, 0), 0x00943023);
		assert_eq!(store(Xlen::Rv64, S0, ZERO, 0), 0x00803023);
		assert_eq!(csrrs(S0, 0, ZERO), 0x00002473);
		assert_eq!(csrrw(ZERO, 0, S0), 0x00041073);
		assert_eq!(jal(ZERO, 0x3fc), 0x3fc0006f);
	}

	#[test]
	fn csr_numbers_are_unsigned()
	{
		// CSR numbers above 0x7ff must not be mangled by the signed immediate path
		assert_eq!(csrrs(S0, CSR_MISA, ZERO), 0xf1002473);
	}

	#[test]
	fn xlen_conversion()
	{
		assert_eq!(Xlen::try_from(32).unwrap(), Xlen::Rv32);
		assert_eq!(Xlen::try_from(64).unwrap(), Xlen::Rv64);
		assert!(matches!(Xlen::try_from(128), Err(DtmError::UnsupportedXlen(128))));
		assert_eq!(Xlen::Rv64.to_string(), "RV64");
		assert_eq!(Xlen::Rv32.ram_words(), 1);
		assert_eq!(Xlen::Rv64.bytes(), 8);
	}
}
