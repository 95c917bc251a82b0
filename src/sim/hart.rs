// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! A hart model that only knows the instructions the debug RAM programs are built from.

use std::collections::{BTreeMap, HashMap};

use log::{trace, warn};

use crate::geometry::RamWindow;
use crate::riscv::encoding::{decode_itype_imm, decode_stype_imm, decode_ujtype_imm};
use crate::riscv::{
	CSR_MISA, FUNCT3_ADDI, FUNCT3_ANDI, FUNCT3_CSRRS, FUNCT3_CSRRW, FUNCT3_DOUBLE, FUNCT3_SLL, FUNCT3_SLTI, FUNCT3_WORD,
	OPCODE_JAL, OPCODE_LOAD, OPCODE_OP, OPCODE_OP_IMM, OPCODE_STORE, OPCODE_SYSTEM, Xlen,
};

pub struct Hart
{
	xlen: Xlen,
	window: RamWindow,
	/// Debug RAM contents, as seen both by the hart and the debug bus
	ram: Vec<u32>,
	/// Everything outside the debug RAM, sparse
	memory: BTreeMap<u64, u8>,
	csrs: HashMap<u16, u64>,
	regs: [u64; 32],
	pc: u64,
	running: bool,
	faulted: bool,
}

impl Hart
{
	pub fn new(xlen: Xlen, window: RamWindow) -> Self
	{
		// misa's top two bits hold the base ISA width: 1 for RV32, 2 for RV64
		let misa = match xlen {
			Xlen::Rv32 => 1 << 30,
			Xlen::Rv64 => 2 << 62,
		};
		Self {
			xlen,
			window,
			ram: vec![0; window.words()],
			memory: BTreeMap::new(),
			csrs: HashMap::from([(CSR_MISA, misa)]),
			regs: [0; 32],
			pc: 0,
			running: false,
			faulted: false,
		}
	}

	pub fn ram_word(&self, index: usize) -> u32
	{
		self.ram[index]
	}

	pub fn set_ram_word(&mut self, index: usize, value: u32)
	{
		self.ram[index] = value;
	}

	/// Enter debug RAM at its first word, as the debug ROM does on a debug interrupt
	pub fn start(&mut self)
	{
		self.pc = u64::from(self.window.base());
		self.running = true;
		self.faulted = false;
	}

	pub fn is_running(&self) -> bool
	{
		self.running
	}

	/// Whether the last program hit something this model does not execute
	pub fn faulted(&self) -> bool
	{
		self.faulted
	}

	pub fn csr(&self, csr: u16) -> u64
	{
		self.csrs.get(&csr).copied().unwrap_or(0)
	}

	pub fn set_csr(&mut self, csr: u16, value: u64)
	{
		let value = self.truncate(value);
		self.csrs.insert(csr, value);
	}

	pub fn read_memory(&self, address: u64, length: usize) -> Vec<u8>
	{
		(0..length as u64).map(|offset| self.read_byte(address + offset)).collect()
	}

	pub fn write_memory(&mut self, address: u64, data: &[u8])
	{
		for (offset, &byte) in data.iter().enumerate() {
			self.write_byte(address + offset as u64, byte);
		}
	}

	/// Execute one instruction, if the hart is running
	pub fn step(&mut self)
	{
		if !self.running {
			return;
		}
		if !self.window.contains(self.pc) {
			self.fault("fetch outside debug RAM");
			return;
		}
		let insn = self.load(self.pc, 4) as u32;
		trace!("Hart executing {:#010x} at {:#x}", insn, self.pc);
		let next_pc = self.pc + 4;

		let opcode = insn & 0x7f;
		let rd = ((insn >> 7) & 0x1f) as usize;
		let funct3 = (insn >> 12) & 7;
		let rs1 = ((insn >> 15) & 0x1f) as usize;
		let rs2 = ((insn >> 20) & 0x1f) as usize;
		let funct7 = insn >> 25;

		match (opcode, funct3) {
			(OPCODE_LOAD, FUNCT3_WORD) => {
				let address = self.effective_address(rs1, decode_itype_imm(insn));
				let value = self.load(address, 4) as u32 as i32 as i64 as u64;
				self.set_reg(rd, value);
			},
			(OPCODE_LOAD, FUNCT3_DOUBLE) if self.xlen == Xlen::Rv64 => {
				let address = self.effective_address(rs1, decode_itype_imm(insn));
				let value = self.load(address, 8);
				self.set_reg(rd, value);
			},
			(OPCODE_STORE, FUNCT3_WORD) => {
				let address = self.effective_address(rs1, decode_stype_imm(insn));
				self.store(address, self.regs[rs2], 4);
			},
			(OPCODE_STORE, FUNCT3_DOUBLE) if self.xlen == Xlen::Rv64 => {
				let address = self.effective_address(rs1, decode_stype_imm(insn));
				self.store(address, self.regs[rs2], 8);
			},
			(OPCODE_OP_IMM, FUNCT3_ADDI) => {
				let value = self.regs[rs1].wrapping_add(decode_itype_imm(insn) as i64 as u64);
				self.set_reg(rd, value);
			},
			(OPCODE_OP_IMM, FUNCT3_SLTI) => {
				let value = ((self.regs[rs1] as i64) < i64::from(decode_itype_imm(insn))) as u64;
				self.set_reg(rd, value);
			},
			(OPCODE_OP_IMM, FUNCT3_ANDI) => {
				let value = self.regs[rs1] & decode_itype_imm(insn) as i64 as u64;
				self.set_reg(rd, value);
			},
			(OPCODE_OP, FUNCT3_SLL) if funct7 == 0 => {
				let shift_mask = u64::from(self.xlen.bits() - 1);
				let value = self.regs[rs1] << (self.regs[rs2] & shift_mask);
				self.set_reg(rd, value);
			},
			(OPCODE_SYSTEM, FUNCT3_CSRRW | FUNCT3_CSRRS) => {
				let csr = (insn >> 20) as u16;
				let old = self.csr(csr);
				if funct3 == FUNCT3_CSRRW {
					self.set_csr(csr, self.regs[rs1]);
				} else if rs1 != 0 {
					self.set_csr(csr, old | self.regs[rs1]);
				}
				self.set_reg(rd, old);
			},
			(OPCODE_JAL, _) => {
				let target = self.pc.wrapping_add(decode_ujtype_imm(insn) as i64 as u64);
				self.set_reg(rd, next_pc);
				if target == u64::from(self.window.rom_return()) {
					// Back in the debug ROM, which drops the debug interrupt
					self.running = false;
				}
				self.pc = target;
				return;
			},
			_ => {
				self.fault("unsupported instruction");
				return;
			},
		}
		self.pc = next_pc;
	}

	fn fault(&mut self, reason: &str)
	{
		warn!("Hart fault at {:#x}: {}", self.pc, reason);
		self.running = false;
		self.faulted = true;
	}

	fn set_reg(&mut self, reg: usize, value: u64)
	{
		if reg != 0 {
			self.regs[reg] = self.truncate(value);
		}
	}

	/// Keep register values in canonical form, sign extended from bit 31 on RV32
	fn truncate(&self, value: u64) -> u64
	{
		match self.xlen {
			Xlen::Rv32 => value as u32 as i32 as i64 as u64,
			Xlen::Rv64 => value,
		}
	}

	fn effective_address(&self, base: usize, offset: i32) -> u64
	{
		let address = self.regs[base].wrapping_add(offset as i64 as u64);
		match self.xlen {
			Xlen::Rv32 => address & 0xffff_ffff,
			Xlen::Rv64 => address,
		}
	}

	fn load(&self, address: u64, width: usize) -> u64
	{
		(0..width).rev().fold(0, |value, offset| (value << 8) | u64::from(self.read_byte(address + offset as u64)))
	}

	fn store(&mut self, address: u64, value: u64, width: usize)
	{
		for offset in 0..width {
			self.write_byte(address + offset as u64, (value >> (offset * 8)) as u8);
		}
	}

	fn read_byte(&self, address: u64) -> u8
	{
		if self.window.contains(address) {
			let offset = (address - u64::from(self.window.base())) as usize;
			(self.ram[offset / 4] >> ((offset % 4) * 8)) as u8
		} else {
			self.memory.get(&address).copied().unwrap_or(0)
		}
	}

	fn write_byte(&mut self, address: u64, byte: u8)
	{
		if self.window.contains(address) {
			let offset = (address - u64::from(self.window.base())) as usize;
			let shift = (offset % 4) * 8;
			let word = &mut self.ram[offset / 4];
			*word = (*word & !(0xff << shift)) | (u32::from(byte) << shift);
		} else {
			self.memory.insert(address, byte);
		}
	}
}
