// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Synthesis of the small programs the target runs out of debug RAM.
//!
//! Every program is a flat list of RAM words: instructions first, then any data the program
//! needs, with a single result slot the execution engine polls once the program is started.
//! All programs end their instruction stream with a jump back into the debug ROM.

use crate::error::DtmError;
use crate::geometry::{RamWindow, TargetGeometry};
use crate::riscv::{self, CSR_MISA, S0, S1, Xlen, ZERO};

/// RAM word holding CSR values in both directions
const CSR_DATA_WORD: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program
{
	words: Vec<u32>,
	result_slot: usize,
}

impl Program
{
	pub fn new(words: Vec<u32>, result_slot: usize) -> Self
	{
		Self {
			words,
			result_slot,
		}
	}

	pub fn words(&self) -> &[u32]
	{
		&self.words
	}

	/// The RAM word the execution engine polls for completion and the result
	pub fn result_slot(&self) -> usize
	{
		self.result_slot
	}

	pub fn len(&self) -> usize
	{
		self.words.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.words.is_empty()
	}

	/// Check the program and its result slot both fit the RAM window
	pub fn validate(&self, window: &RamWindow) -> Result<(), DtmError>
	{
		if self.words.len() > window.words() {
			return Err(DtmError::ProgramTooLarge {
				words: self.words.len(),
				ram_words: window.words(),
			});
		}
		if self.result_slot >= window.words() {
			return Err(DtmError::ResultSlotOutOfRange {
				slot: self.result_slot,
				ram_words: window.words(),
			});
		}
		Ok(())
	}

	/// Discover the hart's XLEN: reads `misa`, turns its sign into a shift of 32 and
	/// stores 32 or 64 into RAM word 0. Only 32-bit accesses are used so this runs on either width.
	pub fn xlen_probe(window: &RamWindow) -> Self
	{
		let words = vec![
			riscv::csrrs(S0, CSR_MISA, ZERO),
			riscv::addi(S1, ZERO, 32),
			riscv::slti(S0, S0, 0),
			riscv::sll(S1, S1, S0),
			riscv::store_word(S1, ZERO, window.base() as i32),
			jump_to_rom(window, 5),
		];
		Self::new(words, 0)
	}

	/// Build a program copying `length` bytes from target memory at `address` into the RAM
	/// window. The first result word lands in the result slot, the rest in the words after it.
	pub fn read_chunk(geometry: &TargetGeometry, address: u64, length: usize) -> Result<Self, DtmError>
	{
		validate_chunk(geometry, address, length)?;
		let window = geometry.window();
		let xlen = geometry.xlen();
		let align = geometry.chunk_align();

		// The target address is parked in the result area as that is only written after it's loaded
		let result_word = 2 + (length / align) * 2;
		let addr_word = result_word;
		let mut words = vec![0; addr_word + xlen.ram_words()];

		words[0] = riscv::load(xlen, S0, ZERO, window.word_address(addr_word) as i32);
		for unit in 0..length / align {
			let offset = (unit * align) as i32;
			words[2 * unit + 1] = riscv::load(xlen, S1, S0, offset);
			words[2 * unit + 2] = riscv::store(xlen, S1, ZERO, window.word_address(result_word) as i32 + offset);
		}
		words[result_word - 1] = jump_to_rom(window, result_word - 1);
		place_address(&mut words[addr_word..], xlen, address);

		Ok(Self::new(words, result_word))
	}

	/// Build a program copying `data` into target memory at `address`, carrying the data along
	/// in the RAM window after the instructions.
	pub fn write_chunk(geometry: &TargetGeometry, address: u64, data: &[u8]) -> Result<Self, DtmError>
	{
		validate_chunk(geometry, address, data.len())?;
		let window = geometry.window();
		let xlen = geometry.xlen();
		let align = geometry.chunk_align();

		let data_word = 2 + (data.len() / align) * 2;
		let addr_word = data_word + data.len() / 4;
		let mut words = vec![0; addr_word + xlen.ram_words()];

		for (word, bytes) in words[data_word..addr_word].iter_mut().zip(data.chunks_exact(4)) {
			*word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
		}

		words[0] = riscv::load(xlen, S0, ZERO, window.word_address(addr_word) as i32);
		for unit in 0..data.len() / align {
			let offset = (unit * align) as i32;
			words[2 * unit + 1] = riscv::load(xlen, S1, ZERO, window.word_address(data_word) as i32 + offset);
			words[2 * unit + 2] = riscv::store(xlen, S1, S0, offset);
		}
		words[data_word - 1] = jump_to_rom(window, data_word - 1);
		place_address(&mut words[addr_word..], xlen, address);

		Ok(Self::new(words, data_word))
	}

	/// Build a program loading `value` from the RAM window and moving it into `csr`
	pub fn write_csr(geometry: &TargetGeometry, csr: u16, value: u64) -> Self
	{
		let window = geometry.window();
		let xlen = geometry.xlen();
		let mut words = vec![
			riscv::load(xlen, S0, ZERO, window.word_address(CSR_DATA_WORD) as i32),
			riscv::csrrw(ZERO, csr, S0),
			jump_to_rom(window, 2),
			0,
			value as u32,
		];
		if xlen == Xlen::Rv64 {
			words.push((value >> 32) as u32);
		}
		Self::new(words, 0)
	}

	/// Build a program storing the value of `csr` into the RAM window. On RV64 the upper
	/// half lands in the word after the result slot.
	pub fn read_csr(geometry: &TargetGeometry, csr: u16) -> Self
	{
		let window = geometry.window();
		let words = vec![
			riscv::csrrs(S0, csr, ZERO),
			riscv::store(geometry.xlen(), S0, ZERO, window.word_address(CSR_DATA_WORD) as i32),
			jump_to_rom(window, 2),
		];
		Self::new(words, CSR_DATA_WORD)
	}
}

/// `jal x0` from RAM word `from_word` back into the debug ROM
fn jump_to_rom(window: &RamWindow, from_word: usize) -> u32
{
	let offset = window.rom_return() as i64 - i64::from(window.word_address(from_word));
	riscv::jal(ZERO, offset as i32)
}

fn place_address(words: &mut [u32], xlen: Xlen, address: u64)
{
	words[0] = address as u32;
	if xlen == Xlen::Rv64 {
		words[1] = (address >> 32) as u32;
	}
}

fn validate_chunk(geometry: &TargetGeometry, address: u64, length: usize) -> Result<(), DtmError>
{
	let align = geometry.chunk_align();
	let max = geometry.chunk_max_size();
	if length == 0 {
		return Err(DtmError::EmptyChunk);
	}
	if length % align != 0 {
		return Err(DtmError::MisalignedChunk {
			length,
			align,
		});
	}
	if length > max {
		return Err(DtmError::ChunkTooLarge {
			length,
			max,
		});
	}
	if address % align as u64 != 0 {
		return Err(DtmError::MisalignedAddress {
			address,
			align,
		});
	}
	// The end of the transfer must also be addressable by the hart
	let limit = match geometry.xlen() {
		Xlen::Rv32 => u64::from(u32::MAX),
		Xlen::Rv64 => u64::MAX,
	};
	let last = address.checked_add(length as u64 - 1);
	if last.is_none_or(|last| last > limit) {
		return Err(DtmError::AddressTooWide {
			address,
			xlen: geometry.xlen(),
		});
	}
	Ok(())
}
