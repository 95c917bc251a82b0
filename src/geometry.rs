// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use crate::riscv::Xlen;

/// Debug bus address of the `dmcontrol` register, the first one past the directly mapped RAM
pub const DMCONTROL_ADDRESS: u32 = 0x10;
/// Debug bus address of the `dminfo` register, which describes the debug RAM
pub const DMINFO_ADDRESS: u32 = 0x11;
/// Where the debug RAM lives in the hart's address space
pub const DEBUG_RAM_BASE: u32 = 0x400;
/// The debug ROM entry every program must jump back to once done
pub const DEBUG_ROM_RETURN: u32 = 0x804;
/// The largest debug RAM the 6-bit `dminfo` size field can describe
pub const MAX_RAM_WORDS: usize = 64;
/// RAM words reachable at debug bus addresses below `dmcontrol`
pub const BUS_RAM_WORDS: usize = DMCONTROL_ADDRESS as usize;

/// The debug RAM window programs get uploaded into and executed from, as described by `dminfo`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RamWindow
{
	/// Hart address of the first RAM word
	base: u32,
	/// Hart address of the debug ROM return point
	rom_return: u32,
	/// Size of the window in 32-bit words
	words: usize,
}

impl RamWindow
{
	pub fn new(words: usize) -> Self
	{
		Self {
			base: DEBUG_RAM_BASE,
			rom_return: DEBUG_ROM_RETURN,
			words,
		}
	}

	/// Decode the RAM size field (bits 15:10, stored as size minus one) from a `dminfo` value
	pub fn from_dminfo(dminfo: u32) -> Self
	{
		Self::new((((dminfo >> 10) & 63) + 1) as usize)
	}

	/// Encode this window's size into the `dminfo` RAM size field
	pub fn dminfo_size_field(&self) -> u32
	{
		((self.words.saturating_sub(1) as u32) & 63) << 10
	}

	pub fn base(&self) -> u32
	{
		self.base
	}

	pub fn rom_return(&self) -> u32
	{
		self.rom_return
	}

	pub fn words(&self) -> usize
	{
		self.words
	}

	/// Hart address of the given RAM word
	pub fn word_address(&self, word: usize) -> u32
	{
		self.base + (word as u32) * 4
	}

	/// Whether a hart address falls inside the window
	pub fn contains(&self, address: u64) -> bool
	{
		let base = u64::from(self.base);
		address >= base && address < base + (self.words as u64) * 4
	}
}

/// Everything the program synthesizer needs to know about the target, fixed once discovered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetGeometry
{
	window: RamWindow,
	xlen: Xlen,
}

impl TargetGeometry
{
	pub fn new(window: RamWindow, xlen: Xlen) -> Self
	{
		Self {
			window,
			xlen,
		}
	}

	pub fn window(&self) -> &RamWindow
	{
		&self.window
	}

	pub fn xlen(&self) -> Xlen
	{
		self.xlen
	}

	pub fn ram_words(&self) -> usize
	{
		self.window.words()
	}

	/// Chunk lengths and target addresses must be multiples of this many bytes
	pub fn chunk_align(&self) -> usize
	{
		self.xlen.bytes()
	}

	/// The largest transfer one chunk program can perform while it and its
	/// data fit the RAM window
	pub fn chunk_max_size(&self) -> usize
	{
		let ram_words = self.ram_words();
		match self.xlen {
			Xlen::Rv32 => 4 * (ram_words.saturating_sub(4) / 3),
			Xlen::Rv64 => 8 * (ram_words.saturating_sub(6) / 4),
		}
	}
}
