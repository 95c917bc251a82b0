// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Packing and unpacking of the five RISC-V immediate formats.
//!
//! The encoders take any offset and place only the bits each format holds, so callers are
//! responsible for picking offsets that fit. The decoders sign extend from the format's top bit.

/// Extract `width` bits of `value` starting at bit `shift`
const fn field(value: u32, shift: u32, width: u32) -> u32
{
	(value >> shift) & ((1 << width) - 1)
}

/// Sign extend the low `width` bits of `value`
const fn sign_extend(value: u32, width: u32) -> i32
{
	((value << (32 - width)) as i32) >> (32 - width)
}

/// I-type: offset[11:0] in bits 31:20
pub const fn encode_itype_imm(offset: i32) -> u32
{
	field(offset as u32, 0, 12) << 20
}

/// S-type: offset[4:0] in bits 11:7, offset[11:5] in bits 31:25
pub const fn encode_stype_imm(offset: i32) -> u32
{
	let offset = offset as u32;
	(field(offset, 0, 5) << 7) | (field(offset, 5, 7) << 25)
}

/// SB-type (branches): offset[11] in bit 7, offset[4:1] in bits 11:8, offset[10:5] in bits 30:25
/// and offset[12] in bit 31. Bit 0 is implicitly zero.
pub const fn encode_sbtype_imm(offset: i32) -> u32
{
	let offset = offset as u32;
	(field(offset, 1, 4) << 8) | (field(offset, 5, 6) << 25) | (field(offset, 11, 1) << 7) | (field(offset, 12, 1) << 31)
}

/// U-type: offset[31:12] in bits 31:12
pub const fn encode_utype_imm(offset: i32) -> u32
{
	field(offset as u32, 12, 20) << 12
}

/// UJ-type (jumps): offset[20] in bit 31, offset[10:1] in bits 30:21, offset[11] in bit 20 and
/// offset[19:12] in bits 19:12. Bit 0 is implicitly zero.
pub const fn encode_ujtype_imm(offset: i32) -> u32
{
	let offset = offset as u32;
	(field(offset, 1, 10) << 21) | (field(offset, 11, 1) << 20) | (field(offset, 12, 8) << 12) | (field(offset, 20, 1) << 31)
}

pub const fn decode_itype_imm(insn: u32) -> i32
{
	sign_extend(field(insn, 20, 12), 12)
}

pub const fn decode_stype_imm(insn: u32) -> i32
{
	sign_extend(field(insn, 7, 5) | (field(insn, 25, 7) << 5), 12)
}

pub const fn decode_sbtype_imm(insn: u32) -> i32
{
	let imm = (field(insn, 8, 4) << 1) | (field(insn, 25, 6) << 5) | (field(insn, 7, 1) << 11) | (field(insn, 31, 1) << 12);
	sign_extend(imm, 13)
}

pub const fn decode_utype_imm(insn: u32) -> i32
{
	(insn & 0xfffff000) as i32
}

pub const fn decode_ujtype_imm(insn: u32) -> i32
{
	let imm =
		(field(insn, 21, 10) << 1) | (field(insn, 20, 1) << 11) | (field(insn, 12, 8) << 12) | (field(insn, 31, 1) << 20);
	sign_extend(imm, 21)
}
