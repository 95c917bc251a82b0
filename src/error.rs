// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Module for error handling code.

use thiserror::Error;

use crate::riscv::Xlen;

#[derive(Debug, Error)]
pub enum DtmError
{
	#[error("Debug bus transaction to address {address:#x} failed with status {status}, transport is now desynchronised")]
	ProtocolDesync
	{
		/// The debug bus address the failing request targeted
		address: u32,
		/// The non-zero status the transport answered with
		status: u32,
	},

	#[error("Debug transport was desynchronised by an earlier failure and cannot be used further")]
	Desynchronised,

	#[error("Chunk of {length} bytes exceeds the {max} byte maximum this debug RAM window can transfer")]
	ChunkTooLarge
	{
		length: usize,
		max: usize,
	},

	#[error("Chunk length {length} is not a multiple of the {align} byte target word")]
	MisalignedChunk
	{
		length: usize,
		align: usize,
	},

	#[error("Target address {address:#x} is not aligned to the {align} byte target word")]
	MisalignedAddress
	{
		address: u64,
		align: usize,
	},

	#[error("Target address {address:#x} does not fit in the address space of an {xlen} target")]
	AddressTooWide
	{
		address: u64,
		xlen: Xlen,
	},

	#[error("Zero-length chunk requested")]
	EmptyChunk,

	#[error("Program of {words} words does not fit in the {ram_words} word debug RAM")]
	ProgramTooLarge
	{
		words: usize,
		ram_words: usize,
	},

	#[error("Result slot {slot} lies outside the {ram_words} word debug RAM")]
	ResultSlotOutOfRange
	{
		slot: usize,
		ram_words: usize,
	},

	#[error("Debug RAM of {ram_words} words is too small, at least {required} are needed")]
	RamWindowTooSmall
	{
		ram_words: usize,
		required: usize,
	},

	#[error("Target reported an XLEN of {0}, expected 32 or 64")]
	UnsupportedXlen(u32),

	#[error("Timed out waiting for {operation}")]
	Timeout
	{
		/// What was being waited on (e.g. `"debug bus response"`)
		operation: &'static str,
	},

	#[error("The other side of the debug transport handshake has gone away")]
	Disconnected,

	#[error("Transport delivered a response while no request was outstanding")]
	UnexpectedResponse,

	#[error("Response mailbox still holds a response the command side never consumed")]
	ResponseOverrun,
}

impl DtmError
{
	/// Whether this error leaves the request/response sequence unrecoverable
	pub fn is_desync(&self) -> bool
	{
		matches!(
			self,
			DtmError::ProtocolDesync { .. } | DtmError::Desynchronised | DtmError::UnexpectedResponse
		)
	}
}

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	}
}
