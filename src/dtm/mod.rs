// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

pub mod handshake;
pub mod target;

/// Out-of-band tag carried alongside debug RAM words: set on the last program word written to
/// start execution, and read back set for as long as the hart is still running the program
pub const INTERRUPT_BIT: u64 = 0x2_0000_0000;

/// The kinds of transaction the debug bus supports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum Operation
{
	#[default]
	Nop = 0,
	Read = 1,
	Write = 2,
}

/// One debug bus transaction, as presented on the transport's request channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Request
{
	pub address: u32,
	pub operation: Operation,
	pub data: u64,
}

/// The transport's answer to a [`Request`]; any non-zero status is a failure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Response
{
	pub status: u32,
	pub data: u64,
}

impl Request
{
	pub fn nop() -> Self
	{
		Self::default()
	}

	pub fn read(address: u32) -> Self
	{
		Self {
			address,
			operation: Operation::Read,
			data: 0,
		}
	}

	pub fn write(address: u32, data: u64) -> Self
	{
		Self {
			address,
			operation: Operation::Write,
			data,
		}
	}
}

impl Response
{
	pub fn ok(data: u64) -> Self
	{
		Self {
			status: 0,
			data,
		}
	}

	pub fn is_ok(&self) -> bool
	{
		self.status == 0
	}
}
