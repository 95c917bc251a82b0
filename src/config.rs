// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::time::Duration;

/// Deadlines applied at the points where the driver would otherwise wait forever.
/// A `None` deadline means wait indefinitely, which is only sensible in a trusted co-simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DtmConfig
{
	/// How long a command waits for the transport's response to its request
	pub response_timeout: Option<Duration>,
	/// How long a tick in the idle state waits for the command side to queue a request
	/// before giving the clock back with request-valid low
	pub claim_timeout: Option<Duration>,
	/// How long the execution engine polls for a program to finish. A program that overruns this
	/// leaves the hart running out of debug RAM, so the handle refuses further commands afterwards.
	pub program_timeout: Option<Duration>,
}

impl DtmConfig
{
	pub fn with_response_timeout(mut self, timeout: Duration) -> Self
	{
		self.response_timeout = Some(timeout);
		self
	}

	pub fn with_claim_timeout(mut self, timeout: Duration) -> Self
	{
		self.claim_timeout = Some(timeout);
		self
	}

	pub fn with_program_timeout(mut self, timeout: Duration) -> Self
	{
		self.program_timeout = Some(timeout);
		self
	}
}
