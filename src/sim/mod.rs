// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! A simulated debug transport and target, clocked from a background thread, for exercising
//! the driver without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::panic;
use std::thread::{self, JoinHandle};

use log::{debug, error};

use crate::dtm::handshake::{DtmTick, TickInputs};
use crate::error::DtmError;
use crate::riscv::Xlen;

pub mod hart;
pub mod module;

pub use module::DebugModule;

/// Shape and timing behaviour of the simulated target
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimConfig
{
	pub xlen: Xlen,
	/// Debug RAM size in words, between 1 and the 16 mapped below `dmcontrol`
	pub ram_words: usize,
	/// Chance of the transport offering request-ready on any given clock
	pub ready_probability: f64,
	/// Upper bound on the clocks between accepting a request and presenting its response
	pub max_latency: u32,
	/// How many instructions the hart retires per clock
	pub instructions_per_clock: usize,
	pub seed: u64,
	/// Debug bus address every request to which fails with a non-zero status
	pub fault_address: Option<u32>,
}

impl Default for SimConfig
{
	fn default() -> Self
	{
		Self {
			xlen: Xlen::Rv64,
			ram_words: 16,
			ready_probability: 1.0,
			max_latency: 0,
			instructions_per_clock: 1,
			seed: 0,
			fault_address: None,
		}
	}
}

/// Background clock driving a [`DtmTick`] against a [`DebugModule`]. The clock stops once the
/// command side of the handshake is dropped.
pub struct Harness
{
	stop: Arc<AtomicBool>,
	thread: Option<JoinHandle<Result<DebugModule, DtmError>>>,
}

impl Harness
{
	pub fn spawn(mut tick: DtmTick, mut module: DebugModule) -> Self
	{
		Self::with_clock(move |stop| {
			let mut inputs = TickInputs::default();
			let mut cycles = 0u64;
			while !stop.load(Ordering::Relaxed) {
				let outputs = match tick.tick(&inputs) {
					Ok(outputs) => outputs,
					Err(DtmError::Disconnected) => break,
					Err(err) => {
						error!("Simulation clock stopped after {} cycles: {}", cycles, err);
						return Err(err);
					},
				};
				inputs = module.clock(&outputs);
				cycles += 1;
			}
			debug!("Simulation clock ran for {} cycles", cycles);
			Ok(module)
		})
	}

	fn with_clock<F>(clock: F) -> Self
	where
		F: FnOnce(Arc<AtomicBool>) -> Result<DebugModule, DtmError> + Send + 'static,
	{
		let stop = Arc::new(AtomicBool::new(false));
		let thread_stop = stop.clone();
		Self {
			stop,
			thread: Some(thread::spawn(move || clock(thread_stop))),
		}
	}

	/// Wait for the clock to stop and hand back the simulated target. The command side of the
	/// handshake must have been dropped first, or a tick configured with a claim timeout.
	/// A panic on the clock thread is carried over to the caller.
	pub fn join(mut self) -> Result<DebugModule, DtmError>
	{
		match self.thread.take() {
			Some(thread) => match thread.join() {
				Ok(result) => result,
				Err(payload) => {
					error!("Simulation clock thread panicked");
					panic::resume_unwind(payload)
				},
			},
			None => Err(DtmError::Disconnected),
		}
	}
}

impl Drop for Harness
{
	fn drop(&mut self)
	{
		// Ask the clock to stop, it winds down on its own once no tick is blocked waiting
		self.stop.store(true, Ordering::Relaxed);
	}
}
