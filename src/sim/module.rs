// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Behavioural model of the transport and debug module on the far side of the handshake

use std::collections::HashMap;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dtm::handshake::{TickInputs, TickOutputs};
use crate::dtm::{INTERRUPT_BIT, Operation, Request, Response};
use crate::geometry::{BUS_RAM_WORDS, DMINFO_ADDRESS, RamWindow};
use crate::sim::SimConfig;
use crate::sim::hart::Hart;

/// Status the module answers requests to its configured faulting address with
pub const FAULT_STATUS: u32 = 2;

pub struct DebugModule
{
	config: SimConfig,
	rng: StdRng,
	window: RamWindow,
	hart: Hart,
	/// Debug bus registers outside the RAM window and `dminfo`, which simply hold what's written
	registers: HashMap<u32, u64>,
	/// The response to the accepted request and how many more clocks until it is presented
	in_flight: Option<(Response, u32)>,
	accepted: u64,
}

impl DebugModule
{
	pub fn new(config: SimConfig) -> Self
	{
		let config = SimConfig {
			// The RAM is mapped straight onto the bus, so it has to stop short of dmcontrol
			ram_words: config.ram_words.clamp(1, BUS_RAM_WORDS),
			ready_probability: config.ready_probability.clamp(0.0, 1.0),
			..config
		};
		let window = RamWindow::new(config.ram_words);
		Self {
			rng: StdRng::seed_from_u64(config.seed),
			window,
			hart: Hart::new(config.xlen, window),
			registers: HashMap::new(),
			in_flight: None,
			accepted: 0,
			config,
		}
	}

	pub fn hart(&self) -> &Hart
	{
		&self.hart
	}

	pub fn hart_mut(&mut self) -> &mut Hart
	{
		&mut self.hart
	}

	pub fn dminfo(&self) -> u32
	{
		self.window.dminfo_size_field()
	}

	/// How many requests the transport has accepted so far
	pub fn accepted_requests(&self) -> u64
	{
		self.accepted
	}

	/// Advance one clock edge given what the driver presented after its last tick, returning
	/// what the driver sees on its next tick
	pub fn clock(&mut self, outputs: &TickOutputs) -> TickInputs
	{
		// Only offer to accept a new request once the previous one has been answered. The request
		// transfers on this edge when it meets that ready, which the driver sees on its next tick.
		let req_ready = self.in_flight.is_none() && self.rng.gen_bool(self.config.ready_probability);
		if req_ready && outputs.req_valid {
			let response = self.execute(&outputs.req_bits);
			let latency = self.rng.gen_range(0..=self.config.max_latency);
			self.in_flight = Some((response, latency));
			self.accepted += 1;
		}

		for _ in 0..self.config.instructions_per_clock {
			self.hart.step();
		}

		// Present the response once its latency has run out
		let mut inputs = TickInputs {
			req_ready,
			..TickInputs::default()
		};
		if let Some((response, remaining)) = self.in_flight {
			if remaining == 0 && outputs.resp_ready {
				inputs.resp_valid = true;
				inputs.resp_bits = response;
				self.in_flight = None;
			} else {
				self.in_flight = Some((response, remaining.saturating_sub(1)));
			}
		}
		inputs
	}

	fn execute(&mut self, request: &Request) -> Response
	{
		trace!("Debug module executing {:?}", request);
		if self.config.fault_address == Some(request.address) {
			debug!("Faulting request to {:#x}", request.address);
			return Response {
				status: FAULT_STATUS,
				data: 0,
			};
		}
		match request.operation {
			Operation::Nop => Response::ok(0),
			Operation::Read => Response::ok(self.read_register(request.address)),
			Operation::Write => {
				self.write_register(request.address, request.data);
				Response::ok(self.read_register(request.address))
			},
		}
	}

	fn read_register(&self, address: u32) -> u64
	{
		let index = address as usize;
		if index < self.window.words() {
			let interrupt = if self.hart.is_running() { INTERRUPT_BIT } else { 0 };
			u64::from(self.hart.ram_word(index)) | interrupt
		} else if address == DMINFO_ADDRESS {
			u64::from(self.dminfo())
		} else {
			self.registers.get(&address).copied().unwrap_or(0)
		}
	}

	fn write_register(&mut self, address: u32, data: u64)
	{
		let index = address as usize;
		if index < self.window.words() {
			self.hart.set_ram_word(index, data as u32);
			if data & INTERRUPT_BIT != 0 {
				debug!("Debug interrupt raised by write to RAM word {}", index);
				self.hart.start();
			}
		} else if address != DMINFO_ADDRESS {
			self.registers.insert(address, data);
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::riscv::{self, Xlen, ZERO};

	fn driver_outputs(request: Option<Request>) -> TickOutputs
	{
		TickOutputs {
			req_valid: request.is_some(),
			req_bits: request.unwrap_or_default(),
			resp_ready: true,
		}
	}

	#[test]
	fn accepts_on_the_ready_edge()
	{
		let mut module = DebugModule::new(SimConfig::default());
		// Nothing asserted yet, ready alone transfers nothing
		let inputs = module.clock(&driver_outputs(None));
		assert!(inputs.req_ready);
		assert!(!inputs.resp_valid);
		assert_eq!(module.accepted_requests(), 0);

		// Valid meets this edge's ready, and with no latency the response comes straight back
		let inputs = module.clock(&driver_outputs(Some(Request::read(DMINFO_ADDRESS))));
		assert!(inputs.req_ready);
		assert_eq!(module.accepted_requests(), 1);
		assert!(inputs.resp_valid);
		assert_eq!(inputs.resp_bits, Response::ok(15 << 10));
	}

	#[test]
	fn never_ready_never_accepts()
	{
		let mut module = DebugModule::new(SimConfig {
			ready_probability: 0.0,
			..SimConfig::default()
		});
		for _ in 0..32 {
			let inputs = module.clock(&driver_outputs(Some(Request::read(DMINFO_ADDRESS))));
			assert!(!inputs.req_ready);
			assert!(!inputs.resp_valid);
		}
		assert_eq!(module.accepted_requests(), 0);
	}

	#[test]
	fn not_ready_while_response_outstanding()
	{
		let mut module = DebugModule::new(SimConfig {
			max_latency: 8,
			seed: 3,
			..SimConfig::default()
		});
		let mut inputs = module.clock(&driver_outputs(Some(Request::write(0x20, 5))));
		assert_eq!(module.accepted_requests(), 1);
		while !inputs.resp_valid {
			inputs = module.clock(&driver_outputs(Some(Request::read(0x20))));
			assert!(!inputs.req_ready);
			assert_eq!(module.accepted_requests(), 1);
		}
		assert_eq!(inputs.resp_bits, Response::ok(5));
	}

	#[test]
	fn dminfo_visible_at_every_size()
	{
		for ram_words in [1, 6, BUS_RAM_WORDS, BUS_RAM_WORDS + 2, 64] {
			let module = DebugModule::new(SimConfig {
				ram_words,
				..SimConfig::default()
			});
			let words = ram_words.min(BUS_RAM_WORDS);
			let expected = RamWindow::new(words).dminfo_size_field();
			assert_eq!(module.read_register(DMINFO_ADDRESS), u64::from(expected));
			assert_eq!(RamWindow::from_dminfo(expected).words(), words);
		}
	}

	#[test]
	fn ram_reads_carry_interrupt()
	{
		let config = SimConfig {
			xlen: Xlen::Rv64,
			instructions_per_clock: 0,
			..SimConfig::default()
		};
		let mut module = DebugModule::new(config);
		// A program that does nothing but return to the debug ROM
		let jump_home = u64::from(riscv::jal(ZERO, 0x404));
		module.write_register(0, jump_home | INTERRUPT_BIT);
		assert_eq!(module.read_register(0), jump_home | INTERRUPT_BIT);
		module.hart_mut().step();
		assert_eq!(module.read_register(0), jump_home);
	}

	#[test]
	fn faulting_address()
	{
		let config = SimConfig {
			fault_address: Some(0x30),
			..SimConfig::default()
		};
		let mut module = DebugModule::new(config);
		assert_eq!(module.execute(&Request::write(0x30, 1)).status, FAULT_STATUS);
		assert_eq!(module.execute(&Request::write(0x31, 1)), Response::ok(1));
	}
}
