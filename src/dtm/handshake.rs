// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The request/response handshake between the thread issuing debug bus commands and the
//! clock-driven function that talks valid/ready to the transport.
//!
//! The two sides share nothing but a pair of single-slot mailboxes, so at most one request and
//! one response exist at any time and the command side can never run ahead of the clock.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, error, trace};

use crate::config::DtmConfig;
use crate::dtm::{Request, Response};
use crate::error::DtmError;
use crate::log_and_return;

/// Create the two ends of a handshake: the blocking command port and the tick function the
/// simulation harness must call once per clock edge
pub fn channel(config: &DtmConfig) -> (CommandPort, DtmTick)
{
	let (request_tx, request_rx) = bounded(1);
	let (response_tx, response_rx) = bounded(1);

	let port = CommandPort {
		requests: request_tx,
		responses: response_rx,
		response_timeout: config.response_timeout,
		desynchronised: false,
	};
	let tick = DtmTick {
		requests: request_rx,
		responses: response_tx,
		claim_timeout: config.claim_timeout,
		state: HandshakeState::Idle,
		pending: Request::default(),
	};
	(port, tick)
}

/// The command side of the handshake. Every call queues exactly one request and blocks until
/// its response comes back.
pub struct CommandPort
{
	requests: Sender<Request>,
	responses: Receiver<Response>,
	response_timeout: Option<Duration>,
	/// Set once a failure leaves the request/response sequence unaligned
	desynchronised: bool,
}

impl CommandPort
{
	pub fn do_command(&mut self, request: Request) -> Result<u64, DtmError>
	{
		if self.desynchronised {
			return Err(DtmError::Desynchronised);
		}

		// Hand the request over, this only blocks while the tick side still holds the previous one
		if self.requests.send(request).is_err() {
			self.desynchronised = true;
			log_and_return!(DtmError::Disconnected);
		}

		// Now wait for the matching response
		let response = match self.response_timeout {
			Some(timeout) => self.responses.recv_timeout(timeout).map_err(|err| match err {
				RecvTimeoutError::Timeout => DtmError::Timeout {
					operation: "debug bus response",
				},
				RecvTimeoutError::Disconnected => DtmError::Disconnected,
			}),
			None => self.responses.recv().map_err(|_| DtmError::Disconnected),
		};
		let response = match response {
			Ok(response) => response,
			Err(err) => {
				// Whatever happens to the outstanding request now, its response can't be matched up
				self.desynchronised = true;
				log_and_return!(err);
			},
		};

		if !response.is_ok() {
			self.desynchronised = true;
			log_and_return!(DtmError::ProtocolDesync {
				address: request.address,
				status: response.status,
			});
		}
		Ok(response.data)
	}

	pub fn read(&mut self, address: u32) -> Result<u64, DtmError>
	{
		let data = self.do_command(Request::read(address))?;
		trace!("Debug bus read {:#04x} -> {:#011x}", address, data);
		Ok(data)
	}

	pub fn write(&mut self, address: u32, data: u64) -> Result<u64, DtmError>
	{
		trace!("Debug bus write {:#04x} <- {:#011x}", address, data);
		self.do_command(Request::write(address, data))
	}

	pub fn nop(&mut self) -> Result<(), DtmError>
	{
		self.do_command(Request::nop()).map(|_| ())
	}

	pub fn is_desynchronised(&self) -> bool
	{
		self.desynchronised
	}

	/// Refuse all further commands, for when the target is left in a state they can't be trusted in
	pub(crate) fn poison(&mut self)
	{
		self.desynchronised = true;
	}
}

/// Where the tick function is in the exchange of the current request/response pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState
{
	/// No request claimed, no response outstanding
	Idle,
	/// A request is asserted on the transport but not yet accepted
	RequestPending,
	/// The request was accepted and its response has not arrived yet
	ResponseWaiting,
}

/// The transport's signals as sampled on a clock edge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickInputs
{
	pub req_ready: bool,
	pub resp_valid: bool,
	pub resp_bits: Response,
}

/// The signals the driver presents to the transport until the next clock edge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutputs
{
	pub req_valid: bool,
	pub req_bits: Request,
	pub resp_ready: bool,
}

/// The clock side of the handshake
pub struct DtmTick
{
	requests: Receiver<Request>,
	responses: Sender<Response>,
	claim_timeout: Option<Duration>,
	state: HandshakeState,
	/// The request most recently claimed from the command side
	pending: Request,
}

impl DtmTick
{
	/// Advance the handshake by one clock edge. When idle this blocks until the command side
	/// queues a request (or the claim timeout elapses), which stalls the caller's clock meanwhile.
	pub fn tick(&mut self, inputs: &TickInputs) -> Result<TickOutputs, DtmError>
	{
		let req_valid = match self.state {
			// Never issue a new request while a response is outstanding
			HandshakeState::ResponseWaiting => false,
			HandshakeState::Idle => match self.claim_request()? {
				Some(request) => {
					trace!("Asserting request {:?}", request);
					self.pending = request;
					self.state = HandshakeState::RequestPending;
					true
				},
				None => false,
			},
			HandshakeState::RequestPending => {
				if inputs.req_ready {
					self.state = HandshakeState::ResponseWaiting;
					false
				} else {
					true
				}
			},
		};

		if inputs.resp_valid {
			if self.state != HandshakeState::ResponseWaiting {
				error!("Transport signalled response-valid in state {:?}", self.state);
				return Err(DtmError::UnexpectedResponse);
			}
			trace!("Received response {:?}", inputs.resp_bits);
			self.state = HandshakeState::Idle;
			match self.responses.try_send(inputs.resp_bits) {
				Ok(()) => (),
				Err(TrySendError::Full(_)) => return Err(DtmError::ResponseOverrun),
				Err(TrySendError::Disconnected(_)) => return Err(DtmError::Disconnected),
			}
		}

		Ok(TickOutputs {
			req_valid,
			req_bits: self.pending,
			resp_ready: true,
		})
	}

	pub fn state(&self) -> HandshakeState
	{
		self.state
	}

	fn claim_request(&self) -> Result<Option<Request>, DtmError>
	{
		match self.claim_timeout {
			Some(timeout) => match self.requests.recv_timeout(timeout) {
				Ok(request) => Ok(Some(request)),
				Err(RecvTimeoutError::Timeout) => Ok(None),
				Err(RecvTimeoutError::Disconnected) => {
					debug!("Command side of the handshake closed");
					Err(DtmError::Disconnected)
				},
			},
			None => self.requests.recv().map(Some).map_err(|_| {
				debug!("Command side of the handshake closed");
				DtmError::Disconnected
			}),
		}
	}
}
