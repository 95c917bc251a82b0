// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use log::{debug, info, warn};
use rvdtm::riscv::CSR_MISA;
use rvdtm::sim::{DebugModule, Harness};
use rvdtm::{DebugTarget, DtmError};

use crate::{CliArguments, CompletionArguments};

/// Words the self test writes and expects to read back
const SELFTEST_PATTERN: [u32; 4] = [0x00abcdef, 0x00fedcba, 0x01234567, 0x76543210];
const SELFTEST_SCRATCH: u64 = 0x1000;
const SELFTEST_TARGET: u64 = 0x8000_0000;

#[derive(Subcommand)]
pub enum ToplevelCommands
{
	/// Discover the debug RAM size and XLEN of the target
	Probe,
	/// Run the memory and CSR access diagnostic sequence against the target
	Selftest,
	/// Read target memory through debug RAM programs
	ReadMem(ReadMemArguments),
	/// Write target memory through debug RAM programs
	WriteMem(WriteMemArguments),
	/// Read a control and status register
	ReadCsr(ReadCsrArguments),
	/// Write a control and status register
	WriteCsr(WriteCsrArguments),
	/// Perform a raw debug bus read
	BusRead(BusReadArguments),
	/// Perform a raw debug bus write
	BusWrite(BusWriteArguments),
	/// Generate completions data for the shell
	Complete(CompletionArguments),
}

#[derive(Args)]
pub struct ReadMemArguments
{
	#[arg(value_parser = parse_u64)]
	/// Target address to start reading from
	address: u64,
	#[arg(value_parser = parse_usize)]
	/// How many bytes to read, a multiple of the target word size
	length: usize,
}

#[derive(Args)]
pub struct WriteMemArguments
{
	#[arg(value_parser = parse_u64)]
	/// Target address to start writing at
	address: u64,
	#[arg(required = true, value_parser = parse_u32)]
	/// 32-bit words to write, lowest address first
	words: Vec<u32>,
}

#[derive(Args)]
pub struct ReadCsrArguments
{
	#[arg(value_parser = parse_csr)]
	/// CSR number
	csr: u16,
}

#[derive(Args)]
pub struct WriteCsrArguments
{
	#[arg(value_parser = parse_csr)]
	/// CSR number
	csr: u16,
	#[arg(value_parser = parse_u64)]
	/// Value to write
	value: u64,
}

#[derive(Args)]
pub struct BusReadArguments
{
	#[arg(value_parser = parse_u32)]
	/// Debug bus address
	address: u32,
}

#[derive(Args)]
pub struct BusWriteArguments
{
	#[arg(value_parser = parse_u32)]
	/// Debug bus address
	address: u32,
	#[arg(value_parser = parse_u64)]
	/// Value to write, including any tag bits above bit 31
	value: u64,
}

impl ToplevelCommands
{
	pub fn run(&self, cli_args: &CliArguments) -> Result<()>
	{
		with_target(cli_args, |target| match self {
			ToplevelCommands::Probe => probe_command(target),
			ToplevelCommands::Selftest => selftest_command(target),
			ToplevelCommands::ReadMem(args) => read_mem_command(target, args),
			ToplevelCommands::WriteMem(args) => write_mem_command(target, args),
			ToplevelCommands::ReadCsr(args) => {
				let value = target.read_csr(args.csr)?;
				info!("CSR {:#05x} = {:#x}", args.csr, value);
				Ok(())
			},
			ToplevelCommands::WriteCsr(args) => Ok(target.write_csr(args.csr, args.value)?),
			ToplevelCommands::BusRead(args) => {
				let value = target.read(args.address)?;
				info!("Debug bus {:#x} = {:#011x}", args.address, value);
				Ok(())
			},
			ToplevelCommands::BusWrite(args) => {
				let value = target.write(args.address, args.value)?;
				info!("Debug bus {:#x} now {:#011x}", args.address, value);
				Ok(())
			},
			ToplevelCommands::Complete(_) => Err(eyre!("Completions are generated without a target")),
		})
	}
}

/// Bring up the simulated transport and target, initialise the driver against it and run
/// the action, winding the simulation clock down afterwards
fn with_target<F>(cli_args: &CliArguments, action: F) -> Result<()>
where
	F: FnOnce(&mut DebugTarget) -> Result<()>,
{
	let config = cli_args.dtm_config();
	let (port, tick) = rvdtm::channel(&config);
	let harness = Harness::spawn(tick, DebugModule::new(cli_args.sim_config()));

	let mut target = DebugTarget::initialize(port, &config).wrap_err("Failed to initialise the debug target")?;
	let result = action(&mut target);
	if let Err(err) = &result {
		if err.downcast_ref::<DtmError>().is_some_and(DtmError::is_desync) {
			warn!("The debug transport lost sync with the target, no further commands are possible");
		}
	}

	// Dropping the target closes the handshake, which lets the clock stop
	drop(target);
	let module = harness.join()?;
	debug!("Transport accepted {} requests", module.accepted_requests());
	result
}

fn probe_command(target: &mut DebugTarget) -> Result<()>
{
	info!("dminfo: {:#010x}", target.dminfo());
	info!("XLEN: {}", target.xlen());
	info!("Debug RAM: {} words", target.ram_words());
	info!("Largest single chunk: {} bytes", target.chunk_max_size());
	Ok(())
}

fn selftest_command(target: &mut DebugTarget) -> Result<()>
{
	// Start by showing whatever is in the scratch area
	let mut chunk = [0u8; 16];
	target.read_memory(SELFTEST_SCRATCH, &mut chunk)?;
	log_words(SELFTEST_SCRATCH, &chunk);

	// Now write the pattern out and read it back
	let pattern: Vec<u8> = SELFTEST_PATTERN.iter().flat_map(|word| word.to_le_bytes()).collect();
	target.write_memory(SELFTEST_TARGET, &pattern)?;
	target.read_memory(SELFTEST_TARGET, &mut chunk)?;
	log_words(SELFTEST_TARGET, &chunk);
	if chunk[..] != pattern[..] {
		return Err(eyre!("Memory at {:#x} did not read back as written", SELFTEST_TARGET));
	}

	let misa = target.read_csr(CSR_MISA)?;
	info!("misa: {:#x}", misa);
	info!("Self test passed");
	Ok(())
}

fn read_mem_command(target: &mut DebugTarget, args: &ReadMemArguments) -> Result<()>
{
	let mut data = vec![0; args.length];
	target
		.read_memory(args.address, &mut data)
		.wrap_err_with(|| format!("Failed to read {} bytes at {:#x}", args.length, args.address))?;
	log_words(args.address, &data);
	Ok(())
}

fn write_mem_command(target: &mut DebugTarget, args: &WriteMemArguments) -> Result<()>
{
	let data: Vec<u8> = args.words.iter().flat_map(|word| word.to_le_bytes()).collect();
	target
		.write_memory(args.address, &data)
		.wrap_err_with(|| format!("Failed to write {} bytes at {:#x}", data.len(), args.address))?;
	info!("Wrote {} bytes at {:#x}", data.len(), args.address);
	Ok(())
}

fn log_words(address: u64, data: &[u8])
{
	for (index, bytes) in data.chunks_exact(4).enumerate() {
		let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
		info!("{:#010x}: {:#010x}", address + (index * 4) as u64, word);
	}
}

/// Parse a number in decimal, or hex when prefixed with `0x`
fn parse_u64(value: &str) -> Result<u64, String>
{
	let result = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
		None => value.replace('_', "").parse(),
	};
	result.map_err(|err| format!("invalid number '{}': {}", value, err))
}

fn parse_u32(value: &str) -> Result<u32, String>
{
	u32::try_from(parse_u64(value)?).map_err(|_| format!("'{}' does not fit in 32 bits", value))
}

fn parse_usize(value: &str) -> Result<usize, String>
{
	usize::try_from(parse_u64(value)?).map_err(|_| format!("'{}' is too large", value))
}

fn parse_csr(value: &str) -> Result<u16, String>
{
	match parse_u64(value)? {
		csr @ 0..=0xfff => Ok(csr as u16),
		_ => Err(format!("CSR numbers are 12 bits, '{}' is out of range", value)),
	}
}
