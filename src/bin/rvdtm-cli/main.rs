// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod cli_commands;

use std::io::stdout;
use std::time::Duration;

use clap::builder::styling::Styles;
use clap::{Args, CommandFactory, Parser, crate_description, crate_version};
use clap_complete::{Shell, generate};
use color_eyre::config::HookBuilder;
use color_eyre::eyre::Result;
use owo_colors::OwoColorize;
use rvdtm::DtmConfig;
use rvdtm::geometry::BUS_RAM_WORDS;
use rvdtm::riscv::Xlen;
use rvdtm::sim::SimConfig;

use crate::cli_commands::ToplevelCommands;

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	disable_colored_help(false),
	arg_required_else_help(true)
)]
struct CliArguments
{
	#[arg(global = true, long = "xlen", default_value = "64", value_parser = parse_xlen)]
	/// Register width of the simulated hart, 32 or 64
	xlen: Xlen,
	#[arg(global = true, long = "ram-words", default_value_t = 16, value_parser = parse_ram_words)]
	/// Size of the simulated debug RAM in 32-bit words, at most 16
	ram_words: usize,
	#[arg(global = true, long = "ready-probability", default_value_t = 1.0, value_parser = parse_probability)]
	/// Chance the simulated transport accepts a request on any given clock
	ready_probability: f64,
	#[arg(global = true, long = "max-latency", default_value_t = 0)]
	/// Most clocks the simulated transport takes to answer a request
	max_latency: u32,
	#[arg(global = true, long = "seed", default_value_t = 0)]
	/// Seed for the simulated transport's timing
	seed: u64,
	#[arg(global = true, long = "timeout", value_parser = parse_millis)]
	/// Give up on unanswered requests and unfinished programs after this many milliseconds
	timeout: Option<Duration>,

	#[command(subcommand)]
	pub subcommand: ToplevelCommands,
}

#[derive(Args)]
struct CompletionArguments
{
	shell: Shell,
}

impl CliArguments
{
	fn sim_config(&self) -> SimConfig
	{
		SimConfig {
			xlen: self.xlen,
			ram_words: self.ram_words,
			ready_probability: self.ready_probability,
			max_latency: self.max_latency,
			seed: self.seed,
			..SimConfig::default()
		}
	}

	fn dtm_config(&self) -> DtmConfig
	{
		match self.timeout {
			Some(timeout) => DtmConfig::default()
				.with_response_timeout(timeout)
				.with_program_timeout(timeout),
			None => DtmConfig::default(),
		}
	}
}

fn parse_xlen(value: &str) -> Result<Xlen, String>
{
	let bits = value.parse::<u32>().map_err(|err| err.to_string())?;
	Xlen::try_from(bits).map_err(|err| err.to_string())
}

fn parse_ram_words(value: &str) -> Result<usize, String>
{
	let words = value.parse::<usize>().map_err(|err| err.to_string())?;
	if (1..=BUS_RAM_WORDS).contains(&words) {
		Ok(words)
	} else {
		Err(format!("debug RAM must be between 1 and {} words", BUS_RAM_WORDS))
	}
}

fn parse_probability(value: &str) -> Result<f64, String>
{
	let probability = value.parse::<f64>().map_err(|err| err.to_string())?;
	// A transport that never accepts anything would hang the clock forever
	if probability > 0.0 && probability <= 1.0 {
		Ok(probability)
	} else {
		Err("probability must be above 0 and at most 1".into())
	}
}

fn parse_millis(value: &str) -> Result<Duration, String>
{
	value
		.parse::<u64>()
		.map(Duration::from_millis)
		.map_err(|err| err.to_string())
}

fn install_error_handler() -> Result<()>
{
	// Grab us a new default handler and split it into the panic and error hooks
	let (panic_hook, eyre_hook) = HookBuilder::default().try_into_hooks()?;

	// Wrap the panic hook so crash reports come with a clear cut marker
	let panic_hook = panic_hook.into_panic_hook();
	std::panic::set_hook(Box::new(move |panic_info| {
		eprintln!("------------[ ✂ cut here ✂ ]------------");
		eprintln!("Unhandled crash in rvdtm-cli v{}", crate_version!());
		eprintln!();
		panic_hook(panic_info);
		eprintln!();
		eprintln!("{}", "Please include all lines down to this one from the cut here".yellow());
		eprintln!("{}", "marker when reporting this issue".yellow());
	}));

	eyre_hook.install()?;
	Ok(())
}

/// Clap v3 style (approximate)
/// See https://stackoverflow.com/a/75343828
fn style() -> clap::builder::Styles
{
	Styles::styled()
		.usage(
			anstyle::Style::new()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
				.bold(),
		)
		.header(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn main() -> Result<()>
{
	install_error_handler()?;
	env_logger::Builder::new()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let cli_args = CliArguments::parse();

	match &cli_args.subcommand {
		ToplevelCommands::Complete(comp_args) => {
			let mut cmd = CliArguments::command();
			generate(comp_args.shell, &mut cmd, "rvdtm-cli", &mut stdout());
			Ok(())
		},
		command => command.run(&cli_args),
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn ram_words_limited_to_bus_window()
	{
		assert_eq!(parse_ram_words("16"), Ok(16));
		assert_eq!(parse_ram_words("6"), Ok(6));
		assert!(parse_ram_words("0").is_err());
		assert!(parse_ram_words("17").is_err());
		assert!(parse_ram_words("64").is_err());
	}
}
