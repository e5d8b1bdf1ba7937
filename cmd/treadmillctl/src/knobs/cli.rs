//! Defines the command line interface a.k.a. all the arguments & flags.

use clap::Parser;
use std::path::PathBuf;
use treadmill_core::protocol::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};

#[derive(Parser, Debug)]
#[clap(disable_help_flag = true, disable_help_subcommand = true)]
#[command(about, author, name = "treadmillctl", propagate_version = true, version)]
pub struct CliArguments {
	#[arg(
		global = true,
		long = "port",
		alias = "serial-port",
		help = "The serial port the treadmill's controller is attached to.",
		long_help = "The serial port the treadmill's controller is attached to, e.g. `/dev/ttyUSB0` or `COM3`. Falls back to `TREADMILLCTL_SERIAL_PORT` if not given."
	)]
	pub port: Option<PathBuf>,
	#[arg(
		global = true,
		long = "baud-rate",
		alias = "baud_rate",
		default_value_t = DEFAULT_BAUD_RATE,
		help = "The baud rate to open the serial port at.",
		long_help = "The baud rate to open the serial port at. Must match what the treadmill's firmware expects."
	)]
	pub baud_rate: u32,
	#[arg(
		global = true,
		long = "read-timeout-ms",
		alias = "read_timeout_ms",
		default_value_t = DEFAULT_READ_TIMEOUT_MS,
		help = "How long to wait for a response from the device before giving up, in milliseconds."
	)]
	pub read_timeout_ms: u64,
	#[command(subcommand)]
	pub commands: Option<Subcommands>,
	#[arg(
		global = true,
		short = 'h',
		long = "help",
		help = "Display the help page for your command rather than running it."
	)]
	pub help: bool,
	#[arg(
		global = true,
		short = 'j',
		long = "json",
		help = "Ensures all logging comes out in JSON instead of text."
	)]
	pub json: bool,
}

#[derive(Parser, Debug)]
#[clap(disable_help_flag = true, disable_help_subcommand = true)]
pub enum Subcommands {
	/// Show the help page.
	Help {},
	/// List the serial ports available on this machine.
	#[command(name = "list-serial-ports", visible_alias = "list")]
	ListSerialPorts {},
	/// Upload a speed profile and start running it.
	Run {
		#[arg(
			index = 1,
			required = true,
			help = "One speed command per profile step, sent in order.",
			long_help = "One speed command per profile step, sent to the device in order, e.g. `SPD 1.5 1.5`. The exact grammar of each command is defined by the treadmill's firmware, not by this tool."
		)]
		speed_commands: Vec<String>,
	},
	/// Send the stop command to a running treadmill.
	Stop {},
}
