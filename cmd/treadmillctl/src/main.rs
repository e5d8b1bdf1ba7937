#![allow(
	// I've always disliked this rule, most of the time imports are used WITHOUT
	// the module name, and the module name is only used in the top level import.
	//
	// Where this becomes significantly more helpful to read as it's out of
	// context.
	clippy::module_name_repetitions,
)]

pub mod commands;
pub mod exit_codes;
pub mod knobs;

use crate::{
	commands::{handle_help, handle_list_serial_ports, handle_run, handle_stop},
	exit_codes::{ARGUMENT_PARSING_FAILURE, LOGGING_HANDLER_INSTALL_FAILURE, NO_ARGUMENT_SPECIFIED_FAILURE},
	knobs::{
		cli::{CliArguments, Subcommands},
		env::USE_JSON_OUTPUT,
	},
};
use clap::Parser;
use miette::miette;
use treadmill_log::install_logging_handlers;
use tracing::error;

#[tokio::main]
async fn main() {
	let (argv, use_json) = bootstrap_cli();

	if argv.help || argv.commands.is_none() || matches!(argv.commands, Some(Subcommands::Help {})) {
		let should_error = !argv.help && argv.commands.is_none();
		handle_help(use_json, argv.commands);
		std::process::exit(if should_error {
			NO_ARGUMENT_SPECIFIED_FAILURE
		} else {
			0
		});
	}

	let port = argv.port.clone();
	let baud_rate = argv.baud_rate;
	let read_timeout_ms = argv.read_timeout_ms;

	match argv.commands.expect("checked for None above") {
		Subcommands::Help {} => unreachable!("handled above"),
		Subcommands::ListSerialPorts {} => {
			handle_list_serial_ports(use_json);
		}
		Subcommands::Run { speed_commands } => {
			handle_run(use_json, port, baud_rate, read_timeout_ms, speed_commands).await;
		}
		Subcommands::Stop {} => {
			handle_stop(use_json, port, baud_rate, read_timeout_ms).await;
		}
	}
}

fn bootstrap_cli() -> (CliArguments, bool) {
	let args_opt = CliArguments::try_parse();

	let use_json_cli = args_opt.as_ref().map_or_else(
		|_error| {
			let mut use_json = false;

			// Try to identify if the user is wanting to use JSON, even when argument
			// parsing itself fails.
			for arg in std::env::args() {
				if arg.as_str() == "-j" || arg.as_str() == "--json" {
					use_json = true;
					break;
				}
			}

			use_json
		},
		|args| args.json,
	);
	let use_json = *USE_JSON_OUTPUT || use_json_cli;

	if let Err(cause) = install_logging_handlers(use_json) {
		// We have to use a custom panic script here, because logging isn't setup yet.
		if use_json {
			println!(
				r#"{{"id": "treadmillctl::logging::install_failure", "inner_display_error": "{}", "message": "Failed to install the logging handlers!"}}"#,
				format!("{cause:?}").replace('"', "\\\"")
			);
		} else {
			println!("Failed to install the logging handler to setup logging:\n{cause:?}");
		}
		std::process::exit(LOGGING_HANDLER_INSTALL_FAILURE);
	}

	match args_opt {
		Ok(args) => (args, use_json),
		Err(cause) => {
			if use_json {
				error!(
					id = "treadmillctl::cli::arg_parse_failure",
					error.kind = %cause.kind(),
					error.context = ?cause.context().map(|(kind, value)| format!("{kind}: {value}")).collect::<Vec<String>>(),
					error.rendered = %cause.render(),
					"Failed parsing CLI arguments"
				);
			} else {
				error!(
					"\n{:?}",
					miette!("Failed parsing CLI arguments!").wrap_err(cause),
				);
			}

			std::process::exit(ARGUMENT_PARSING_FAILURE);
		}
	}
}
