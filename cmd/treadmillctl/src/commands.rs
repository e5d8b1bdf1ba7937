//! Implementations of every subcommand `treadmillctl` exposes.

use crate::{
	exit_codes::{
		LIST_SERIAL_PORTS_FAILURE, NO_SPEED_COMMANDS_PROVIDED, RUN_PROTOCOL_FAILURE,
		SERIAL_PORT_CONNECTION_FAILURE, STOP_PROTOCOL_FAILURE,
	},
	knobs::{cli::Subcommands, env::TREADMILLCTL_SERIAL_PORT},
};
use clap::CommandFactory;
use miette::miette;
use std::{path::PathBuf, time::Duration};
use tokio::signal::ctrl_c as ctrl_c_signal;
use tracing::{error, info};
use treadmill_core::{
	protocol::tokens, serial::link::SerialLink, TelemetryFrame, TreadmillController,
};

use crate::knobs::cli::CliArguments;

/// Print the top level help page, or a subcommand's help page.
pub fn handle_help(use_json: bool, sub_command: Option<Subcommands>) {
	if use_json {
		info!(id = "treadmillctl::help::requested", ?sub_command);
		return;
	}

	let mut command = CliArguments::command();
	if let Err(cause) = command.print_long_help() {
		error!(?cause, "failed to print help output");
	}
}

/// Coalesce the port to use from the CLI flag or environment variable, or
/// exit the process with [`SERIAL_PORT_CONNECTION_FAILURE`] if neither was
/// given.
fn coalesce_port(use_json: bool, port_flag: Option<PathBuf>) -> PathBuf {
	port_flag
		.or_else(|| TREADMILLCTL_SERIAL_PORT.clone())
		.unwrap_or_else(|| {
			if use_json {
				error!(
					id = "treadmillctl::argv::no_serial_port",
					"no serial port specified via `--port` or `TREADMILLCTL_SERIAL_PORT`"
				);
			} else {
				error!("\n{:?}", miette!("No serial port specified! Pass `--port <PORT>` or set `TREADMILLCTL_SERIAL_PORT`."));
			}
			std::process::exit(SERIAL_PORT_CONNECTION_FAILURE);
		})
}

/// List the serial ports visible on this machine.
pub fn handle_list_serial_ports(use_json: bool) {
	match SerialLink::available_ports() {
		Ok(ports) => {
			if ports.is_empty() {
				info!("no serial ports found on this machine");
			}
			for port in ports {
				if use_json {
					info!(id = "treadmillctl::list_serial_ports::port", port = %port.display());
				} else {
					println!("{}", port.display());
				}
			}
		}
		Err(cause) => {
			if use_json {
				error!(id = "treadmillctl::list_serial_ports::failure", ?cause);
			} else {
				error!("\n{:?}", miette!("{cause:?}").wrap_err("Failed to list serial ports."));
			}
			std::process::exit(LIST_SERIAL_PORTS_FAILURE);
		}
	}
}

/// Upload a speed profile and run it to completion (or until interrupted).
pub async fn handle_run(
	use_json: bool,
	port_flag: Option<PathBuf>,
	baud_rate: u32,
	read_timeout_ms: u64,
	speed_commands: Vec<String>,
) {
	if speed_commands.is_empty() {
		if use_json {
			error!(id = "treadmillctl::run::no_speed_commands");
		} else {
			error!("\n{:?}", miette!("No speed commands were provided to run."));
		}
		std::process::exit(NO_SPEED_COMMANDS_PROVIDED);
	}

	let port = coalesce_port(use_json, port_flag);
	let read_timeout = Duration::from_millis(read_timeout_ms);

	let controller = match TreadmillController::initialize(&port, baud_rate, read_timeout).await {
		Ok(controller) => controller,
		Err(cause) => {
			if use_json {
				error!(id = "treadmillctl::run::connection_failure", ?cause, port = %port.display());
			} else {
				error!("\n{:?}", miette!("{cause:?}").wrap_err(format!("Failed to connect to `{}`.", port.display())));
			}
			std::process::exit(SERIAL_PORT_CONNECTION_FAILURE);
		}
	};

	controller.set_status_sink(move |message| {
		if use_json {
			info!(id = "treadmillctl::run::status", %message);
		} else {
			println!("[status] {message}");
		}
	});
	controller.set_telemetry_sink(move |frame: TelemetryFrame| {
		if use_json {
			info!(
				id = "treadmillctl::run::telemetry",
				timestamp_ms = frame.timestamp_ms,
				target_rpm_left = frame.target_rpm_left,
				actual_rpm_left = frame.actual_rpm_left,
				target_rpm_right = frame.target_rpm_right,
				actual_rpm_right = frame.actual_rpm_right,
				driver_left_healthy = frame.driver_left_healthy,
				driver_right_healthy = frame.driver_right_healthy,
				emergency_stop = frame.emergency_stop,
				profile_active = frame.profile_active,
			);
		} else {
			println!(
				"[telemetry] t={}ms left={:.1}/{:.1}rpm right={:.1}/{:.1}rpm estop={} active={}",
				frame.timestamp_ms,
				frame.actual_rpm_left,
				frame.target_rpm_left,
				frame.actual_rpm_right,
				frame.target_rpm_right,
				frame.emergency_stop,
				frame.profile_active,
			);
		}
	});

	if let Err(cause) = controller.run(&speed_commands).await {
		if use_json {
			error!(id = "treadmillctl::run::protocol_failure", ?cause);
		} else {
			error!("\n{:?}", miette!("{cause:?}").wrap_err("Failed to start the treadmill run."));
		}
		std::process::exit(RUN_PROTOCOL_FAILURE);
	}

	loop {
		tokio::select! {
			_ = ctrl_c_signal() => {
				info!("received interrupt, stopping treadmill...");
				if let Err(cause) = controller.stop().await {
					error!(?cause, "failed to stop treadmill cleanly");
				}
				break;
			}
			() = tokio::time::sleep(Duration::from_millis(200)) => {
				if !controller.is_running() {
					break;
				}
			}
		}
	}
}

/// Force a treadmill into its idle state, regardless of whether this
/// process was the one driving it.
///
/// Unlike [`handle_run`]'s graceful stop, this doesn't require an active
/// in-process session: it opens its own link, sends `STOP_TM`, and waits
/// for confirmation. Useful for recovering a device left running by a
/// `treadmillctl run` invocation that didn't shut down cleanly.
pub async fn handle_stop(use_json: bool, port_flag: Option<PathBuf>, baud_rate: u32, read_timeout_ms: u64) {
	let port = coalesce_port(use_json, port_flag);
	let read_timeout = Duration::from_millis(read_timeout_ms);

	let link = match SerialLink::open(&port, baud_rate, read_timeout).await {
		Ok(link) => link,
		Err(cause) => {
			if use_json {
				error!(id = "treadmillctl::stop::connection_failure", ?cause, port = %port.display());
			} else {
				error!("\n{:?}", miette!("{cause:?}").wrap_err(format!("Failed to connect to `{}`.", port.display())));
			}
			std::process::exit(SERIAL_PORT_CONNECTION_FAILURE);
		}
	};

	if let Err(cause) = link.write_line(tokens::STOP_TM).await {
		if use_json {
			error!(id = "treadmillctl::stop::write_failure", ?cause);
		} else {
			error!("\n{:?}", miette!("{cause:?}").wrap_err("Failed to send `STOP_TM`."));
		}
		std::process::exit(STOP_PROTOCOL_FAILURE);
	}

	match link.read_line_default().await {
		Ok(Some(line)) if line == tokens::STOPPED => {
			info!("treadmill stopped");
		}
		Ok(other) => {
			if use_json {
				error!(id = "treadmillctl::stop::unexpected_response", ?other);
			} else {
				error!("\n{:?}", miette!("Expected `STOPPED`, got `{other:?}`."));
			}
			std::process::exit(STOP_PROTOCOL_FAILURE);
		}
		Err(cause) => {
			if use_json {
				error!(id = "treadmillctl::stop::read_failure", ?cause);
			} else {
				error!("\n{:?}", miette!("{cause:?}").wrap_err("Did not receive a stop confirmation in time."));
			}
			std::process::exit(STOP_PROTOCOL_FAILURE);
		}
	}
}
