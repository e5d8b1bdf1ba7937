//! A container for all the types of errors generated crate-wide.
//!
//! The top level error type is: [`TreadmillError`], which wraps all the
//! other types of errors. You can find more specific error types documented
//! on each specific item.

use miette::Diagnostic;
use std::io::Error as IoError;
use thiserror::Error;

/// The 'top-level' error type for this entire crate, all error types
/// wrap underneath this.
#[derive(Error, Diagnostic, Debug)]
pub enum TreadmillError {
	/// See [`LinkError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Link(#[from] LinkError),
	/// See [`ControllerError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Controller(#[from] ControllerError),
	/// We spawned a background task, and for whatever reason we could not
	/// wait for it to finish.
	#[error("We could not await an asynchronous task we spawned: {0:?}")]
	#[diagnostic(code(treadmill::join_failure))]
	JoinFailure(#[from] tokio::task::JoinError),
}

/// Errors from [`crate::serial::link::SerialLink`], the byte/line level
/// transport.
///
/// These map directly onto the error taxonomy a caller needs to distinguish
/// between: a port that refused to open, a port that's gone away, and a
/// port that was asked to do two incompatible things at once.
#[derive(Error, Diagnostic, Debug)]
pub enum LinkError {
	/// The OS refused to open the serial port.
	#[error("Failed to open serial port `{port}` at {baud_rate} baud: {source}")]
	#[diagnostic(code(treadmill::link::open_failed))]
	LinkOpenError {
		port: String,
		baud_rate: u32,
		#[source]
		source: IoError,
	},
	/// An operation was attempted on a link that is closed, or has been
	/// observed to have gone away (e.g. the OS reports the device missing).
	#[error("The serial link is not connected.")]
	#[diagnostic(code(treadmill::link::not_connected))]
	NotConnected,
	/// [`crate::serial::link::SerialLink::reopen`] was called before any
	/// successful `open()`.
	#[error("Cannot reopen a link that has never been successfully opened.")]
	#[diagnostic(code(treadmill::link::not_configured))]
	NotConfigured,
	/// A caller tried to mix [`crate::serial::link::SerialLink::read_line`]
	/// with an active listener, or otherwise asked the link to be in two
	/// mutually exclusive reading modes at once.
	#[error("Invalid link state: {0}")]
	#[diagnostic(code(treadmill::link::invalid_state))]
	InvalidState(&'static str),
	/// A transport-level failure during a write or a synchronous read.
	#[error("I/O error talking to the serial port: {0}")]
	#[diagnostic(code(treadmill::link::io_failure))]
	IoError(#[from] IoError),
}

/// Errors from [`crate::controller::TreadmillController`], the upload/run
/// protocol state machine.
#[derive(Error, Diagnostic, Debug)]
pub enum ControllerError {
	/// See [`LinkError`] for details.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Link(#[from] LinkError),
	/// A caller-supplied precondition was not met, e.g. an empty command
	/// batch, or `run()` called against a link that was never opened.
	#[error("Precondition not met: {0}")]
	#[diagnostic(code(treadmill::controller::preconditions))]
	Preconditions(&'static str),
	/// `run()` was called while a run session was already active, or `stop()`
	/// was called while none was active.
	#[error("A run session is already active; stop it before starting another.")]
	#[diagnostic(code(treadmill::controller::already_running))]
	AlreadyRunning,
	/// `stop()` was called, but no run session is active.
	#[error("No run session is currently active.")]
	#[diagnostic(code(treadmill::controller::not_running))]
	NotRunning,
	/// The device sent a response other than the one the protocol phase
	/// expected, including an explicit `ERR`.
	#[error("Protocol error during {phase}: expected `{expected}`, got `{got}`")]
	#[diagnostic(code(treadmill::controller::protocol_error))]
	ProtocolError {
		phase: &'static str,
		expected: &'static str,
		got: String,
	},
	/// The expected response did not arrive within the configured read
	/// timeout.
	#[error("Timed out waiting for `{expected}` during {phase}")]
	#[diagnostic(code(treadmill::controller::timeout))]
	Timeout {
		phase: &'static str,
		expected: &'static str,
	},
}

/// A telemetry frame (`TEL,...`) failed to decode.
///
/// This is intentionally *not* a variant of [`TreadmillError`]: decode
/// failures are non-fatal, counted, and logged, but never end a run session.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryDecodeError {
	/// Splitting the line on `,` produced fewer than the 10 required fields
	/// (tag + 9 data fields).
	#[error("Telemetry frame had {got} fields, need at least {expected}: `{line}`")]
	#[diagnostic(code(treadmill::telemetry::wrong_field_count))]
	WrongFieldCount {
		expected: usize,
		got: usize,
		line: String,
	},
	/// A numeric field could not be parsed as the type the wire format
	/// requires for that position.
	#[error("Telemetry field `{field}` could not be parsed from `{value}`")]
	#[diagnostic(code(treadmill::telemetry::bad_field))]
	InvalidField { field: &'static str, value: String },
}
