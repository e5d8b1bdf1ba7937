//! Core protocol and transport library for talking to a treadmill's
//! motor-control microcontroller over a serial link: upload a profile of
//! speed commands, start it running, and stream back telemetry until it
//! finishes or is stopped.
#![allow(
	// We import things elsewhere, usually outside of modules themselves.
	clippy::module_name_repetitions,
)]

pub mod controller;
pub mod errors;
pub mod protocol;
pub mod serial;

pub use controller::TreadmillController;
pub use errors::{ControllerError, LinkError, TelemetryDecodeError, TreadmillError};
pub use protocol::TelemetryFrame;
pub use serial::link::SerialLink;
