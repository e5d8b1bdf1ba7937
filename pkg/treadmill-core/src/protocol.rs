//! The fixed ASCII line protocol spoken between the host and the treadmill's
//! microcontroller, plus the decoded telemetry value type.
//!
//! Every token in [`tokens`] is transmitted/expected verbatim, LF-terminated
//! (a trailing CR on input is tolerated and stripped by
//! [`crate::serial::link::SerialLink`] before any of this module ever sees
//! it).

use crate::errors::TelemetryDecodeError;

/// Fixed protocol tokens. Case-sensitive, compared byte-for-byte.
pub mod tokens {
	/// Begin upload phase.
	pub const START_READ: &str = "START_READ";
	/// Upload complete.
	pub const END_READ: &str = "END_READ";
	/// Start executing the uploaded profile.
	///
	/// The trailing space is part of the wire protocol: the firmware parses
	/// `RUN_TM` and `RUN_TM ` differently, so it must never be trimmed.
	pub const RUN_TM: &str = "RUN_TM ";
	/// Abort / return to idle.
	pub const STOP_TM: &str = "STOP_TM";
	/// Liveness ping. Fire-and-forget; the device never acknowledges it.
	pub const HEARTBEAT: &str = "HEARTBEAT";
	/// Device is ready for the next line of input.
	pub const READY: &str = "READY";
	/// Upload acknowledged.
	pub const ACK: &str = "ACK";
	/// Execution started.
	pub const RUNNING: &str = "RUNNING";
	/// Device is idle.
	pub const STOPPED: &str = "STOPPED";
	/// Device-reported protocol error.
	pub const ERR: &str = "ERR";
	/// Telemetry frame prefix (`TEL,<fields>`).
	pub const TELEMETRY_PREFIX: &str = "TEL,";
	/// Informational line prefix; always ignored by the core.
	pub const INFO_PREFIX: &str = "INFO,";
}

/// Default baud rate used when a caller doesn't specify one.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;
/// Default per-call read timeout, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
/// Fixed heartbeat tick period. Not configurable: the firmware's watchdog
/// window is sized around this exact value.
pub const HEARTBEAT_PERIOD_MS: u64 = 500;
/// How many unexpected lines we'll discard while resynchronizing with the
/// device before giving up and letting the next phase fail cleanly.
pub const SYNC_DISCARD_ATTEMPTS: usize = 5;
/// Minimum number of comma-separated fields (including the `TEL` tag itself)
/// a telemetry line must have to be considered well-formed.
pub const TELEMETRY_MIN_FIELDS: usize = 10;

/// A decoded snapshot of device state, carried on a `TEL,...` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
	/// Monotonic device clock, milliseconds.
	pub timestamp_ms: u32,
	pub target_rpm_left: f32,
	pub actual_rpm_left: f32,
	pub target_rpm_right: f32,
	pub actual_rpm_right: f32,
	pub driver_left_healthy: bool,
	pub driver_right_healthy: bool,
	pub emergency_stop: bool,
	/// Whether the uploaded profile is still executing. `false` is the
	/// run-completion signal.
	pub profile_active: bool,
}

impl TelemetryFrame {
	/// Decode a single telemetry line (including the `TEL,` prefix).
	///
	/// ## Errors
	///
	/// If the line has fewer than [`TELEMETRY_MIN_FIELDS`] comma-separated
	/// fields, or any of the first nine data fields fails to parse as the
	/// type the wire format specifies for that position. Trailing fields
	/// beyond the ninth are ignored.
	pub fn decode(line: &str) -> Result<Self, TelemetryDecodeError> {
		let fields: Vec<&str> = line.split(',').collect();
		if fields.len() < TELEMETRY_MIN_FIELDS {
			return Err(TelemetryDecodeError::WrongFieldCount {
				expected: TELEMETRY_MIN_FIELDS,
				got: fields.len(),
				line: line.to_owned(),
			});
		}

		let parse_u32 = |field: &'static str, value: &str| {
			value
				.parse::<u32>()
				.map_err(|_| TelemetryDecodeError::InvalidField {
					field,
					value: value.to_owned(),
				})
		};
		let parse_f32 = |field: &'static str, value: &str| {
			value
				.parse::<f32>()
				.map_err(|_| TelemetryDecodeError::InvalidField {
					field,
					value: value.to_owned(),
				})
		};
		let parse_bool = |value: &str| value == "1";

		Ok(Self {
			timestamp_ms: parse_u32("timestamp_ms", fields[1])?,
			target_rpm_left: parse_f32("target_rpm_left", fields[2])?,
			actual_rpm_left: parse_f32("actual_rpm_left", fields[3])?,
			target_rpm_right: parse_f32("target_rpm_right", fields[4])?,
			actual_rpm_right: parse_f32("actual_rpm_right", fields[5])?,
			driver_left_healthy: parse_bool(fields[6]),
			driver_right_healthy: parse_bool(fields[7]),
			emergency_stop: parse_bool(fields[8]),
			profile_active: parse_bool(fields[9]),
		})
	}

	/// Whether `line` even looks like a telemetry frame, i.e. starts with
	/// the `TEL,` prefix. Doesn't imply it will decode successfully.
	#[must_use]
	pub fn looks_like_telemetry(line: &str) -> bool {
		line.starts_with(tokens::TELEMETRY_PREFIX)
	}
}

/// Whether `line` is an informational line the core should silently ignore.
#[must_use]
pub fn looks_like_info(line: &str) -> bool {
	line.starts_with(tokens::INFO_PREFIX)
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn decodes_well_formed_frame() {
		let frame = TelemetryFrame::decode("TEL,100,10,10,10,10,1,1,0,1")
			.expect("well-formed frame should decode");
		assert_eq!(frame.timestamp_ms, 100);
		assert!((frame.target_rpm_left - 10.0).abs() < f32::EPSILON);
		assert!(frame.driver_left_healthy);
		assert!(frame.driver_right_healthy);
		assert!(!frame.emergency_stop);
		assert!(frame.profile_active);
	}

	#[test]
	pub fn ignores_trailing_extra_fields() {
		let frame = TelemetryFrame::decode("TEL,100,10,10,10,10,1,1,0,1,extra,more")
			.expect("extra trailing fields should be ignored");
		assert_eq!(frame.timestamp_ms, 100);
	}

	#[test]
	pub fn rejects_wrong_field_count() {
		let err = TelemetryFrame::decode("TEL,100,10,10,10,10,1,1,0")
			.expect_err("9 fields should be rejected");
		assert!(matches!(
			err,
			TelemetryDecodeError::WrongFieldCount {
				expected: TELEMETRY_MIN_FIELDS,
				got: 9,
				..
			}
		));
	}

	#[test]
	pub fn rejects_unparseable_number() {
		let err = TelemetryFrame::decode("TEL,not-a-number,10,10,10,10,1,1,0,1")
			.expect_err("non-numeric timestamp should be rejected");
		assert!(matches!(
			err,
			TelemetryDecodeError::InvalidField {
				field: "timestamp_ms",
				..
			}
		));
	}

	#[test]
	pub fn profile_inactive_is_false_on_anything_but_one() {
		let frame = TelemetryFrame::decode("TEL,100,10,10,10,10,1,1,0,0").unwrap();
		assert!(!frame.profile_active);
	}

	#[test]
	pub fn recognizes_telemetry_and_info_prefixes() {
		assert!(TelemetryFrame::looks_like_telemetry("TEL,1,2,3"));
		assert!(!TelemetryFrame::looks_like_telemetry("INFO,hello"));
		assert!(looks_like_info("INFO,ARDUINO_READY"));
		assert!(!looks_like_info("TEL,1,2,3"));
	}
}
