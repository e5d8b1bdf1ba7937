//! The list of environment variables that influence behavior for
//! `treadmillctl`.

use once_cell::sync::Lazy;
use std::{
	env::{var as env_var, var_os as env_var_os},
	path::PathBuf,
};

/// Another way of configuring `treadmillctl` to output its data in JSON.
///
/// Environment Variable Name: `TREADMILLCTL_OUTPUT_JSON`
/// Expected Values: ("1" or "0"), and ("true" or "false")
/// Type: Boolean
pub static USE_JSON_OUTPUT: Lazy<bool> = Lazy::new(|| {
	env_var("TREADMILLCTL_OUTPUT_JSON").map_or(false, |var| var == "1" || var == "true")
});

/// A way of specifying the serial port to talk to the treadmill on so you
/// don't have to pass it in over a CLI flag.
///
/// Environment Variable Name: `TREADMILLCTL_SERIAL_PORT`
/// Expected Values: `COM1`/`COM2`/etc. on Windows, `/dev/tty...` on Linux.
/// Type: [`PathBuf`]
pub static TREADMILLCTL_SERIAL_PORT: Lazy<Option<PathBuf>> =
	Lazy::new(|| env_var_os("TREADMILLCTL_SERIAL_PORT").map(PathBuf::from));
