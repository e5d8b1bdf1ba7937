//! Just a list of all the exit codes in our process.

pub const LOGGING_HANDLER_INSTALL_FAILURE: i32 = 1;
pub const ARGUMENT_PARSING_FAILURE: i32 = 2;
pub const NO_ARGUMENT_SPECIFIED_FAILURE: i32 = 3;
pub const SHOULD_NEVER_HAPPEN_FAILURE: i32 = 4;
pub const SERIAL_PORT_CONNECTION_FAILURE: i32 = 5;
pub const NO_SPEED_COMMANDS_PROVIDED: i32 = 6;
pub const RUN_PROTOCOL_FAILURE: i32 = 7;
pub const STOP_PROTOCOL_FAILURE: i32 = 8;
pub const LIST_SERIAL_PORTS_FAILURE: i32 = 9;
