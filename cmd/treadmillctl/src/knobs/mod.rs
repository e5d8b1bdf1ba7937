//! Everything that configures `treadmillctl`'s behavior: CLI arguments and
//! environment variables.

pub mod cli;
pub mod env;
