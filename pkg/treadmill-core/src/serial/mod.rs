//! Byte and line level transport for the treadmill's serial link.
//!
//! The raw port wrappers in [`underlying`] and [`async_sys`] were originally
//! forked from:
//! <https://github.com/de-vri-es/serial2-tokio-rs> at commit:
//! `65ff229f65c27c57e261f94dc6cc9a761cce9b21`.
//! And
//! <https://github.com/de-vri-es/serial2-rs/> at commit:
//! `dc1333ce8f205e77cb2a89d2ed52463ff56cdc04`
//!
//! You can see the dual apache/bsd licenses for them at:
//! <https://raw.githubusercontent.com/de-vri-es/serial2-tokio-rs/65ff229f65c27c57e261f94dc6cc9a761cce9b21/LICENSE-APACHE>
//! <https://raw.githubusercontent.com/de-vri-es/serial2-tokio-rs/65ff229f65c27c57e261f94dc6cc9a761cce9b21/LICENSE-BSD>
//!
//! This fork parameterizes the fixed baud rate the original hardcoded, and
//! adds [`link`], a line-oriented wrapper used by the protocol state machine
//! in [`crate::controller`].

mod async_sys;
mod underlying;

pub mod link;

pub use async_sys::*;
pub use underlying::*;
