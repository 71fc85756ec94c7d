//! scriptrpc common types
//!
//! This crate holds everything the script bridge shares with the code that
//! provides services to it, without depending on the JavaScript engine:
//!
//! - **Service descriptions**: the explicit registration table mapping a
//!   qualified service name and its method names to typed handlers
//! - **Call types**: the per-call context and the decode capability handed
//!   to handlers
//! - **Codec**: JSON encoding of request and response messages
//! - **Errors**: the [`BridgeError`] taxonomy used across the workspace
//!
//! # Components
//!
//! - [`protocol`] - descriptions, call types, codec and errors

pub mod protocol;

pub use protocol::*;
