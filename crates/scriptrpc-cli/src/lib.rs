//! # scriptrpc CLI
//!
//! Process bootstrap for scriptrpc: binds the demo services into a worker
//! and runs scripts against it.
//!
//! ## Key Commands
//!
//! - `scriptrpc run`: run one script and print its JSON result
//! - `scriptrpc bench`: run a script many times concurrently and report timings

pub mod bench;
pub mod clock;
