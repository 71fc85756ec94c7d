pub mod bindings;
pub mod conversions;
pub mod outcome;
pub mod worker;

mod calls;
mod job_executor;

#[cfg(test)]
mod tests;

pub use bindings::{Namespace, ServiceBinding};
pub use outcome::{ExecutionOutcome, RunHandle};
pub use worker::Worker;
