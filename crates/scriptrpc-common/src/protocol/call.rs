//! Per-call types handed to service handlers.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::SystemTime;

use super::codec::decode_message;
use super::error::Result;

/// Identifier of one bound-method invocation, unique within a worker.
pub type CallId = u64;

/// Execution context passed to every handler invocation.
///
/// Carries no deadline or cancellation: a call runs until its handler
/// returns.
#[derive(Debug, Clone)]
pub struct CallContext {
    call_id: CallId,
    service: Arc<str>,
    method: Arc<str>,
    started_at: SystemTime,
}

impl CallContext {
    pub fn new(call_id: CallId, service: Arc<str>, method: Arc<str>) -> Self {
        Self {
            call_id,
            service,
            method,
            started_at: SystemTime::now(),
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Fully qualified service name, e.g. `clock.Clock`.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Method name as declared in the service description, e.g. `Now`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

/// The decode capability given to a handler.
///
/// Holds the raw JSON text the script passed and populates whatever request
/// type the handler expects.
#[derive(Debug, Clone)]
pub struct Decoder {
    raw: String,
}

impl Decoder {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Decodes the captured text into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Decode`](super::BridgeError::Decode) if the text
    /// does not match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        decode_message(&self.raw)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}
