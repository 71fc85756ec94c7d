//! Demo `clock.Clock` service.
//!
//! Exposed to scripts as `clock.now({})`, which resolves to
//! `{ "id": "<uuid>", "time": "<RFC 3339 timestamp>" }`.

use chrono::{DateTime, Utc};
use scriptrpc_common::{CallContext, Result, ServiceDescription, ServiceRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "clock.Clock";

#[derive(Debug, Default, Deserialize)]
pub struct TimeRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeResponse {
    pub id: String,
    pub time: DateTime<Utc>,
}

/// Clock service implementation.
#[derive(Debug, Default)]
pub struct Clock;

impl Clock {
    pub fn new() -> Self {
        Self
    }

    /// Returns the current time, tagged with a fresh id.
    pub async fn now(&self, _ctx: CallContext, _req: TimeRequest) -> Result<TimeResponse> {
        Ok(TimeResponse {
            id: Uuid::now_v7().to_string(),
            time: Utc::now(),
        })
    }
}

pub fn description() -> ServiceDescription<Clock> {
    ServiceDescription::new(SERVICE_NAME).method(
        "Now",
        |clock: Arc<Clock>, ctx: CallContext, req: TimeRequest| async move { clock.now(ctx, req).await },
    )
}

/// The clock service paired with a fresh [`Clock`].
pub fn service() -> ServiceRef {
    ServiceRef::new(description(), Arc::new(Clock::new()))
}
