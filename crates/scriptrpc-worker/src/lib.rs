//! scriptrpc worker
//!
//! Exposes RPC service descriptions to JavaScript running in a Boa context
//! and drives those scripts to a single result.
//!
//! Every method of every bound service becomes a function that returns a
//! promise. The handler runs on a tokio task; its reply is marshaled back
//! into the context when the [`Worker`] is driven.
//!
//! ```no_run
//! use scriptrpc_common::{CallContext, ServiceDescription, ServiceRef};
//! use scriptrpc_worker::Worker;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # async fn demo() -> scriptrpc_common::Result<()> {
//! let greeter = ServiceDescription::<()>::new("hello.Greeter").method(
//!     "SayHello",
//!     |_client: Arc<()>, _ctx: CallContext, req: Value| async move {
//!         let name = req["name"].as_str().unwrap_or("?").to_string();
//!         scriptrpc_common::Result::Ok(json!({ "message": format!("hello {name}") }))
//!     },
//! );
//!
//! let mut worker = Worker::new(vec![ServiceRef::new(greeter, Arc::new(()))])?;
//! let value = worker
//!     .run_to_completion("greeter.sayHello({ name: 'boa' })", "main.js")
//!     .await?;
//! assert_eq!(worker.stringify(&value)?, r#"{"message":"hello boa"}"#);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod runtime;
pub mod stats;

pub use config::WorkerConfig;
pub use runtime::{ExecutionOutcome, Namespace, RunHandle, ServiceBinding, Worker};
pub use stats::{CallStats, MethodStats, StatsSnapshot};
