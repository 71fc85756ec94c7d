use boa_engine::{value::JsValue, Context, JsString, Source};
use scriptrpc_common::{BridgeError, Result, ServiceRef};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot::error::TryRecvError;

use crate::config::WorkerConfig;
use crate::runtime::bindings::{install_namespace, Namespace};
use crate::runtime::calls::{CallRegistry, Settlement};
use crate::runtime::conversions::{json_to_js_value, JsonStringify};
use crate::runtime::job_executor::JobQueue;
use crate::runtime::outcome::{reason_text, ExecutionOutcome, RunHandle};
use crate::stats::{CallStats, StatsSnapshot};

/// Runs scripts against a bound service namespace.
///
/// A worker owns one Boa context for its whole life. Scripts run in it one
/// at a time (`run` takes `&mut self`), but any number of runs and bound
/// method calls may be in flight at once: [`run`](Self::run) returns as soon
/// as the script's synchronous body is done, and handlers execute on tokio
/// tasks while the caller keeps using the worker.
///
/// Nothing moves unless the worker is driven. [`wait`](Self::wait) drives it
/// until one run settles; [`advance_pending_work`](Self::advance_pending_work)
/// applies whatever has already arrived without blocking.
///
/// The worker is `!Send`: construct and use it on one thread.
pub struct Worker {
    // Declared before `context` so it is dropped first.
    stringify: JsonStringify,
    context: Context,
    jobs: Rc<JobQueue>,
    calls: Rc<CallRegistry>,
    settlements: UnboundedReceiver<Settlement>,
    namespace: Namespace,
    stats: Arc<CallStats>,
    config: WorkerConfig,
    next_run: u64,
}

impl Worker {
    /// Creates a worker bound to `services` on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails with a binding error if the services cannot be exposed
    /// (malformed name, duplicate identifier, reserved identifier), or with
    /// [`BridgeError::Runtime`] if no tokio runtime is running.
    pub fn new(services: impl IntoIterator<Item = ServiceRef>) -> Result<Self> {
        Self::with_config(services, WorkerConfig::default())
    }

    pub fn with_config(
        services: impl IntoIterator<Item = ServiceRef>,
        config: WorkerConfig,
    ) -> Result<Self> {
        config.validate().map_err(BridgeError::Runtime)?;

        let namespace = Namespace::build(services)?;

        let runtime = match &config.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|e| BridgeError::Runtime(format!("no tokio runtime available: {e}")))?,
        };

        let jobs = Rc::new(JobQueue::new());
        let mut context = Context::builder()
            .job_executor(jobs.clone())
            .build()
            .map_err(|e| BridgeError::Runtime(format!("failed to create context: {e}")))?;

        let stringify =
            JsonStringify::capture(&mut context).map_err(|e| BridgeError::Runtime(e.to_string()))?;

        let (tx, settlements) = mpsc::unbounded_channel();
        let calls = Rc::new(CallRegistry::new(runtime, tx));
        install_namespace(&mut context, &namespace, &calls, &stringify)?;

        tracing::info!(
            services = namespace.len(),
            methods = namespace.method_count(),
            "Worker ready"
        );

        Ok(Self {
            stringify,
            context,
            jobs,
            calls,
            settlements,
            namespace,
            stats: Arc::new(CallStats::new()),
            config,
            next_run: 1,
        })
    }

    /// Runs `source` and returns a handle to its eventual result.
    ///
    /// The script's synchronous body and every microtask it queued have run
    /// by the time this returns. A compile error or synchronous throw is
    /// already sitting in the handle as [`BridgeError::Script`].
    pub fn run(&mut self, source: &str, origin: &str) -> RunHandle {
        let run_id = self.next_run;
        self.next_run += 1;
        let (handle, slot) = RunHandle::new(run_id, origin);

        let evaluated = self
            .context
            .eval(Source::from_bytes(source).with_path(Path::new(origin)));

        match evaluated {
            Ok(value) => {
                self.jobs.drain(&mut self.context);
                let outcome = ExecutionOutcome::classify(value);
                tracing::debug!(run_id, origin, pending = outcome.is_pending(), "Script evaluated");
                slot.complete(outcome, &mut self.context);
            }
            Err(e) => {
                let thrown = e.to_opaque(&mut self.context);
                let text = reason_text(&thrown, &mut self.context);
                tracing::debug!(run_id, origin, "Script failed: {text}");
                slot.deliver(Err(BridgeError::Script(text)));
            }
        }

        handle
    }

    /// Drives the worker until the run behind `handle` settles.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Script`] if the script failed or its promise rejected
    /// - [`BridgeError::Stalled`] if the run is still pending but nothing is
    ///   left that could settle it
    /// - [`BridgeError::Timeout`] if a wait timeout is configured and elapses
    pub async fn wait(&mut self, handle: RunHandle) -> Result<JsValue> {
        match self.config.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, self.drive(handle))
                .await
                .map_err(|_| {
                    BridgeError::Timeout(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
                })?,
            None => self.drive(handle).await,
        }
    }

    async fn drive(&mut self, mut handle: RunHandle) -> Result<JsValue> {
        loop {
            self.advance_pending_work();

            match handle.receiver.try_recv() {
                Ok(outcome) => return outcome,
                // The run's promise was garbage collected while pending, so
                // nothing can settle it any more.
                Err(TryRecvError::Closed) => return Err(BridgeError::Stalled),
                Err(TryRecvError::Empty) => {}
            }

            if self.calls.in_flight() == 0 && !self.jobs.has_pending_jobs() {
                tracing::debug!(run_id = handle.run_id(), "Run cannot make progress");
                return Err(BridgeError::Stalled);
            }

            self.next_settlement().await?;
        }
    }

    /// Runs `source` and waits for its result.
    pub async fn run_to_completion(&mut self, source: &str, origin: &str) -> Result<JsValue> {
        let handle = self.run(source, origin);
        self.wait(handle).await
    }

    /// Drives the worker until no bound method call is in flight.
    pub async fn run_until_idle(&mut self) -> Result<()> {
        loop {
            self.advance_pending_work();
            if self.calls.in_flight() == 0 {
                return Ok(());
            }
            self.next_settlement().await?;
        }
    }

    async fn next_settlement(&mut self) -> Result<()> {
        let settlement = self
            .settlements
            .recv()
            .await
            .ok_or_else(|| BridgeError::Runtime("settlement channel closed".into()))?;
        self.apply(settlement);
        Ok(())
    }

    /// Applies every settlement that has already arrived, then runs queued
    /// promise jobs to completion. Never waits.
    ///
    /// Returns the number of settlements applied plus jobs run.
    pub fn advance_pending_work(&mut self) -> usize {
        let mut done = 0;
        while let Ok(settlement) = self.settlements.try_recv() {
            self.apply(settlement);
            done += 1;
        }
        done + self.jobs.drain(&mut self.context)
    }

    /// Settles the promise of one finished call.
    fn apply(&mut self, settlement: Settlement) {
        let Some(call) = self.calls.take(settlement.call_id) else {
            tracing::warn!(call_id = settlement.call_id, "Settlement for unknown call, ignoring");
            return;
        };

        let context = &mut self.context;
        let result = settlement
            .outcome
            .and_then(|text| reply_value(&text, context));
        self.stats
            .record(&call.label, call.started.elapsed(), result.is_ok());

        let settled = match result {
            Ok(value) => call.resolve.call(&JsValue::undefined(), &[value], context),
            Err(e) => {
                tracing::debug!(call_id = settlement.call_id, call = %call.label, "Rejecting call: {e}");
                let reason = JsValue::new(JsString::from(e.to_string().as_str()));
                call.reject.call(&JsValue::undefined(), &[reason], context)
            }
        };
        if let Err(e) = settled {
            tracing::error!(call_id = settlement.call_id, "Failed to settle call: {e}");
        }
    }

    /// Converts a script value to its JSON text.
    ///
    /// Uses the realm's original `JSON.stringify`, except that a value it
    /// maps to `undefined` becomes `null`.
    pub fn stringify(&mut self, value: &JsValue) -> Result<String> {
        self.stringify
            .text(value, &mut self.context)
            .map_err(|e| BridgeError::Encode(e.to_string()))
    }

    /// Converts a script value to JSON.
    pub fn to_json(&mut self, value: &JsValue) -> Result<JsonValue> {
        self.stringify
            .to_json(value, &mut self.context)
            .map_err(|e| BridgeError::Encode(e.to_string()))
    }

    /// Number of bound method calls whose promise has not settled yet.
    pub fn in_flight(&self) -> usize {
        self.calls.in_flight()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the statistics, readable from other threads.
    pub fn stats_handle(&self) -> Arc<CallStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let abandoned = self.calls.in_flight();
        if abandoned > 0 {
            tracing::debug!(abandoned, "Dropping worker with calls in flight");
        }
        // Parked resolvers reference the context's heap.
        self.calls.clear();
    }
}

/// Parses an encoded reply back into a script value.
fn reply_value(text: &str, context: &mut Context) -> Result<JsValue> {
    let json: JsonValue =
        serde_json::from_str(text).map_err(|e| BridgeError::Encode(e.to_string()))?;
    json_to_js_value(&json, context).map_err(|e| BridgeError::Encode(e.to_string()))
}
