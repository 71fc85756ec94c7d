//! In-flight call bookkeeping
//!
//! A bound method call has two halves that live on different threads:
//!
//! - The worker thread owns the promise and its resolving functions. They
//!   are parked in the [`CallRegistry`] under the call's id as a
//!   [`PendingCall`], because Boa values must never leave that thread.
//! - A tokio task runs the handler. It owns a [`SettlementTicket`] and, when
//!   the handler is done, sends a [`Settlement`] (encoded reply text or
//!   error) back over the registry's channel.
//!
//! The worker applies settlements as it drains the channel, so promises are
//! only ever resolved or rejected on the thread that created them.

use boa_engine::object::builtins::JsFunction;
use scriptrpc_common::{encode_reply, BoundMethod, BridgeError, CallId, Decoder, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

/// Outcome of one call, sent from the handler task to the worker.
#[derive(Debug)]
pub(crate) struct Settlement {
    pub call_id: CallId,
    pub outcome: Result<String>,
}

/// Worker-side state of a call whose promise has not settled yet.
pub(crate) struct PendingCall {
    pub label: String,
    pub resolve: JsFunction,
    pub reject: JsFunction,
    pub started: Instant,
}

/// Carried by a handler task; settles its call exactly once.
///
/// If the task ends without calling [`settle`](Self::settle) (the handler
/// panicked or the task was aborted), dropping the ticket sends a rejection
/// so the worker still releases the call.
pub(crate) struct SettlementTicket {
    call_id: CallId,
    sender: UnboundedSender<Settlement>,
    settled: bool,
}

impl SettlementTicket {
    pub fn settle(mut self, outcome: Result<String>) {
        self.settled = true;
        self.send(outcome);
    }

    fn send(&self, outcome: Result<String>) {
        let settlement = Settlement {
            call_id: self.call_id,
            outcome,
        };
        if self.sender.send(settlement).is_err() {
            tracing::debug!(call_id = self.call_id, "Worker is gone, dropping settlement");
        }
    }
}

impl Drop for SettlementTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.send(Err(BridgeError::handler(
                "handler terminated without producing a response",
            )));
        }
    }
}

/// Per-worker table of in-flight calls.
///
/// Shared (via `Rc`) between the worker and every bound method function
/// installed in its context.
pub(crate) struct CallRegistry {
    next_id: Cell<CallId>,
    pending: RefCell<HashMap<CallId, PendingCall>>,
    settlements: UnboundedSender<Settlement>,
    runtime: Handle,
}

impl CallRegistry {
    pub fn new(runtime: Handle, settlements: UnboundedSender<Settlement>) -> Self {
        Self {
            next_id: Cell::new(1),
            pending: RefCell::new(HashMap::new()),
            settlements,
            runtime,
        }
    }

    /// Parks the promise's resolving functions and spawns the handler for one call of `method`.
    ///
    /// Decode, handler, encode and settlement happen in that order on the
    /// spawned task.
    pub fn start(
        &self,
        method: &BoundMethod,
        raw: String,
        resolve: JsFunction,
        reject: JsFunction,
    ) -> CallId {
        let call_id = self.next_id.get();
        self.next_id.set(call_id + 1);

        self.pending.borrow_mut().insert(
            call_id,
            PendingCall {
                label: format!("{}.{}", method.service(), method.name()),
                resolve,
                reject,
                started: Instant::now(),
            },
        );

        let ticket = SettlementTicket {
            call_id,
            sender: self.settlements.clone(),
            settled: false,
        };
        let span = tracing::debug_span!(
            "rpc_call",
            call_id,
            service = method.service(),
            method = method.name()
        );
        let ctx = method.context(call_id);
        let method = method.clone();

        self.runtime.spawn(
            async move {
                let outcome = method
                    .invoke(ctx, Decoder::new(raw))
                    .await
                    .and_then(|reply| encode_reply(&reply));
                if let Err(e) = &outcome {
                    tracing::debug!("Call failed: {e}");
                }
                ticket.settle(outcome);
            }
            .instrument(span),
        );

        call_id
    }

    /// Removes and returns the pending call `call_id`, if it is still parked.
    pub fn take(&self, call_id: CallId) -> Option<PendingCall> {
        self.pending.borrow_mut().remove(&call_id)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drops every parked call without settling it.
    pub fn clear(&self) {
        self.pending.borrow_mut().clear();
    }
}
