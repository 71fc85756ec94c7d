//! Run outcomes
//!
//! A script's top-level value is classified once, right after its
//! synchronous body (and the microtasks it queued) finished. Whatever the
//! class, the run's terminal result travels through a single oneshot channel
//! held by its [`RunHandle`], so a run delivers either a value or an error,
//! never both and never twice.

use boa_engine::{
    builtins::promise::PromiseState,
    native_function::NativeFunction,
    object::{
        builtins::{JsFunction, JsPromise},
        FunctionObjectBuilder, JsObject,
    },
    value::JsValue,
    Context, JsNativeError, JsResult, JsString,
};
use boa_gc::{Finalize, Trace};
use scriptrpc_common::{BridgeError, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::oneshot;

/// State of a script's top-level value immediately after its synchronous body.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Not a promise.
    Immediate(JsValue),
    /// A promise that has not settled yet.
    Pending(JsPromise),
    /// A promise that was already fulfilled, with its value.
    Settled(JsValue),
    /// A promise that was already rejected, with its reason.
    Rejected(JsValue),
}

impl ExecutionOutcome {
    /// Classifies a top-level value.
    ///
    /// Only genuine promises count as asynchronous; a plain object with a
    /// `then` method is an immediate value.
    pub fn classify(value: JsValue) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Immediate(value);
        };
        let object: JsObject = object.clone();

        match JsPromise::from_object(object) {
            Ok(promise) => match promise.state() {
                PromiseState::Pending => Self::Pending(promise),
                PromiseState::Fulfilled(v) => Self::Settled(v),
                PromiseState::Rejected(reason) => Self::Rejected(reason),
            },
            Err(_) => Self::Immediate(value),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Receiving end of one run.
///
/// Pass it to [`Worker::wait`](crate::Worker::wait) to drive the worker until
/// the run settles.
#[derive(Debug)]
pub struct RunHandle {
    run_id: u64,
    origin: String,
    pub(crate) receiver: oneshot::Receiver<Result<JsValue>>,
}

impl RunHandle {
    pub(crate) fn new(run_id: u64, origin: &str) -> (Self, RunSlot) {
        let (sender, receiver) = oneshot::channel();
        let handle = Self {
            run_id,
            origin: origin.to_string(),
            receiver,
        };
        let slot = RunSlot {
            sender: Rc::new(RefCell::new(Some(sender))),
        };
        (handle, slot)
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Origin label the script was run under.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Sending end of one run, shared by both continuations of a pending
/// top-level promise. The first delivery wins.
#[derive(Clone, Trace, Finalize)]
pub(crate) struct RunSlot {
    #[unsafe_ignore_trace]
    sender: Rc<RefCell<Option<oneshot::Sender<Result<JsValue>>>>>,
}

impl RunSlot {
    /// Delivers the run's result. Returns `false` if it was already delivered
    /// or nobody is listening.
    pub fn deliver(&self, outcome: Result<JsValue>) -> bool {
        match self.sender.borrow_mut().take() {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Routes `outcome` into this slot, attaching continuations if the
    /// promise is still pending.
    pub fn complete(&self, outcome: ExecutionOutcome, context: &mut Context) {
        match outcome {
            ExecutionOutcome::Immediate(value) | ExecutionOutcome::Settled(value) => {
                self.deliver(Ok(value));
            }
            ExecutionOutcome::Rejected(reason) => {
                let text = reason_text(&reason, context);
                self.deliver(Err(BridgeError::Script(text)));
            }
            ExecutionOutcome::Pending(promise) => {
                let on_fulfilled = FunctionObjectBuilder::new(
                    context.realm(),
                    NativeFunction::from_copy_closure_with_captures(on_fulfilled, self.clone()),
                )
                .length(1)
                .build();
                let on_rejected = FunctionObjectBuilder::new(
                    context.realm(),
                    NativeFunction::from_copy_closure_with_captures(on_rejected, self.clone()),
                )
                .length(1)
                .build();

                if let Err(e) = attach(&promise, on_fulfilled, on_rejected, context) {
                    let thrown = e.to_opaque(context);
                    let text = reason_text(&thrown, context);
                    tracing::debug!("Failed to attach run continuations: {text}");
                    self.deliver(Err(BridgeError::Script(text)));
                }
            }
        }
    }
}

/// Calls `Promise.prototype.then` on `promise`.
///
/// A script can make this throw (for instance by replacing the promise's
/// `constructor`), so the error is returned rather than unwrapped.
fn attach(
    promise: &JsPromise,
    on_fulfilled: JsFunction,
    on_rejected: JsFunction,
    context: &mut Context,
) -> JsResult<()> {
    let prototype = context.intrinsics().constructors().promise().prototype();
    let then = prototype.get(JsString::from("then"), context)?;
    let then = then.as_callable().ok_or_else(|| {
        JsNativeError::typ().with_message("Promise.prototype.then is not callable")
    })?;
    then.call(
        &JsValue::from(promise.clone()),
        &[on_fulfilled.into(), on_rejected.into()],
        context,
    )?;
    Ok(())
}

fn on_fulfilled(
    _this: &JsValue,
    args: &[JsValue],
    slot: &RunSlot,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let value = args.first().cloned().unwrap_or_else(JsValue::undefined);
    slot.deliver(Ok(value));
    Ok(JsValue::undefined())
}

fn on_rejected(
    _this: &JsValue,
    args: &[JsValue],
    slot: &RunSlot,
    context: &mut Context,
) -> JsResult<JsValue> {
    let reason = args.first().cloned().unwrap_or_else(JsValue::undefined);
    let text = reason_text(&reason, context);
    slot.deliver(Err(BridgeError::Script(text)));
    Ok(JsValue::undefined())
}

/// Human-readable text of a thrown value or rejection reason.
///
/// Error objects render as `Name: message`, strings as themselves.
pub(crate) fn reason_text(reason: &JsValue, context: &mut Context) -> String {
    match reason.to_string(context) {
        Ok(text) => text.to_std_string_escaped(),
        Err(_) => reason.display().to_string(),
    }
}
