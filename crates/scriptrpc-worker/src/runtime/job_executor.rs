//! Promise job queue for the worker's Boa context
//!
//! Boa hands every promise reaction and queued callback to a `JobExecutor`
//! instead of running it inline. This executor only stores those jobs; they
//! run when the worker advances its pending work, on the worker's own thread.
//!
//! # Job Types
//!
//! - **PromiseJob**: Microtasks for promise resolution (then/catch handlers)
//! - **GenericJob**: General-purpose jobs queued by the engine
//!
//! Bound service methods never enqueue native async jobs: their handlers run
//! as tokio tasks and report back through the worker's settlement channel.
//! Async and timeout jobs are therefore logged and dropped.
//!
//! # Execution Model
//!
//! `run_jobs` drains both queues to completion. Jobs enqueued while draining
//! (a `then` handler resolving another promise, for instance) run in the
//! same pass, so when it returns nothing is left to do until new external
//! input arrives.

use boa_engine::{
    context::Context,
    job::{GenericJob, Job, JobExecutor, PromiseJob},
    JsResult,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A `JobExecutor` that queues jobs until the owning worker drains them.
///
/// # Thread Safety
///
/// Uses `RefCell` for interior mutability, which is sound because a Boa
/// context and its executor never leave the thread that created them.
#[derive(Default)]
pub struct JobQueue {
    /// Queue for promise microtasks (then/catch handlers)
    promise_jobs: RefCell<VecDeque<PromiseJob>>,
    /// Queue for general-purpose jobs
    generic_jobs: RefCell<VecDeque<GenericJob>>,
    /// Number of jobs dropped because their kind is unsupported
    dropped: Cell<usize>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are pending jobs in any queue.
    pub fn has_pending_jobs(&self) -> bool {
        !self.promise_jobs.borrow().is_empty() || !self.generic_jobs.borrow().is_empty()
    }

    /// Number of jobs discarded because their kind is not supported.
    pub fn dropped_jobs(&self) -> usize {
        self.dropped.get()
    }

    /// Runs queued jobs until both queues are empty.
    ///
    /// Errors thrown by individual jobs are logged and do not stop the drain:
    /// an uncaught exception in one `then` handler must not starve the rest.
    /// Returns the number of jobs run.
    pub fn drain(&self, context: &mut Context) -> usize {
        let mut ran = 0;

        loop {
            // Microtasks first, then at most one generic job per round.
            while let Some(job) = self.next_promise_job() {
                ran += 1;
                if let Err(e) = job.call(context) {
                    tracing::error!("Uncaught error in promise job: {e}");
                }
            }

            let Some(generic) = self.next_generic_job() else {
                break;
            };
            ran += 1;
            if let Err(err) = generic.call(context) {
                tracing::error!("Uncaught error in generic job: {err}");
            }
        }

        context.clear_kept_objects();
        ran
    }

    fn next_promise_job(&self) -> Option<PromiseJob> {
        self.promise_jobs.borrow_mut().pop_front()
    }

    fn next_generic_job(&self) -> Option<GenericJob> {
        self.generic_jobs.borrow_mut().pop_front()
    }
}

impl JobExecutor for JobQueue {
    fn enqueue_job(self: Rc<Self>, job: Job, _context: &mut Context) {
        match job {
            Job::PromiseJob(job) => self.promise_jobs.borrow_mut().push_back(job),
            Job::GenericJob(job) => self.generic_jobs.borrow_mut().push_back(job),
            _ => {
                self.dropped.set(self.dropped.get() + 1);
                tracing::warn!("Unsupported job type enqueued, ignoring");
            }
        }
    }

    fn run_jobs(self: Rc<Self>, context: &mut Context) -> JsResult<()> {
        self.drain(context);
        Ok(())
    }
}
