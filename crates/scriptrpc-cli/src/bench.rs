//! The `bench` subcommand: many runs against one worker.
//!
//! Every run is started before any is waited on, so all of their bound
//! calls are in flight together.

use anyhow::{Context as _, Result};
use scriptrpc_worker::{StatsSnapshot, Worker};
use std::fmt;
use std::time::{Duration, Instant};

/// Timing summary of one benchmark.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub requests: usize,
    /// Time to start every run.
    pub all_started: Duration,
    /// Time until the last run finished.
    pub finished: Duration,
    /// Sum of per-run durations, each from its start to its result.
    pub total_request_time: Duration,
    pub stats: StatsSnapshot,
}

impl BenchReport {
    pub fn avg_request(&self) -> Duration {
        self.total_request_time / self.requests as u32
    }

    pub fn avg_clock(&self) -> Duration {
        self.finished / self.requests as u32
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "All started in: {:?}", self.all_started)?;
        writeln!(f, "Finished in {:?}", self.finished)?;
        writeln!(f, "Average Req Duration: {:?}", self.avg_request())?;
        write!(f, "Average Clock Time: {:?}", self.avg_clock())
    }
}

/// Runs `script` `requests` times and reports each stringified result to
/// `on_result`.
///
/// # Errors
///
/// Fails on the first run that errors, or if `requests` is zero or larger
/// than `u32::MAX`.
pub async fn run_bench(
    worker: &mut Worker,
    script: &str,
    requests: usize,
    mut on_result: impl FnMut(&str),
) -> Result<BenchReport> {
    if requests == 0 {
        anyhow::bail!("--requests must be at least 1");
    }
    u32::try_from(requests).context("--requests is too large")?;

    let start = Instant::now();
    let handles: Vec<_> = (0..requests)
        .map(|_| (Instant::now(), worker.run(script, "main.js")))
        .collect();
    let all_started = start.elapsed();
    tracing::debug!(requests, "All runs started");

    let mut total_request_time = Duration::ZERO;
    for (i, (started, handle)) in handles.into_iter().enumerate() {
        let value = worker
            .wait(handle)
            .await
            .with_context(|| format!("run {i} failed"))?;
        let text = worker.stringify(&value)?;
        total_request_time += started.elapsed();
        on_result(&text);
    }

    Ok(BenchReport {
        requests,
        all_started,
        finished: start.elapsed(),
        total_request_time,
        stats: worker.stats(),
    })
}
