//! Per-method call statistics.
//!
//! Every settled call is recorded under its `service.method` label with its
//! outcome and latency (from dispatch to settlement). Counters are atomics so
//! a [`CallStats`] handle can be read from any thread while the worker keeps
//! recording.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MethodCounters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl MethodCounters {
    fn record(&self, latency_us: u64, success: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MethodStats {
        let calls = self.calls.load(Ordering::Relaxed);
        let total = self.total_latency_us.load(Ordering::Relaxed);
        MethodStats {
            calls,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            avg_latency_us: if calls == 0 { 0 } else { total / calls },
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for one bound method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
}

/// Point-in-time copy of a worker's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub uptime_ms: u64,
    pub total_calls: u64,
    /// Keyed by `service.method`, e.g. `clock.Clock.Now`.
    pub methods: BTreeMap<String, MethodStats>,
}

/// Thread-safe call statistics registry.
#[derive(Debug)]
pub struct CallStats {
    methods: RwLock<HashMap<String, Arc<MethodCounters>>>,
    started: Instant,
}

impl CallStats {
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    /// Records one settled call of `label`.
    pub fn record(&self, label: &str, latency: Duration, success: bool) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.counters(label).record(latency_us, success);
    }

    fn counters(&self, label: &str) -> Arc<MethodCounters> {
        if let Some(counters) = self
            .methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(label)
        {
            return Arc::clone(counters);
        }

        let mut methods = self.methods.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(methods.entry(label.to_string()).or_default())
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let methods: BTreeMap<String, MethodStats> = self
            .methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(label, counters)| (label.clone(), counters.snapshot()))
            .collect();

        StatsSnapshot {
            uptime_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            total_calls: methods.values().map(|m| m.calls).sum(),
            methods,
        }
    }
}

impl Default for CallStats {
    fn default() -> Self {
        Self::new()
    }
}
