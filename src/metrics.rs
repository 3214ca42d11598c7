//! Conversion counters.
//!
//! [`ConversionMetrics`] keeps process-wide totals plus one counter per
//! conversion kind. Every conversion attempt increments it exactly once.
//! Counters only grow; there is no reset.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::gate::GateStatus;

/// Prefix for every exported metric name.
pub const METRIC_PREFIX: &str = "pdf_forge";

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Count per conversion kind, ordered by label.
    pub by_type: BTreeMap<String, u64>,
}

/// Atomic conversion counters shared across requests.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    by_type: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished attempt of the given kind.
    pub fn increment(&self, kind: &str, success: bool) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if success {
            self.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.counter_for(kind).fetch_add(1, Ordering::SeqCst);
    }

    fn counter_for(&self, kind: &str) -> Arc<AtomicU64> {
        {
            let map = self.by_type.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = map.get(kind) {
                return Arc::clone(counter);
            }
        }

        let mut map = self.by_type.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            map.entry(kind.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }

    /// Copy the counters.
    ///
    /// Each field is read atomically; the set as a whole is not a single
    /// atomic observation while conversions are in flight.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_type = self
            .by_type
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(kind, count)| (kind.clone(), count.load(Ordering::SeqCst)))
            .collect();

        MetricsSnapshot {
            total: self.total.load(Ordering::SeqCst),
            successful: self.successful.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            by_type,
        }
    }
}

/// Render counters and gate occupancy in Prometheus text exposition format.
pub fn render_prometheus(snapshot: &MetricsSnapshot, gate: &GateStatus) -> String {
    let mut out = String::new();

    let mut counter = |name: &str, help: &str, value: u64| {
        let _ = writeln!(out, "# HELP {METRIC_PREFIX}_{name} {help}");
        let _ = writeln!(out, "# TYPE {METRIC_PREFIX}_{name} counter");
        let _ = writeln!(out, "{METRIC_PREFIX}_{name} {value}");
    };
    counter("conversions_total", "Total number of conversions", snapshot.total);
    counter(
        "conversions_successful",
        "Number of successful conversions",
        snapshot.successful,
    );
    counter("conversions_failed", "Number of failed conversions", snapshot.failed);

    let mut gauge = |name: &str, help: &str, value: usize| {
        let _ = writeln!(out, "# HELP {METRIC_PREFIX}_{name} {help}");
        let _ = writeln!(out, "# TYPE {METRIC_PREFIX}_{name} gauge");
        let _ = writeln!(out, "{METRIC_PREFIX}_{name} {value}");
    };
    gauge("workers_max", "Configured rendering slots", gate.max);
    gauge("workers_available", "Free rendering slots", gate.available);
    gauge("workers_in_use", "Rendering slots in use", gate.in_use);

    for (kind, count) in &snapshot.by_type {
        let _ = writeln!(out, "{METRIC_PREFIX}_conversions_by_type_{kind} {count}");
    }

    out
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_partitions_by_kind() {
        let metrics = ConversionMetrics::new();

        metrics.increment("html", true);
        metrics.increment("html", false);
        metrics.increment("url", true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.successful, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.by_type.get("html"), Some(&2));
        assert_eq!(snapshot.by_type.get("url"), Some(&1));
        assert_eq!(snapshot.by_type.values().sum::<u64>(), snapshot.total);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ConversionMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    /// Concurrent increments from many threads are never lost.
    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(ConversionMetrics::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    let kind = if i % 2 == 0 { "html" } else { "markdown" };
                    for n in 0..250 {
                        metrics.increment(kind, n % 5 != 0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 2000);
        assert_eq!(snapshot.successful + snapshot.failed, 2000);
        assert_eq!(snapshot.failed, 400);
        assert_eq!(snapshot.by_type.get("html"), Some(&1000));
        assert_eq!(snapshot.by_type.get("markdown"), Some(&1000));
    }

    #[test]
    fn test_render_prometheus() {
        let metrics = ConversionMetrics::new();
        metrics.increment("html", true);
        metrics.increment("url", false);

        let gate = GateStatus {
            max: 4,
            in_use: 1,
            available: 3,
        };
        let text = render_prometheus(&metrics.snapshot(), &gate);

        assert!(text.contains("pdf_forge_conversions_total 2\n"));
        assert!(text.contains("pdf_forge_conversions_successful 1\n"));
        assert!(text.contains("pdf_forge_conversions_failed 1\n"));
        assert!(text.contains("# TYPE pdf_forge_workers_available gauge\n"));
        assert!(text.contains("pdf_forge_workers_in_use 1\n"));
        assert!(text.contains("pdf_forge_conversions_by_type_html 1\n"));
        assert!(text.contains("pdf_forge_conversions_by_type_url 1\n"));
    }
}
