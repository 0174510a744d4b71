//! Metrics collection for plan execution.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Metrics for a single operator execution.
#[derive(Debug, Clone, Default)]
pub struct OperatorMetrics {
    /// Number of input rows processed.
    pub rows_in: u64,
    /// Number of output rows produced.
    pub rows_out: u64,
    /// Total execution time.
    pub exec_time: Duration,
    /// Number of batches processed.
    pub batches: u64,
}

impl OperatorMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows_in: 0,
            rows_out: 0,
            exec_time: Duration::new(0, 0),
            batches: 0,
        }
    }

    pub fn add_rows_in(&mut self, count: usize) {
        self.rows_in += count as u64;
    }

    pub fn add_rows_out(&mut self, count: usize) {
        self.rows_out += count as u64;
    }

    pub fn add_time(&mut self, duration: Duration) {
        self.exec_time += duration;
    }

    pub fn add_batch(&mut self) {
        self.batches += 1;
    }

    /// Fraction of input rows that reached the output.
    pub fn selectivity(&self) -> f64 {
        if self.rows_in == 0 {
            1.0
        } else {
            self.rows_out as f64 / self.rows_in as f64
        }
    }
}

impl std::fmt::Display for OperatorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows_in={}, rows_out={}, selectivity={:.3}, time={:?}, batches={}",
            self.rows_in,
            self.rows_out,
            self.selectivity(),
            self.exec_time,
            self.batches
        )
    }
}

/// Sink for collecting operator metrics, keyed by operator id.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    metrics: Arc<RwLock<BTreeMap<String, OperatorMetrics>>>,
}

impl MetricsSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics for an operator in place.
    pub fn update<F>(&self, operator_id: &str, f: F)
    where
        F: FnOnce(&mut OperatorMetrics),
    {
        let mut guard = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        f(guard.entry(operator_id.to_string()).or_default());
    }

    pub fn get(&self, operator_id: &str) -> Option<OperatorMetrics> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operator_id)
            .cloned()
    }

    /// Format metrics for EXPLAIN ANALYZE.
    pub fn format_analyze(&self) -> String {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        let mut output = String::new();

        for (op, m) in metrics.iter() {
            let _ = writeln!(output, "{op}: {m}");
        }

        if output.is_empty() {
            output.push_str("No metrics collected.\n");
        }

        output
    }
}

/// Timer for measuring operator execution time.
#[derive(Debug)]
pub struct ExecutionTimer {
    start: Instant,
}

impl ExecutionTimer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[must_use]
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Reports one operator's metrics into the sink of the context it was opened with.
#[derive(Debug)]
pub struct OperatorMetricsHandle {
    operator_id: String,
    sink: OnceLock<MetricsSink>,
}

impl OperatorMetricsHandle {
    pub fn new(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            sink: OnceLock::new(),
        }
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    /// Attach to a sink. Only the first attached sink is kept.
    pub fn bind(&self, sink: Option<&MetricsSink>) {
        if let Some(sink) = sink {
            let _ = self.sink.set(sink.clone());
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut OperatorMetrics),
    {
        if let Some(sink) = self.sink.get() {
            sink.update(&self.operator_id, f);
        }
    }
}
