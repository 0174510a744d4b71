//! Execution context passed to operators.

use crate::metrics::MetricsSink;

/// Runtime configuration for execution.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum rows per batch produced by scans.
    pub batch_size: usize,
    /// Number of fragments decoded concurrently by scans.
    pub parallelism: usize,
    /// Enable metrics collection.
    pub collect_metrics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            parallelism: 1,
            collect_metrics: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }
}

/// Context shared read-only by every operator of a running plan.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Metrics sink for operator statistics.
    pub metrics: Option<MetricsSink>,
    /// Runtime configuration.
    pub config: RuntimeConfig,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl ExecutionContext {
    pub fn new(config: RuntimeConfig) -> Self {
        let metrics = config.collect_metrics.then(MetricsSink::new);
        Self { metrics, config }
    }

    /// Use the given metrics sink.
    pub fn with_metrics(mut self, metrics: MetricsSink) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&MetricsSink> {
        self.metrics.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_toggle() {
        let ctx = ExecutionContext::new(RuntimeConfig::default().with_metrics(false));
        assert!(ctx.metrics().is_none());

        let sink = MetricsSink::new();
        let ctx = ExecutionContext::default().with_metrics(sink.clone());
        ctx.metrics().unwrap().update("ScanExec", |m| m.add_batch());
        assert_eq!(sink.get("ScanExec").unwrap().batches, 1);
    }

    #[test]
    fn test_config_clamps() {
        let config = RuntimeConfig::default()
            .with_batch_size(0)
            .with_parallelism(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.parallelism, 1);
    }
}
