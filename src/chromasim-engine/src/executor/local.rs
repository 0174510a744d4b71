//! Local executor.

use std::time::Instant;

use common_error::{ChromaError, ChromaResult};
use log::debug;

use crate::executor::{ExecutionContext, ExecutionResult, RuntimeConfig};
use crate::physical::PhysicalPlan;

/// Executes physical plans with the pull-based operator protocol.
#[derive(Debug, Default)]
pub struct LocalExecutor {
    config: RuntimeConfig,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `plan` to completion and collect its output.
    ///
    /// The plan is closed whether or not execution succeeds; no partial result
    /// is returned on failure.
    pub async fn execute(&self, plan: PhysicalPlan) -> ChromaResult<ExecutionResult> {
        let ctx = ExecutionContext::new(self.config.clone());
        let metrics = ctx.metrics().cloned().unwrap_or_default();

        let root = plan.root();
        let schema = plan.schema().clone();
        debug!("Executing plan:\n{}Output schema:\n{}", plan.explain(), schema);

        let start = Instant::now();
        let outcome = async {
            root.open(&ctx).await?;
            let mut batches = Vec::new();
            while let Some(batch) = root.next().await? {
                if batch.num_rows() > 0 {
                    batches.push(batch);
                }
            }
            Ok::<_, ChromaError>(batches)
        }
        .await;

        let closed = root.close().await;
        let batches = outcome?;
        closed?;

        Ok(ExecutionResult::new(batches, schema, metrics, start.elapsed()))
    }
}
