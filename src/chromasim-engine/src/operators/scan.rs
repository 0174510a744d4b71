//! Dataset scan operator.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::StreamExt;

use chromasim_storage::{Dataset, RecordBatchStream, ScanOptions};
use common_error::{ChromaError, ChromaResult};

use crate::executor::ExecutionContext;
use crate::metrics::{ExecutionTimer, OperatorMetricsHandle};
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

#[derive(Default)]
enum ScanState {
    #[default]
    Uninitialized,
    Open {
        stream: RecordBatchStream,
    },
    Exhausted,
    Closed,
}

impl std::fmt::Debug for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Open { .. } => write!(f, "Open"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Reads the rows of a [`Dataset`], restricted to a set of columns.
///
/// Batch size and read-ahead come from the [`ExecutionContext`] the
/// operator is opened with.
#[derive(Debug)]
pub struct ScanExec {
    dataset: Dataset,
    columns: Option<Vec<String>>,
    schema: PhysicalSchema,
    state: tokio::sync::Mutex<ScanState>,
    metrics: OperatorMetricsHandle,
}

impl ScanExec {
    /// Scan `columns` of `dataset`, or every column when `None`.
    pub fn try_new(dataset: Dataset, columns: Option<Vec<String>>) -> ChromaResult<Self> {
        let schema = PhysicalSchema::new(dataset.projected_schema(columns.as_deref())?);
        let metrics = OperatorMetricsHandle::new(format!("ScanExec[{}]", dataset.root().display()));
        Ok(Self {
            dataset,
            columns,
            schema,
            state: tokio::sync::Mutex::new(ScanState::Uninitialized),
            metrics,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }
}

#[async_trait]
impl PhysicalOperator for ScanExec {
    fn name(&self) -> &'static str {
        "ScanExec"
    }

    fn schema(&self) -> &PhysicalSchema {
        &self.schema
    }

    fn capabilities(&self) -> OperatorCaps {
        OperatorCaps::streaming()
    }

    fn children(&self) -> Vec<&Arc<dyn PhysicalOperator>> {
        vec![]
    }

    async fn open(&self, ctx: &ExecutionContext) -> ChromaResult<()> {
        let timer = ExecutionTimer::start();
        self.metrics.bind(ctx.metrics());

        let mut options = ScanOptions::default()
            .with_batch_size(ctx.config().batch_size)
            .with_parallelism(ctx.config().parallelism);
        options.columns = self.columns.clone();
        let stream = self.dataset.scan(&options)?;

        *self.state.lock().await = ScanState::Open { stream };

        self.metrics.update(|m| m.add_time(timer.stop()));
        Ok(())
    }

    async fn next(&self) -> ChromaResult<Option<RecordBatch>> {
        let timer = ExecutionTimer::start();
        let mut state = self.state.lock().await;

        let result = match &mut *state {
            ScanState::Uninitialized => Err(ChromaError::execution("ScanExec not opened")),
            ScanState::Open { stream } => match stream.next().await {
                Some(Ok(batch)) => Ok(Some(batch)),
                Some(Err(e)) => Err(e),
                None => {
                    *state = ScanState::Exhausted;
                    Ok(None)
                }
            },
            ScanState::Exhausted | ScanState::Closed => Ok(None),
        };

        if let Ok(Some(batch)) = &result {
            let rows = batch.num_rows();
            self.metrics.update(|m| {
                m.add_rows_in(rows);
                m.add_rows_out(rows);
                m.add_batch();
                m.add_time(timer.elapsed());
            });
        }
        result
    }

    async fn close(&self) -> ChromaResult<()> {
        *self.state.lock().await = ScanState::Closed;
        Ok(())
    }

    fn display(&self) -> String {
        let columns = match &self.columns {
            Some(columns) => columns.join(", "),
            None => "*".to_string(),
        };
        format!(
            "ScanExec(path={}, format={}, columns=[{columns}])",
            self.dataset.root().display(),
            self.dataset.format()
        )
    }
}
