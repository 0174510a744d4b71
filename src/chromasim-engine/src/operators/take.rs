//! Positional take operator.

use std::sync::Arc;

use arrow::array::UInt64Array;
use arrow::compute::{concat_batches, take_record_batch};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use common_error::{ChromaError, ChromaResult};

use crate::executor::ExecutionContext;
use crate::metrics::{ExecutionTimer, OperatorMetricsHandle};
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

#[derive(Debug, Default)]
enum TakeState {
    #[default]
    Pending,
    Exhausted,
}

/// Materializes the input rows at the given positions.
///
/// Positions count rows of the input stream from zero. Output row `k` is the
/// input row at `indices[k]`: repeated positions produce repeated rows and the
/// order of `indices` is kept. A **blocking** operator that emits one batch.
#[derive(Debug)]
pub struct TakeExec {
    input: Arc<dyn PhysicalOperator>,
    indices: Vec<u64>,
    /// Distinct positions, ascending.
    sorted: Vec<u64>,
    schema: PhysicalSchema,
    state: tokio::sync::Mutex<TakeState>,
    metrics: OperatorMetricsHandle,
}

impl TakeExec {
    pub fn new(input: Arc<dyn PhysicalOperator>, indices: Vec<u64>) -> Self {
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        let schema = input.schema().clone();
        let metrics = OperatorMetricsHandle::new(format!("TakeExec[{}]", indices.len()));

        Self {
            input,
            indices,
            sorted,
            schema,
            state: tokio::sync::Mutex::new(TakeState::Pending),
            metrics,
        }
    }

    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// Gather the distinct positions in ascending order, then reorder them
    /// into the requested order.
    async fn gather(&self) -> ChromaResult<RecordBatch> {
        let arrow_schema = self.schema.arrow_schema().clone();
        let mut pieces = Vec::new();
        let mut offset = 0u64;
        let mut next = 0usize;

        while next < self.sorted.len() {
            let Some(batch) = self.input.next().await? else {
                break;
            };
            let timer = ExecutionTimer::start();
            let rows = batch.num_rows() as u64;
            let end = offset + rows;

            let start = next;
            while next < self.sorted.len() && self.sorted[next] < end {
                next += 1;
            }
            if next > start {
                let local = UInt64Array::from_iter_values(
                    self.sorted[start..next].iter().map(|&i| i - offset),
                );
                pieces.push(take_record_batch(&batch, &local)?);
            }

            self.metrics.update(|m| {
                m.add_rows_in(batch.num_rows());
                m.add_batch();
                m.add_time(timer.stop());
            });
            offset = end;
        }

        if next < self.sorted.len() {
            return Err(ChromaError::execution(format!(
                "row index {} is out of range for {offset} rows",
                self.sorted[next]
            )));
        }

        let distinct = concat_batches(&arrow_schema, &pieces)?;
        let ranks = self
            .indices
            .iter()
            .map(|index| {
                self.sorted
                    .binary_search(index)
                    .map(|rank| rank as u64)
                    .map_err(|_| {
                        ChromaError::internal(format!("row index {index} was not gathered"))
                    })
            })
            .collect::<ChromaResult<Vec<_>>>()?;
        let positions = UInt64Array::from(ranks);
        let output = take_record_batch(&distinct, &positions)?;

        self.metrics.update(|m| m.add_rows_out(output.num_rows()));
        Ok(output)
    }
}

#[async_trait]
impl PhysicalOperator for TakeExec {
    fn name(&self) -> &'static str {
        "TakeExec"
    }

    fn schema(&self) -> &PhysicalSchema {
        &self.schema
    }

    fn capabilities(&self) -> OperatorCaps {
        OperatorCaps::blocking()
    }

    fn children(&self) -> Vec<&Arc<dyn PhysicalOperator>> {
        vec![&self.input]
    }

    async fn open(&self, ctx: &ExecutionContext) -> ChromaResult<()> {
        self.metrics.bind(ctx.metrics());
        *self.state.lock().await = TakeState::Pending;
        self.input.open(ctx).await
    }

    async fn next(&self) -> ChromaResult<Option<RecordBatch>> {
        let mut state = self.state.lock().await;
        match *state {
            TakeState::Exhausted => Ok(None),
            TakeState::Pending => {
                let batch = self.gather().await?;
                *state = TakeState::Exhausted;
                Ok(Some(batch))
            }
        }
    }

    async fn close(&self) -> ChromaResult<()> {
        *self.state.lock().await = TakeState::Exhausted;
        self.input.close().await
    }

    fn display(&self) -> String {
        format!("TakeExec(rows={})", self.indices.len())
    }
}
