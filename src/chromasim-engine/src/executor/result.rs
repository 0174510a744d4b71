//! Execution result types.

use std::fmt::Write;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use common_error::ChromaResult;

use crate::metrics::MetricsSink;
use crate::physical::PhysicalSchema;

/// Output of a plan execution.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Output batches.
    pub batches: Vec<RecordBatch>,
    /// Output schema.
    pub schema: PhysicalSchema,
    /// Per-operator metrics.
    pub metrics: MetricsSink,
    /// Total execution time.
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub const fn new(
        batches: Vec<RecordBatch>,
        schema: PhysicalSchema,
        metrics: MetricsSink,
        elapsed: Duration,
    ) -> Self {
        Self {
            batches,
            schema,
            metrics,
            elapsed,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub const fn num_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    pub fn arrow_schema(&self) -> &arrow::datatypes::SchemaRef {
        self.schema.arrow_schema()
    }

    /// Combine all batches into one, empty but typed when there is no output.
    pub fn concat(&self) -> ChromaResult<RecordBatch> {
        if self.batches.is_empty() {
            return Ok(RecordBatch::new_empty(self.schema.arrow_schema().clone()));
        }
        Ok(arrow::compute::concat_batches(
            self.schema.arrow_schema(),
            &self.batches,
        )?)
    }

    /// Format as EXPLAIN ANALYZE output.
    pub fn explain_analyze(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Execution Time: {:?}", self.elapsed);
        let _ = writeln!(output, "Total Rows: {}", self.total_rows());
        let _ = writeln!(output, "Batches: {}", self.num_batches());
        output.push_str("\nOperator Metrics:\n");
        output.push_str(&self.metrics.format_analyze());
        output
    }
}

impl IntoIterator for ExecutionResult {
    type Item = RecordBatch;
    type IntoIter = std::vec::IntoIter<RecordBatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}
