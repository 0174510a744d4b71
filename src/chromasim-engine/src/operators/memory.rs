//! In-memory source operator.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use common_error::{ChromaError, ChromaResult};

use crate::executor::ExecutionContext;
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

/// Source operator that replays a fixed list of batches.
///
/// Every `open()` restarts from the first batch.
#[derive(Debug)]
pub struct MemoryExec {
    batches: Vec<RecordBatch>,
    schema: PhysicalSchema,
    pending: tokio::sync::Mutex<VecDeque<RecordBatch>>,
}

impl MemoryExec {
    /// Batches must all carry `schema`.
    pub fn try_new(batches: Vec<RecordBatch>, schema: PhysicalSchema) -> ChromaResult<Self> {
        if let Some(batch) = batches
            .iter()
            .find(|b| b.schema().fields() != schema.arrow_schema().fields())
        {
            return Err(ChromaError::internal(format!(
                "batch schema {:?} does not match operator schema {:?}",
                batch.schema().fields(),
                schema.arrow_schema().fields()
            )));
        }
        Ok(Self {
            batches,
            schema,
            pending: tokio::sync::Mutex::new(VecDeque::new()),
        })
    }

    /// Source over the batches of one schema, taken from the first batch.
    pub fn from_batches(batches: Vec<RecordBatch>) -> ChromaResult<Self> {
        let schema = batches
            .first()
            .map(|b| PhysicalSchema::new(b.schema()))
            .unwrap_or_default();
        Self::try_new(batches, schema)
    }

    /// Source with no columns and no rows.
    pub fn empty() -> Self {
        Self::with_schema(PhysicalSchema::empty())
    }

    /// Source with the given schema and no rows.
    pub fn with_schema(schema: PhysicalSchema) -> Self {
        Self {
            batches: Vec::new(),
            schema,
            pending: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl PhysicalOperator for MemoryExec {
    fn name(&self) -> &'static str {
        "MemoryExec"
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

    async fn open(&self, _ctx: &ExecutionContext) -> ChromaResult<()> {
        let mut pending = self.pending.lock().await;
        *pending = self.batches.iter().cloned().collect();
        Ok(())
    }

    async fn next(&self) -> ChromaResult<Option<RecordBatch>> {
        Ok(self.pending.lock().await.pop_front())
    }

    async fn close(&self) -> ChromaResult<()> {
        self.pending.lock().await.clear();
        Ok(())
    }

    fn display(&self) -> String {
        format!("MemoryExec(batches={})", self.batches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[tokio::test]
    async fn test_memory_replays_batches() {
        let exec = MemoryExec::from_batches(vec![batch(vec![1, 2]), batch(vec![3])]).unwrap();
        let ctx = ExecutionContext::default();

        for _ in 0..2 {
            exec.open(&ctx).await.unwrap();
            assert_eq!(exec.next().await.unwrap().unwrap().num_rows(), 2);
            assert_eq!(exec.next().await.unwrap().unwrap().num_rows(), 1);
            assert!(exec.next().await.unwrap().is_none());
            exec.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_memory_empty() {
        let exec = MemoryExec::empty();
        exec.open(&ExecutionContext::default()).await.unwrap();
        assert!(exec.next().await.unwrap().is_none());
        assert_eq!(exec.schema().num_columns(), 0);
    }

    #[test]
    fn test_memory_schema_mismatch() {
        let other = PhysicalSchema::new(Arc::new(Schema::new(vec![Field::new(
            "name",
            DataType::Utf8,
            true,
        )])));
        assert!(MemoryExec::try_new(vec![batch(vec![1])], other).is_err());
    }
}
