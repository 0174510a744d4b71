//! Filter execution operator.

use std::sync::Arc;

use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use chromasim_logical::LogicalExpr;
use common_error::ChromaResult;

use crate::executor::ExecutionContext;
use crate::expr::ExprEvaluator;
use crate::metrics::{ExecutionTimer, OperatorMetricsHandle};
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

/// Keeps the rows for which the predicate is `true`.
///
/// Rows where the predicate is `false` or `null` are dropped. Batches that
/// end up empty are skipped.
#[derive(Debug)]
pub struct FilterExec {
    input: Arc<dyn PhysicalOperator>,
    predicate: LogicalExpr,
    schema: PhysicalSchema,
    evaluator: ExprEvaluator,
    metrics: OperatorMetricsHandle,
}

impl FilterExec {
    #[must_use]
    pub fn new(input: Arc<dyn PhysicalOperator>, predicate: LogicalExpr) -> Self {
        let schema = input.schema().clone();
        let metrics = OperatorMetricsHandle::new(format!("FilterExec[{predicate}]"));

        Self {
            input,
            predicate,
            schema,
            evaluator: ExprEvaluator::new(),
            metrics,
        }
    }

    pub fn predicate(&self) -> &LogicalExpr {
        &self.predicate
    }

    fn filter_batch(&self, batch: &RecordBatch) -> ChromaResult<RecordBatch> {
        let mask = self.evaluator.evaluate_predicate(&self.predicate, batch)?;
        Ok(filter_record_batch(batch, &mask)?)
    }
}

#[async_trait]
impl PhysicalOperator for FilterExec {
    fn name(&self) -> &'static str {
        "FilterExec"
    }

    fn schema(&self) -> &PhysicalSchema {
        &self.schema
    }

    fn capabilities(&self) -> OperatorCaps {
        OperatorCaps::streaming()
    }

    fn children(&self) -> Vec<&Arc<dyn PhysicalOperator>> {
        vec![&self.input]
    }

    async fn open(&self, ctx: &ExecutionContext) -> ChromaResult<()> {
        self.metrics.bind(ctx.metrics());
        self.input.open(ctx).await
    }

    async fn next(&self) -> ChromaResult<Option<RecordBatch>> {
        while let Some(batch) = self.input.next().await? {
            let timer = ExecutionTimer::start();
            let filtered = self.filter_batch(&batch)?;
            let output_rows = filtered.num_rows();

            self.metrics.update(|m| {
                m.add_rows_in(batch.num_rows());
                m.add_rows_out(output_rows);
                m.add_batch();
                m.add_time(timer.stop());
            });

            if output_rows > 0 {
                return Ok(Some(filtered));
            }
        }
        Ok(None)
    }

    async fn close(&self) -> ChromaResult<()> {
        self.input.close().await
    }

    fn display(&self) -> String {
        format!("FilterExec({})", self.predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::MemoryExec;
    use arrow::array::{AsArray, Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Int64Type, Schema};
    use chromasim_logical::{col, lit, ScalarFunc};

    fn create_test_input() -> Arc<dyn PhysicalOperator> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("color", DataType::Float64, true),
        ]));
        let first = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Float64Array::from(vec![Some(-1.0), Some(0.5), None])),
            ],
        )
        .unwrap();
        let second = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![4, 5])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(-0.2)])),
            ],
        )
        .unwrap();
        Arc::new(MemoryExec::from_batches(vec![first, second]).unwrap())
    }

    async fn collect_ids(filter: &FilterExec) -> Vec<i64> {
        filter.open(&ExecutionContext::default()).await.unwrap();
        let mut ids = Vec::new();
        while let Some(batch) = filter.next().await.unwrap() {
            ids.extend(batch.column(0).as_primitive::<Int64Type>().values().iter());
        }
        filter.close().await.unwrap();
        ids
    }

    #[tokio::test]
    async fn test_filter_true_predicate() {
        let filter = FilterExec::new(create_test_input(), lit(true));
        assert_eq!(collect_ids(&filter).await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_filter_false_predicate() {
        let filter = FilterExec::new(create_test_input(), lit(false));
        assert!(collect_ids(&filter).await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_drops_null_rows() {
        let filter = FilterExec::new(create_test_input(), col("color").gt(lit(0)));
        assert_eq!(collect_ids(&filter).await, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_filter_skips_emptied_batches() {
        let predicate = col("id").lt_eq(lit(2));
        let filter = FilterExec::new(create_test_input(), predicate);
        filter.open(&ExecutionContext::default()).await.unwrap();

        assert_eq!(filter.next().await.unwrap().unwrap().num_rows(), 2);
        assert!(filter.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filter_nary_and() {
        let predicate = LogicalExpr::call(
            ScalarFunc::And,
            vec![
                col("id").gt(lit(1)),
                col("id").lt(lit(5)),
                call_is_valid("color"),
            ],
        );
        let filter = FilterExec::new(create_test_input(), predicate);
        assert_eq!(collect_ids(&filter).await, vec![2, 4]);
    }

    fn call_is_valid(name: &str) -> LogicalExpr {
        LogicalExpr::call(ScalarFunc::IsValid, vec![col(name)])
    }

    #[tokio::test]
    async fn test_filter_non_boolean_predicate() {
        let filter = FilterExec::new(create_test_input(), col("id"));
        filter.open(&ExecutionContext::default()).await.unwrap();
        assert!(filter.next().await.is_err());
    }

    #[tokio::test]
    async fn test_filter_records_metrics() {
        let filter = FilterExec::new(create_test_input(), col("id").gt(lit(3)));
        let ctx = ExecutionContext::default();
        filter.open(&ctx).await.unwrap();
        while filter.next().await.unwrap().is_some() {}

        let metrics = ctx.metrics().unwrap().get("FilterExec[greater(id, 3)]").unwrap();
        assert_eq!(metrics.rows_in, 5);
        assert_eq!(metrics.rows_out, 2);
    }

    #[test]
    fn test_filter_schema_and_caps() {
        let input = create_test_input();
        let filter = FilterExec::new(input, lit(true));
        assert_eq!(filter.schema().num_columns(), 2);
        assert!(!filter.capabilities().blocking);
    }
}
