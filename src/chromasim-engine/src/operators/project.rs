//! Project execution operator.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_trait::async_trait;

use chromasim_logical::Projection;
use common_error::ChromaResult;

use crate::executor::ExecutionContext;
use crate::expr::ExprEvaluator;
use crate::metrics::{ExecutionTimer, OperatorMetricsHandle};
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

/// Evaluates a [`Projection`] and keeps only its output columns.
#[derive(Debug)]
pub struct ProjectExec {
    input: Arc<dyn PhysicalOperator>,
    projection: Projection,
    schema: PhysicalSchema,
    evaluator: ExprEvaluator,
    metrics: OperatorMetricsHandle,
}

impl ProjectExec {
    /// Create a project operator, inferring the output schema from the input.
    ///
    /// Fails with a type error or a missing column when an expression cannot be
    /// evaluated against the input schema.
    pub fn try_new(input: Arc<dyn PhysicalOperator>, projection: Projection) -> ChromaResult<Self> {
        let input_schema = input.schema().arrow_schema().clone();
        let fields = projection
            .iter()
            .map(|(name, expr)| {
                let data_type = expr.data_type(&input_schema)?;
                let nullable = match expr.as_column() {
                    Some(column) => input_schema.field_with_name(column)?.is_nullable(),
                    None => true,
                };
                Ok(Field::new(name, data_type, nullable))
            })
            .collect::<ChromaResult<Vec<_>>>()?;
        let schema = PhysicalSchema::new(Arc::new(Schema::new(fields)));
        let metrics =
            OperatorMetricsHandle::new(format!("ProjectExec[{}]", projection.names().join(", ")));

        Ok(Self {
            input,
            projection,
            schema,
            evaluator: ExprEvaluator::new(),
            metrics,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    fn project_batch(&self, batch: &RecordBatch) -> ChromaResult<RecordBatch> {
        let arrow_schema = self.schema.arrow_schema();
        let columns = self
            .projection
            .iter()
            .zip(arrow_schema.fields())
            .map(|((_, expr), field)| {
                let array = self.evaluator.evaluate(expr, batch)?;
                if array.data_type() == field.data_type() {
                    Ok(array)
                } else {
                    Ok(cast(&array, field.data_type())?)
                }
            })
            .collect::<ChromaResult<Vec<ArrayRef>>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            arrow_schema.clone(),
            columns,
            &options,
        )?)
    }
}

#[async_trait]
impl PhysicalOperator for ProjectExec {
    fn name(&self) -> &'static str {
        "ProjectExec"
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
        let Some(batch) = self.input.next().await? else {
            return Ok(None);
        };

        let timer = ExecutionTimer::start();
        let projected = self.project_batch(&batch)?;
        self.metrics.update(|m| {
            m.add_rows_in(batch.num_rows());
            m.add_rows_out(projected.num_rows());
            m.add_batch();
            m.add_time(timer.stop());
        });
        Ok(Some(projected))
    }

    async fn close(&self) -> ChromaResult<()> {
        self.input.close().await
    }

    fn display(&self) -> String {
        format!("ProjectExec({})", self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::MemoryExec;
    use arrow::array::{AsArray, Float32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Float64Type, Int64Type};
    use chromasim_logical::{col, lit, LogicalExpr, ScalarFunc};
    use common_error::ChromaError;

    fn create_test_input() -> Arc<dyn PhysicalOperator> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("g", DataType::Float32, true),
            Field::new("i", DataType::Float32, true),
            Field::new("band", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Float32Array::from(vec![20.5, 21.0, 22.25])),
                Arc::new(Float32Array::from(vec![20.0, 21.5, 21.25])),
                Arc::new(StringArray::from(vec!["g", "r", "i"])),
            ],
        )
        .unwrap();
        Arc::new(MemoryExec::from_batches(vec![batch]).unwrap())
    }

    #[tokio::test]
    async fn test_project_columns_and_derived() {
        let projection = Projection::new()
            .with("id", col("id"))
            .with("g_i", LogicalExpr::call(ScalarFunc::Subtract, vec![col("g"), col("i")]));
        let project = ProjectExec::try_new(create_test_input(), projection).unwrap();

        let schema = project.schema().arrow_schema().clone();
        assert_eq!(schema.field(0).name(), "id");
        assert!(!schema.field(0).is_nullable());
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);

        project.open(&ExecutionContext::default()).await.unwrap();
        let batch = project.next().await.unwrap().unwrap();
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(2), 3);
        let g_i = batch.column(1).as_primitive::<Float64Type>();
        assert_eq!(g_i.value(0), 0.5);
        assert_eq!(g_i.value(1), -0.5);
        assert!(project.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_literal_and_empty() {
        let projection = Projection::new().with("one", lit(1));
        let project = ProjectExec::try_new(create_test_input(), projection).unwrap();
        project.open(&ExecutionContext::default()).await.unwrap();
        let batch = project.next().await.unwrap().unwrap();
        assert_eq!(batch.num_rows(), 3);

        let project = ProjectExec::try_new(create_test_input(), Projection::new()).unwrap();
        project.open(&ExecutionContext::default()).await.unwrap();
        let batch = project.next().await.unwrap().unwrap();
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 3);
    }

    #[test]
    fn test_project_plan_time_errors() {
        let missing = Projection::new().with("mag", col("mag"));
        let err = ProjectExec::try_new(create_test_input(), missing).unwrap_err();
        assert!(matches!(err, ChromaError::ColumnNotFound(_)));

        let bad_type = Projection::new().with("x", col("band").add(lit(1)));
        let err = ProjectExec::try_new(create_test_input(), bad_type).unwrap_err();
        assert!(matches!(err, ChromaError::TypeError(_)));
    }
}
