//! Global aggregate operator.

use std::sync::Arc;

use arrow::array::{new_null_array, ArrayRef};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use chromasim_logical::{AggExpr, AggFunc};
use common_error::{ChromaError, ChromaResult};

use crate::executor::ExecutionContext;
use crate::metrics::{ExecutionTimer, OperatorMetricsHandle};
use crate::operators::accumulator::{self, create_accumulator, Accumulator};
use crate::operators::PhysicalOperator;
use crate::physical::{OperatorCaps, PhysicalSchema};

/// One aggregate bound to the input schema.
#[derive(Debug, Clone)]
struct BoundAggregate {
    expr: AggExpr,
    /// Type the input column is cast to; `None` for `count_all`.
    input_type: Option<DataType>,
}

#[derive(Debug, Default)]
enum AggregateState {
    #[default]
    Pending,
    Exhausted,
}

/// Aggregation without grouping keys.
///
/// A **blocking** operator: it consumes all of its input and then emits
/// exactly one row with one column per aggregate, even when the input is
/// empty.
#[derive(Debug)]
pub struct AggregateExec {
    input: Arc<dyn PhysicalOperator>,
    aggregates: Vec<BoundAggregate>,
    schema: PhysicalSchema,
    state: tokio::sync::Mutex<AggregateState>,
    metrics: OperatorMetricsHandle,
}

impl AggregateExec {
    /// Bind `aggregates` to the input schema.
    ///
    /// Fails when an input column is missing or has a type the function does
    /// not support.
    pub fn try_new(
        input: Arc<dyn PhysicalOperator>,
        aggregates: Vec<AggExpr>,
    ) -> ChromaResult<Self> {
        if aggregates.is_empty() {
            return Err(ChromaError::config("at least one aggregate is required"));
        }

        let input_schema = input.schema().arrow_schema().clone();
        let mut fields = Vec::with_capacity(aggregates.len());
        let mut bound = Vec::with_capacity(aggregates.len());

        for expr in aggregates {
            if fields.iter().any(|f: &Field| f.name() == &expr.output) {
                return Err(ChromaError::config(format!(
                    "duplicate aggregate output '{}'",
                    expr.output
                )));
            }

            let (cast_type, result_type) = match &expr.input {
                Some(column) => {
                    let field = input_schema
                        .field_with_name(column)
                        .map_err(|_| ChromaError::column_not_found(column.clone()))?;
                    let cast_to = accumulator::input_type(expr.func, field.data_type())?;
                    let result = expr.func.result_type(field.data_type()).ok_or_else(|| {
                        ChromaError::type_error(format!(
                            "aggregate '{}' does not support column '{column}' of type {}",
                            expr.func,
                            field.data_type()
                        ))
                    })?;
                    (Some(cast_to), result)
                }
                None => (None, DataType::Int64),
            };

            let nullable = !matches!(
                expr.func,
                AggFunc::Count | AggFunc::CountAll | AggFunc::CountDistinct
            );
            fields.push(Field::new(&expr.output, result_type, nullable));
            bound.push(BoundAggregate {
                expr,
                input_type: cast_type,
            });
        }

        let schema = PhysicalSchema::new(Arc::new(Schema::new(fields)));
        let names = bound
            .iter()
            .map(|b| b.expr.output.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            input,
            aggregates: bound,
            schema,
            state: tokio::sync::Mutex::new(AggregateState::Pending),
            metrics: OperatorMetricsHandle::new(format!("AggregateExec[{names}]")),
        })
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &AggExpr> {
        self.aggregates.iter().map(|b| &b.expr)
    }

    fn input_column(bound: &BoundAggregate, batch: &RecordBatch) -> ChromaResult<ArrayRef> {
        match (&bound.expr.input, &bound.input_type) {
            (Some(column), Some(data_type)) => {
                let array = batch
                    .column_by_name(column)
                    .ok_or_else(|| ChromaError::column_not_found(column.clone()))?;
                if array.data_type() == data_type {
                    Ok(array.clone())
                } else {
                    Ok(cast(array, data_type)?)
                }
            }
            _ => Ok(new_null_array(&DataType::Null, batch.num_rows())),
        }
    }

    async fn consume(&self) -> ChromaResult<RecordBatch> {
        let mut accumulators: Vec<Box<dyn Accumulator>> = self
            .aggregates
            .iter()
            .map(|b| create_accumulator(&b.expr, b.input_type.as_ref().unwrap_or(&DataType::Null)))
            .collect();

        while let Some(batch) = self.input.next().await? {
            let timer = ExecutionTimer::start();
            for (bound, acc) in self.aggregates.iter().zip(accumulators.iter_mut()) {
                acc.update(&Self::input_column(bound, &batch)?)?;
            }
            self.metrics.update(|m| {
                m.add_rows_in(batch.num_rows());
                m.add_batch();
                m.add_time(timer.stop());
            });
        }

        let columns = accumulators
            .iter()
            .zip(self.schema.arrow_schema().fields())
            .map(|(acc, field)| {
                let value = acc.evaluate()?.to_array(1);
                Ok(cast(&value, field.data_type())?)
            })
            .collect::<ChromaResult<Vec<_>>>()?;

        self.metrics.update(|m| m.add_rows_out(1));
        Ok(RecordBatch::try_new(self.schema.arrow_schema().clone(), columns)?)
    }
}

#[async_trait]
impl PhysicalOperator for AggregateExec {
    fn name(&self) -> &'static str {
        "AggregateExec"
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
        *self.state.lock().await = AggregateState::Pending;
        self.input.open(ctx).await
    }

    async fn next(&self) -> ChromaResult<Option<RecordBatch>> {
        let mut state = self.state.lock().await;
        match *state {
            AggregateState::Exhausted => Ok(None),
            AggregateState::Pending => {
                let batch = self.consume().await?;
                *state = AggregateState::Exhausted;
                Ok(Some(batch))
            }
        }
    }

    async fn close(&self) -> ChromaResult<()> {
        *self.state.lock().await = AggregateState::Exhausted;
        self.input.close().await
    }

    fn display(&self) -> String {
        let aggs = self
            .aggregates
            .iter()
            .map(|b| b.expr.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("AggregateExec({aggs})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::MemoryExec;
    use arrow::array::{AsArray, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Float64Type, Int64Type};

    fn create_test_input() -> Arc<dyn PhysicalOperator> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("color", DataType::Float64, true),
            Field::new("band", DataType::Utf8, true),
        ]));
        let batches = vec![
            RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(Int32Array::from(vec![1, 2, 3])),
                    Arc::new(Float64Array::from(vec![Some(-1.0), None, Some(1.5)])),
                    Arc::new(StringArray::from(vec!["g", "r", "i"])),
                ],
            )
            .unwrap(),
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int32Array::from(vec![4])),
                    Arc::new(Float64Array::from(vec![Some(0.5)])),
                    Arc::new(StringArray::from(vec!["z"])),
                ],
            )
            .unwrap(),
        ];
        Arc::new(MemoryExec::from_batches(batches).unwrap())
    }

    async fn run(exec: &AggregateExec) -> RecordBatch {
        exec.open(&ExecutionContext::default()).await.unwrap();
        let batch = exec.next().await.unwrap().unwrap();
        assert!(exec.next().await.unwrap().is_none());
        exec.close().await.unwrap();
        batch
    }

    #[tokio::test]
    async fn test_global_aggregate_single_row() {
        let exec = AggregateExec::try_new(
            create_test_input(),
            vec![
                AggExpr::new(AggFunc::Count, "color", "count"),
                AggExpr::count_all("rows"),
                AggExpr::new(AggFunc::Min, "color", "min_color"),
                AggExpr::new(AggFunc::Max, "color", "max_color"),
                AggExpr::new(AggFunc::Sum, "id", "sum_id"),
                AggExpr::new(AggFunc::Max, "band", "max_band"),
            ],
        )
        .unwrap();

        let batch = run(&exec).await;
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 3);
        assert_eq!(batch.column(1).as_primitive::<Int64Type>().value(0), 4);
        assert_eq!(batch.column(2).as_primitive::<Float64Type>().value(0), -1.0);
        assert_eq!(batch.column(3).as_primitive::<Float64Type>().value(0), 1.5);
        assert_eq!(batch.column(4).as_primitive::<Int64Type>().value(0), 10);
        assert_eq!(batch.column(5).as_string::<i32>().value(0), "z");
    }

    #[tokio::test]
    async fn test_aggregate_empty_input() {
        let schema = create_test_input().schema().clone();
        let input: Arc<dyn PhysicalOperator> = Arc::new(MemoryExec::with_schema(schema));
        let exec = AggregateExec::try_new(
            input,
            vec![
                AggExpr::new(AggFunc::Count, "color", "count"),
                AggExpr::new(AggFunc::Min, "color", "min_color"),
            ],
        )
        .unwrap();

        let batch = run(&exec).await;
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 0);
        assert!(batch.column(1).is_null(0));
    }

    #[test]
    fn test_aggregate_schema() {
        let exec = AggregateExec::try_new(
            create_test_input(),
            vec![
                AggExpr::new(AggFunc::Mean, "id", "mean_id"),
                AggExpr::new(AggFunc::Min, "id", "min_id"),
            ],
        )
        .unwrap();
        let schema = exec.schema().arrow_schema().clone();
        assert_eq!(schema.field(0).data_type(), &DataType::Float64);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert!(exec.capabilities().blocking);
    }

    #[test]
    fn test_aggregate_binding_errors() {
        let missing = AggregateExec::try_new(
            create_test_input(),
            vec![AggExpr::new(AggFunc::Min, "mag", "min_mag")],
        );
        assert!(matches!(missing, Err(ChromaError::ColumnNotFound(_))));

        let bad_type = AggregateExec::try_new(
            create_test_input(),
            vec![AggExpr::new(AggFunc::Sum, "band", "s")],
        );
        assert!(matches!(bad_type, Err(ChromaError::TypeError(_))));

        let duplicate = AggregateExec::try_new(
            create_test_input(),
            vec![AggExpr::count_all("n"), AggExpr::count_all("n")],
        );
        assert!(matches!(duplicate, Err(ChromaError::ConfigError(_))));
    }
}
