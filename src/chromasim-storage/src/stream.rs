//! `RecordBatch` stream utilities.

use std::pin::Pin;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use common_error::{ChromaError, ChromaResult};
use futures::stream::{Stream, StreamExt, TryStreamExt};

/// A stream of Arrow `RecordBatch`es.
///
/// The exchange type between storage scans and the execution engine.
pub type RecordBatchStream = Pin<Box<dyn Stream<Item = ChromaResult<RecordBatch>> + Send>>;

/// Create an empty `RecordBatchStream`.
pub fn empty_stream() -> RecordBatchStream {
    Box::pin(futures::stream::empty())
}

/// Create a `RecordBatchStream` from a vector of batches.
pub fn vec_stream(batches: Vec<RecordBatch>) -> RecordBatchStream {
    Box::pin(futures::stream::iter(batches.into_iter().map(Ok)))
}

/// Select columns of every batch by name, in the given order.
///
/// Unlike a scan projection this runs after decoding; a missing column is an error.
pub fn project_stream(inner: RecordBatchStream, schema: SchemaRef) -> RecordBatchStream {
    Box::pin(inner.and_then(move |batch| {
        let schema = schema.clone();
        async move { project_batch(&batch, &schema) }
    }))
}

/// Select the columns of `schema` from `batch` by name.
pub fn project_batch(batch: &RecordBatch, schema: &SchemaRef) -> ChromaResult<RecordBatch> {
    let batch_schema = batch.schema();
    let indices = schema
        .fields()
        .iter()
        .map(|f| {
            batch_schema
                .index_of(f.name())
                .map_err(|_| ChromaError::column_not_found(f.name().clone()))
        })
        .collect::<ChromaResult<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Extension trait for `RecordBatchStream`.
pub trait RecordBatchStreamExt {
    /// Collect all batches into a vector, stopping at the first error.
    fn collect_vec(
        self,
    ) -> Pin<Box<dyn std::future::Future<Output = ChromaResult<Vec<RecordBatch>>> + Send>>;
}

impl RecordBatchStreamExt for RecordBatchStream {
    fn collect_vec(
        self,
    ) -> Pin<Box<dyn std::future::Future<Output = ChromaResult<Vec<RecordBatch>>> + Send>> {
        Box::pin(async move {
            let mut batches = Vec::new();
            let mut stream = self;

            while let Some(result) = stream.next().await {
                batches.push(result?);
            }

            Ok(batches)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn make_test_batch(num_rows: usize) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("value", DataType::Int64, false),
        ]));

        let ids: Vec<i64> = (0..num_rows as i64).collect();
        let values: Vec<i64> = (0..num_rows as i64).map(|x| x * 10).collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Int64Array::from(values)),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut stream = empty_stream();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_vec_stream() {
        let batches = vec![make_test_batch(3), make_test_batch(5)];
        let mut stream = vec_stream(batches);

        let b1 = stream.next().await.unwrap().unwrap();
        assert_eq!(b1.num_rows(), 3);

        let b2 = stream.next().await.unwrap().unwrap();
        assert_eq!(b2.num_rows(), 5);

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_project_stream_reorders() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("value", DataType::Int64, false),
            Field::new("id", DataType::Int64, false),
        ]));
        let stream = project_stream(vec_stream(vec![make_test_batch(3)]), schema);

        let batches = stream.collect_vec().await.unwrap();
        assert_eq!(batches[0].schema().field(0).name(), "value");
        assert_eq!(batches[0].num_rows(), 3);
    }

    #[tokio::test]
    async fn test_project_stream_missing_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("mag", DataType::Float64, true)]));
        let mut stream = project_stream(vec_stream(vec![make_test_batch(1)]), schema);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ChromaError::ColumnNotFound(_)));
    }

    #[tokio::test]
    async fn test_collect_vec() {
        let batches = vec![make_test_batch(2), make_test_batch(3)];
        let stream = vec_stream(batches);

        let collected = stream.collect_vec().await.unwrap();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].num_rows(), 2);
        assert_eq!(collected[1].num_rows(), 3);
    }
}
