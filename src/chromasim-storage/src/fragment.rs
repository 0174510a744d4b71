//! Dataset fragments and the per-format readers that decode them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use common_error::{ChromaError, ChromaResult};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use crate::DatasetFormat;

/// Rows read when inferring a CSV schema.
const CSV_INFER_ROWS: usize = 1000;

/// A single data file of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentMeta {
    /// Position of the fragment in scan order.
    pub id: usize,
    /// Path to the fragment file.
    pub path: PathBuf,
    /// File size in bytes.
    pub byte_size: u64,
}

impl FragmentMeta {
    pub fn new(id: usize, path: impl Into<PathBuf>, byte_size: u64) -> Self {
        Self {
            id,
            path: path.into(),
            byte_size,
        }
    }
}

/// Read the Arrow schema of a fragment without decoding data.
pub(crate) fn read_schema(path: &Path, format: DatasetFormat) -> ChromaResult<SchemaRef> {
    match format {
        DatasetFormat::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
            Ok(builder.schema().clone())
        }
        DatasetFormat::Ipc => {
            let reader = FileReader::try_new(BufReader::new(File::open(path)?), None)?;
            Ok(reader.schema())
        }
        DatasetFormat::Csv => {
            let mut file = BufReader::new(File::open(path)?);
            let (schema, _) = Format::default()
                .with_header(true)
                .infer_schema(&mut file, Some(CSV_INFER_ROWS))?;
            Ok(Arc::new(schema))
        }
    }
}

/// Lazily decoded batches of one fragment.
pub(crate) type FragmentBatches = Box<dyn Iterator<Item = ChromaResult<RecordBatch>> + Send>;

/// Open a fragment for reading; batches conform to `output` and are decoded on demand.
///
/// `dataset_schema` is only consulted for CSV, whose fragments share the
/// schema inferred from the first file.
pub(crate) fn open_fragment(
    fragment: &FragmentMeta,
    format: DatasetFormat,
    dataset_schema: &SchemaRef,
    output: &SchemaRef,
    batch_size: usize,
) -> ChromaResult<FragmentBatches> {
    let conformed = {
        let output = output.clone();
        let path = fragment.path.clone();
        move |batch: Result<RecordBatch, ArrowError>| conform(batch?, &output, &path)
    };
    let path = fragment.path.as_path();
    match format {
        DatasetFormat::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
            let indices = projection_indices(builder.schema(), output, path)?;
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
            let reader = builder
                .with_projection(mask)
                .with_batch_size(batch_size)
                .build()?;
            Ok(Box::new(reader.map(conformed)))
        }
        DatasetFormat::Ipc => {
            let schema = FileReader::try_new(BufReader::new(File::open(path)?), None)?.schema();
            let indices = projection_indices(&schema, output, path)?;
            let reader = FileReader::try_new(BufReader::new(File::open(path)?), Some(indices))?;
            Ok(Box::new(reader.map(conformed)))
        }
        DatasetFormat::Csv => {
            let indices = projection_indices(dataset_schema, output, path)?;
            let reader = ReaderBuilder::new(dataset_schema.clone())
                .with_header(true)
                .with_batch_size(batch_size)
                .with_projection(indices)
                .build(BufReader::new(File::open(path)?))?;
            Ok(Box::new(reader.map(conformed)))
        }
    }
}

/// Indices in `schema` of the columns of `output`.
///
/// A zero-column output still reads one column so that row counts survive.
fn projection_indices(
    schema: &SchemaRef,
    output: &SchemaRef,
    path: &Path,
) -> ChromaResult<Vec<usize>> {
    if output.fields().is_empty() {
        return Ok(if schema.fields().is_empty() {
            Vec::new()
        } else {
            vec![0]
        });
    }
    output
        .fields()
        .iter()
        .map(|field| {
            schema.index_of(field.name()).map_err(|_| {
                ChromaError::storage(format!(
                    "column '{}' missing from fragment {}",
                    field.name(),
                    path.display()
                ))
            })
        })
        .collect()
}

/// Reorder a decoded batch by name and stamp it with the output schema.
fn conform(batch: RecordBatch, output: &SchemaRef, path: &Path) -> ChromaResult<RecordBatch> {
    let schema = batch.schema();
    let columns = output
        .fields()
        .iter()
        .map(|field| {
            schema
                .index_of(field.name())
                .map(|idx| batch.column(idx).clone())
                .map_err(|_| {
                    ChromaError::storage(format!(
                        "column '{}' missing from fragment {}",
                        field.name(),
                        path.display()
                    ))
                })
        })
        .collect::<ChromaResult<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(output.clone(), columns, &options).map_err(|e| {
        ChromaError::storage(format!(
            "fragment {} does not match the dataset schema: {e}",
            path.display()
        ))
    })
}
