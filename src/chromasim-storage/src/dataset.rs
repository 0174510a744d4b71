//! Partitioned on-disk datasets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use common_error::{ChromaError, ChromaResult};
use futures::stream::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::fragment::{open_fragment, read_schema};
use crate::{DatasetFormat, FragmentMeta, RecordBatchStream};

/// Decoded batches buffered per fragment ahead of the consumer.
const FRAGMENT_READ_AHEAD: usize = 2;

/// Options of a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Columns to read, in output order. `None` reads every column.
    pub columns: Option<Vec<String>>,
    /// Maximum rows per batch.
    pub batch_size: usize,
    /// Fragments decoded concurrently.
    pub parallelism: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            columns: None,
            batch_size: 8192,
            parallelism: 1,
        }
    }
}

impl ScanOptions {
    /// Read only the given columns.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

/// A dataset made of one or more fragment files of the same format.
///
/// Fragments are ordered by path, so the row order of a scan is stable across
/// scans and positional indices address the same rows every time.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    format: DatasetFormat,
    schema: SchemaRef,
    fragments: Arc<Vec<FragmentMeta>>,
}

impl Dataset {
    /// Open a dataset at `path`, a single file or a directory searched recursively.
    ///
    /// Files whose name starts with `.` or `_` are ignored. The dataset schema
    /// is the schema of the first fragment. Every other fragment must have the
    /// same columns in any order, with the same types unless the format is CSV.
    pub fn open(path: impl AsRef<Path>, format: DatasetFormat) -> ChromaResult<Self> {
        let root = path.as_ref().to_path_buf();
        let fragments = discover_fragments(&root, format)?;
        let first = fragments.first().ok_or_else(|| {
            ChromaError::storage(format!(
                "no {format} files found under {}",
                root.display()
            ))
        })?;
        let schema = read_schema(&first.path, format)?;
        for fragment in &fragments[1..] {
            check_fragment_schema(&schema, fragment, format)?;
        }

        info!(
            "Opened {format} dataset {} ({} fragments, {} columns)",
            root.display(),
            fragments.len(),
            schema.fields().len()
        );

        Ok(Self {
            root,
            format,
            schema,
            fragments: Arc::new(fragments),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    /// Schema of the full dataset.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Fragments in scan order.
    pub fn fragments(&self) -> &[FragmentMeta] {
        &self.fragments
    }

    /// Schema of a scan reading `columns` (all columns when `None`).
    pub fn projected_schema(&self, columns: Option<&[String]>) -> ChromaResult<SchemaRef> {
        let Some(columns) = columns else {
            return Ok(self.schema.clone());
        };
        let indices = columns
            .iter()
            .map(|name| {
                self.schema
                    .index_of(name)
                    .map_err(|_| ChromaError::column_not_found(name.clone()))
            })
            .collect::<ChromaResult<Vec<_>>>()?;
        Ok(Arc::new(self.schema.project(&indices)?))
    }

    /// Stream the dataset's rows in fragment order.
    ///
    /// Each fragment is decoded on a blocking worker thread that hands batches
    /// over a bounded channel. Up to `options.parallelism` fragments read ahead
    /// at a time; output order is preserved. Dropping the stream stops the readers.
    pub fn scan(&self, options: &ScanOptions) -> ChromaResult<RecordBatchStream> {
        let output = self.projected_schema(options.columns.as_deref())?;
        let format = self.format;
        let dataset_schema = self.schema.clone();
        let batch_size = options.batch_size.max(1);
        let fragments = self.fragments.clone();

        debug!(
            "Scanning {} fragments of {} with columns [{}]",
            fragments.len(),
            self.root.display(),
            output
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let reads = (0..fragments.len()).map(move |i| {
            let fragments = fragments.clone();
            let dataset_schema = dataset_schema.clone();
            let output = output.clone();
            async move {
                let (tx, rx) = mpsc::channel(FRAGMENT_READ_AHEAD);
                let reader = tokio::task::spawn_blocking(move || {
                    let opened =
                        open_fragment(&fragments[i], format, &dataset_schema, &output, batch_size);
                    let batches = match opened {
                        Ok(batches) => batches,
                        Err(e) => {
                            let _ = tx.blocking_send(Err(e));
                            return;
                        }
                    };
                    for batch in batches {
                        let failed = batch.is_err();
                        if tx.blocking_send(batch).is_err() || failed {
                            break;
                        }
                    }
                });
                fragment_stream(rx, reader)
            }
        });

        let stream = futures::stream::iter(reads)
            .buffered(options.parallelism.max(1))
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Batches of one fragment as they arrive, followed by the reader's panic if it had one.
fn fragment_stream(
    rx: mpsc::Receiver<ChromaResult<RecordBatch>>,
    reader: JoinHandle<()>,
) -> impl Stream<Item = ChromaResult<RecordBatch>> + Send {
    futures::stream::unfold((rx, Some(reader)), |(mut rx, reader)| async move {
        if let Some(batch) = rx.recv().await {
            return Some((batch, (rx, reader)));
        }
        match reader?.await {
            Ok(()) => None,
            Err(e) => Some((
                Err(ChromaError::internal(format!("fragment reader failed: {e}"))),
                (rx, None),
            )),
        }
    })
}

fn check_fragment_schema(
    expected: &SchemaRef,
    fragment: &FragmentMeta,
    format: DatasetFormat,
) -> ChromaResult<()> {
    let actual = read_schema(&fragment.path, format)?;
    let matches = expected.fields().len() == actual.fields().len()
        && expected.fields().iter().all(|e| {
            actual.field_with_name(e.name()).is_ok_and(|a| {
                format == DatasetFormat::Csv || a.data_type() == e.data_type()
            })
        });
    if matches {
        return Ok(());
    }
    let describe = |schema: &SchemaRef| {
        schema
            .fields()
            .iter()
            .map(|f| format!("{}: {}", f.name(), f.data_type()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(ChromaError::storage(format!(
        "fragment {} has schema [{}], expected [{}]",
        fragment.path.display(),
        describe(&actual),
        describe(expected)
    )))
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}, {} fragments]",
            self.root.display(),
            self.format,
            self.fragments.len()
        )
    }
}

fn discover_fragments(root: &Path, format: DatasetFormat) -> ChromaResult<Vec<FragmentMeta>> {
    let meta = std::fs::metadata(root)?;
    let mut paths = Vec::new();
    if meta.is_file() {
        paths.push((root.to_path_buf(), meta.len()));
    } else {
        walk(root, format, &mut paths)?;
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(id, (path, size))| FragmentMeta::new(id, path, size))
        .collect())
}

fn walk(dir: &Path, format: DatasetFormat, out: &mut Vec<(PathBuf, u64)>) -> ChromaResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            debug!("Ignoring hidden path {}", path.display());
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, format, out)?;
        } else if format.matches(&path) {
            out.push((path, entry.metadata()?.len()));
        } else {
            warn!("Skipping {} (not a {format} file)", path.display());
        }
    }
    Ok(())
}
