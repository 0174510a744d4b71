//! Storage layer for chromasim.
//!
//! A [`Dataset`] is a file or a directory tree of Parquet, Arrow IPC or CSV
//! fragments sharing one schema. Scans are:
//! - Column-projected: only the requested columns are decoded
//! - Ordered: fragments are scanned in path order, so row positions are stable
//! - Pull-based: every scan returns a [`RecordBatchStream`]
//! - Bounded: each fragment is decoded a few batches ahead of the consumer
//!
//! ```rust,ignore
//! use chromasim_storage::{Dataset, DatasetFormat, ScanOptions};
//!
//! let dataset = Dataset::open("catalogs/galaxies", DatasetFormat::Parquet)?;
//! let stream = dataset.scan(&ScanOptions::default().with_columns(["color"]))?;
//! ```

mod dataset;
mod format;
mod fragment;
mod stream;

pub use dataset::{Dataset, ScanOptions};
pub use format::DatasetFormat;
pub use fragment::FragmentMeta;
pub use stream::{
    empty_stream, project_batch, project_stream, vec_stream, RecordBatchStream,
    RecordBatchStreamExt,
};
