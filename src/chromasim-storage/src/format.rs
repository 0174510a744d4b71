//! On-disk dataset formats.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use common_error::ChromaError;
use serde::{Deserialize, Serialize};

/// File format of every fragment in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// Apache Parquet.
    Parquet,
    /// Arrow IPC file format (also known as Feather v2).
    Ipc,
    /// Comma-separated values with a header row.
    Csv,
}

impl DatasetFormat {
    /// File extensions recognised for this format, lowercase, without the dot.
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Parquet => &["parquet", "pq"],
            Self::Ipc => &["arrow", "ipc", "feather"],
            Self::Csv => &["csv"],
        }
    }

    /// Whether `path` may hold a fragment of this format.
    ///
    /// Files without an extension are accepted.
    pub fn matches(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            }
            None => true,
        }
    }
}

impl FromStr for DatasetFormat {
    type Err = ChromaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "arrow" | "ipc" | "feather" => Ok(Self::Ipc),
            "csv" => Ok(Self::Csv),
            other => Err(ChromaError::storage(format!(
                "unsupported dataset format '{other}' (expected parquet, arrow, ipc, feather or csv)"
            ))),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parquet => write!(f, "parquet"),
            Self::Ipc => write!(f, "ipc"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
