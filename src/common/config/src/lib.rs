//! Configuration management for chromasim.
//!
//! Dataset bindings, pipeline definitions and execution settings. Expression trees
//! (`filter`, `predicate`, projection entries and aggregate options) are kept as
//! untyped [`ConfigTree`] values here; they are parsed into typed expressions once,
//! when a loader is bound to the configuration.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use common_error::{ChromaError, ChromaResult};

/// An untyped, declarative expression or options tree as written in a config file.
pub type ConfigTree = serde_json::Value;

/// Default number of rows per batch produced by scans.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Bands with published total throughputs.
pub const DEFAULT_BANDS: [&str; 6] = ["u", "g", "r", "i", "z", "y"];

/// Binding of a single on-disk dataset to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// File or directory holding the dataset.
    pub path: PathBuf,
    /// Storage format identifier (`parquet`, `arrow`/`ipc`/`feather`, `csv`).
    pub format: String,
    /// Optional row filter tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ConfigTree>,
    /// Optional predicate tree, applied before projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<ConfigTree>,
    /// Output columns: bare names or `{output: expression}` mappings.
    #[serde(default)]
    pub projection: Vec<ConfigTree>,
    /// Global aggregations over the projected rows.
    #[serde(default)]
    pub aggregate: Vec<AggregateConfig>,
}

impl DatasetConfig {
    /// Create a binding with no filter, projection or aggregation.
    pub fn new(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            filter: None,
            predicate: None,
            projection: Vec::new(),
            aggregate: Vec::new(),
        }
    }

    /// Set the predicate tree.
    pub fn with_predicate(mut self, predicate: ConfigTree) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Set the filter tree.
    pub fn with_filter(mut self, filter: ConfigTree) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a projection entry.
    pub fn with_projection(mut self, entry: ConfigTree) -> Self {
        self.projection.push(entry);
        self
    }

    /// Append an aggregate.
    pub fn with_aggregate(mut self, aggregate: AggregateConfig) -> Self {
        self.aggregate.push(aggregate);
        self
    }

    /// Load a dataset binding from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ChromaResult<Self> {
        load(path)
    }
}

/// One `{input, function, options, output}` aggregate tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Projected column the function reads. Only `count_all` may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Aggregate function name.
    pub function: String,
    /// Optional `{OptionsKind: {key: value}}` tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ConfigTree>,
    /// Output column name.
    pub output: String,
}

impl AggregateConfig {
    /// Create an aggregate tuple without options.
    pub fn new(
        input: impl Into<String>,
        function: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            input: Some(input.into()),
            function: function.into(),
            options: None,
            output: output.into(),
        }
    }

    /// Attach an options tree.
    /// Row count aggregate; `count_all` takes no input column.
    pub fn count_all(output: impl Into<String>) -> Self {
        Self {
            input: None,
            function: "count_all".to_string(),
            options: None,
            output: output.into(),
        }
    }

    pub fn with_options(mut self, options: ConfigTree) -> Self {
        self.options = Some(options);
        self
    }
}

/// Execution settings shared by every dataset in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of fragments decoded concurrently (`None` = available parallelism).
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// Rows per scanned batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ExecutionConfig {
    /// Resolve the parallelism level, falling back to the number of available cores.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism
            .filter(|&p| p > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

/// A sampling request attached to a pipeline source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Number of rows to draw.
    pub n: usize,
    /// Columns to materialize (`None` = all dataset columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Seed for reproducible draws.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// A named dataset within a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name (e.g. `galaxies`, `stars`).
    pub name: String,
    /// Dataset binding.
    #[serde(flatten)]
    pub dataset: DatasetConfig,
    /// Optional default sampling request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleConfig>,
}

/// Location of the per-band throughput tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputConfig {
    /// Directory holding `total_<band>.dat` (`None` = `THROUGHPUT_DIR` or `.`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Bands to load.
    #[serde(default = "default_bands")]
    pub bands: Vec<String>,
}

fn default_bands() -> Vec<String> {
    DEFAULT_BANDS.iter().map(|b| (*b).to_string()).collect()
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            bands: default_bands(),
        }
    }
}

/// Top-level pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name.
    pub name: String,
    /// Execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Ordered dataset sources.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Throughput table settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughputs: Option<ThroughputConfig>,
}

impl PipelineConfig {
    /// Load a pipeline from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ChromaResult<Self> {
        load(path)
    }

    /// Parse a pipeline from YAML text.
    pub fn from_yaml_str(text: &str) -> ChromaResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Deserialize a configuration file, choosing the parser from the extension.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> ChromaResult<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
        Some("json") => Ok(serde_json::from_str(&text)?),
        _ => Err(ChromaError::config(format!(
            "unsupported config file extension: {}",
            path.display()
        ))),
    }
}
