//! Dataset-bound aggregation and sampling.

use std::time::Instant;

use arrow::record_batch::RecordBatch;
use log::{debug, info};

use chromasim_engine::{LocalExecutor, PlanBuilder, PlannerConfig, RuntimeConfig};
use chromasim_logical::{
    parse_aggregate, parse_predicate, parse_projection, AggExpr, LogicalExpr, Projection,
};
use chromasim_storage::{Dataset, DatasetFormat};
use common_config::{DatasetConfig, ExecutionConfig};
use common_error::{ChromaError, ChromaResult};

use crate::aggregate::AggregateResult;
use crate::sampler::select_indices;

/// A dataset configuration bound to the aggregation and sampling engine.
///
/// Every expression of the configuration is parsed and validated when the
/// loader is built. `process()` computes the configured aggregate and caches
/// it; `select()` and `sample()` draw from the cached `count`.
#[derive(Debug, Clone)]
pub struct Loader {
    config: DatasetConfig,
    format: DatasetFormat,
    selection: Option<LogicalExpr>,
    projection: Projection,
    aggregates: Vec<AggExpr>,
    execution: ExecutionConfig,
    aggregate: Option<AggregateResult>,
}

impl Loader {
    /// Bind a configuration.
    ///
    /// Fails with a `ConfigError` on any invalid expression, options tree or
    /// aggregate, and with a `StorageError` on an unknown format.
    pub fn new(config: DatasetConfig) -> ChromaResult<Self> {
        let format: DatasetFormat = config.format.parse()?;
        let filter = parse_predicate(config.filter.as_ref())?;
        let predicate = parse_predicate(config.predicate.as_ref())?;
        let selection = match (filter, predicate) {
            (Some(filter), Some(predicate)) => Some(filter.and(predicate)),
            (filter, predicate) => filter.or(predicate),
        };
        let projection = parse_projection(&config.projection)?;
        let aggregates = config
            .aggregate
            .iter()
            .map(parse_aggregate)
            .collect::<ChromaResult<Vec<_>>>()?;

        Ok(Self {
            config,
            format,
            selection,
            projection,
            aggregates,
            execution: ExecutionConfig::default(),
            aggregate: None,
        })
    }

    /// Use the given execution settings.
    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Effective row selection, `and(filter, predicate)` when both are set.
    pub fn selection(&self) -> Option<&LogicalExpr> {
        self.selection.as_ref()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn aggregates(&self) -> &[AggExpr] {
        &self.aggregates
    }

    /// Aggregate cached by the last `process()`.
    pub fn aggregate(&self) -> Option<&AggregateResult> {
        self.aggregate.as_ref()
    }

    /// Run the aggregate plan and cache its result.
    ///
    /// Blocks until the plan completes. Must not be called from within an
    /// async runtime; use [`Loader::process_async`] there.
    pub fn process(&mut self) -> ChromaResult<()> {
        let threads = self.execution.effective_parallelism();
        common_runtime::block_on(threads, self.process_async())?
    }

    pub async fn process_async(&mut self) -> ChromaResult<()> {
        let start = Instant::now();
        let dataset = self.open_dataset()?;
        let plan = self.planner().aggregate_plan(
            &dataset,
            self.selection.as_ref(),
            &self.projection,
            &self.aggregates,
        )?;

        let result = self.executor().execute(plan).await?;
        debug!("Aggregate metrics:\n{}", result.metrics.format_analyze());
        let aggregate = AggregateResult::from_batch(&result.concat()?)?;

        info!(
            "Aggregated {} in {:?}: {aggregate}",
            self.config.path.display(),
            start.elapsed()
        );
        self.aggregate = Some(aggregate);
        Ok(())
    }

    /// Row count the sampler draws from.
    pub fn count(&self) -> ChromaResult<u64> {
        self.aggregate
            .as_ref()
            .ok_or_else(|| {
                ChromaError::precondition("no aggregate available; call process() before sampling")
            })?
            .count()
    }

    /// Draw `n` row positions of the selection with replacement, shuffled.
    pub fn select(&self, n: usize, seed: Option<u64>) -> ChromaResult<Vec<u64>> {
        select_indices(self.count()?, n, seed)
    }

    /// Materialize `n` sampled rows of `columns`, every column when `None`.
    ///
    /// Rows come out in draw order; a position drawn twice yields the row twice.
    pub fn sample(
        &self,
        n: usize,
        columns: Option<&[String]>,
        seed: Option<u64>,
    ) -> ChromaResult<RecordBatch> {
        let threads = self.execution.effective_parallelism();
        common_runtime::block_on(threads, self.sample_async(n, columns, seed))?
    }

    pub async fn sample_async(
        &self,
        n: usize,
        columns: Option<&[String]>,
        seed: Option<u64>,
    ) -> ChromaResult<RecordBatch> {
        let start = Instant::now();
        let indices = self.select(n, seed)?;
        let dataset = self.open_dataset()?;
        let plan = self
            .planner()
            .sample_plan(&dataset, self.selection.as_ref(), columns, indices)?;

        let table = self.executor().execute(plan).await?.concat()?;
        info!(
            "Sampled {} rows of {} in {:?}",
            table.num_rows(),
            self.config.path.display(),
            start.elapsed()
        );
        Ok(table)
    }

    fn open_dataset(&self) -> ChromaResult<Dataset> {
        Dataset::open(&self.config.path, self.format)
    }

    fn planner(&self) -> PlanBuilder {
        PlanBuilder::with_config(PlannerConfig {
            scan_parallelism: self.execution.effective_parallelism(),
        })
    }

    fn executor(&self) -> LocalExecutor {
        LocalExecutor::with_config(
            RuntimeConfig::default()
                .with_batch_size(self.execution.batch_size)
                .with_parallelism(self.execution.effective_parallelism()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_config::AggregateConfig;
    use serde_json::json;

    fn create_config() -> DatasetConfig {
        DatasetConfig::new("catalogs/galaxies", "parquet")
            .with_filter(json!({"is_valid": "color"}))
            .with_predicate(json!({"greater": ["color", 0]}))
            .with_projection(json!("color"))
            .with_aggregate(AggregateConfig::new("color", "count", "count"))
    }

    #[test]
    fn test_new_parses_eagerly() {
        let loader = Loader::new(create_config()).unwrap();
        assert_eq!(
            loader.selection().unwrap().to_string(),
            "and(is_valid(color), greater(color, 0))"
        );
        assert_eq!(loader.projection().names(), vec!["color"]);
        assert_eq!(loader.aggregates().len(), 1);
        assert!(loader.aggregate().is_none());
    }

    #[test]
    fn test_config_is_copied() {
        let mut config = create_config();
        let loader = Loader::new(config.clone()).unwrap();
        config.path = "elsewhere".into();
        config.aggregate.clear();
        assert_eq!(loader.config().path, std::path::PathBuf::from("catalogs/galaxies"));
        assert_eq!(loader.config().aggregate.len(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let unknown = create_config().with_predicate(json!({"frobnicate": ["color", 0]}));
        assert!(Loader::new(unknown).unwrap_err().is_config());

        let multi_key = create_config()
            .with_predicate(json!({"greater": ["color", 0], "less": ["color", 1]}));
        assert!(Loader::new(multi_key).unwrap_err().is_config());

        let bad_agg = create_config().with_aggregate(AggregateConfig::new("color", "median", "m"));
        assert!(Loader::new(bad_agg).unwrap_err().is_config());

        let mut bad_format = create_config();
        bad_format.format = "hdf5".to_string();
        assert!(matches!(Loader::new(bad_format), Err(ChromaError::StorageError(_))));
    }

    #[test]
    fn test_select_before_process() {
        let loader = Loader::new(create_config()).unwrap();
        assert!(loader.select(3, Some(1)).unwrap_err().is_precondition());
        assert!(loader.sample(3, None, Some(1)).unwrap_err().is_precondition());
    }
}
