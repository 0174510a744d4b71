//! Coordinated loaders over several datasets.

use arrow::record_batch::RecordBatch;
use futures::future::try_join_all;
use log::info;

use common_config::{DatasetConfig, ExecutionConfig, PipelineConfig};
use common_error::ChromaResult;

use crate::aggregate::AggregateResult;
use crate::loader::Loader;

/// An ordered collection of [`Loader`]s driven together.
///
/// Results are positional: entry `i` of every returned vector belongs to
/// the `i`-th configuration. The first failing source aborts the call.
#[derive(Debug, Clone, Default)]
pub struct MultiLoader {
    loaders: Vec<Loader>,
}

impl MultiLoader {
    /// Bind every configuration, failing on the first invalid one.
    pub fn new(configs: Vec<DatasetConfig>) -> ChromaResult<Self> {
        let loaders = configs
            .into_iter()
            .map(Loader::new)
            .collect::<ChromaResult<Vec<_>>>()?;
        Ok(Self { loaders })
    }

    /// Bind every source of a pipeline with its execution settings.
    pub fn from_pipeline(pipeline: &PipelineConfig) -> ChromaResult<Self> {
        let multi = Self::new(
            pipeline
                .sources
                .iter()
                .map(|source| source.dataset.clone())
                .collect(),
        )?;
        Ok(multi.with_execution(pipeline.execution.clone()))
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.loaders = self
            .loaders
            .into_iter()
            .map(|loader| loader.with_execution(execution.clone()))
            .collect();
        self
    }

    pub fn loaders(&self) -> &[Loader] {
        &self.loaders
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Cached aggregate of each loader, `None` where not yet processed.
    pub fn aggregate(&self) -> Vec<Option<&AggregateResult>> {
        self.loaders.iter().map(Loader::aggregate).collect()
    }

    /// Process every loader in order.
    pub fn process(&mut self) -> ChromaResult<()> {
        for loader in &mut self.loaders {
            loader.process()?;
        }
        info!("Processed {} sources", self.loaders.len());
        Ok(())
    }

    /// Process every loader concurrently.
    pub async fn process_async(&mut self) -> ChromaResult<()> {
        try_join_all(self.loaders.iter_mut().map(|loader| loader.process_async())).await?;
        info!("Processed {} sources", self.loaders.len());
        Ok(())
    }

    /// Sample `n` rows from every loader.
    ///
    /// One seed drives every source, so equal seeds give equal draws for
    /// sources with equal counts.
    pub fn sample(
        &self,
        n: usize,
        columns: Option<&[String]>,
        seed: Option<u64>,
    ) -> ChromaResult<Vec<RecordBatch>> {
        self.loaders
            .iter()
            .map(|loader| loader.sample(n, columns, seed))
            .collect()
    }

    pub async fn sample_async(
        &self,
        n: usize,
        columns: Option<&[String]>,
        seed: Option<u64>,
    ) -> ChromaResult<Vec<RecordBatch>> {
        try_join_all(
            self.loaders
                .iter()
                .map(|loader| loader.sample_async(n, columns, seed)),
        )
        .await
    }
}
