//! Plan construction for dataset aggregation and sampling.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::datatypes::DataType;
use log::debug;

use chromasim_logical::{col, AggExpr, LogicalExpr, Projection};
use chromasim_storage::Dataset;
use common_error::{ChromaError, ChromaResult};

use crate::operators::{
    AggregateExec, FilterExec, PhysicalOperator, ProjectExec, ScanExec, TakeExec,
};
use crate::physical::PhysicalPlan;

/// Configuration for the planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Fragments a scan decodes concurrently, recorded on the plan.
    pub scan_parallelism: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            scan_parallelism: 1,
        }
    }
}

/// Builds physical plans over a [`Dataset`].
///
/// Scans only read the columns a plan needs: the projection's inputs plus the
/// columns of the row selection. The selection is evaluated once, by a
/// [`FilterExec`] directly above the scan. Every plan is type-checked against
/// the dataset schema while it is built, so missing columns and type
/// mismatches are reported before any data is read.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    config: PlannerConfig,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// `scan → filter? → project → aggregate`.
    ///
    /// An empty projection keeps every dataset column.
    pub fn aggregate_plan(
        &self,
        dataset: &Dataset,
        selection: Option<&LogicalExpr>,
        projection: &Projection,
        aggregates: &[AggExpr],
    ) -> ChromaResult<PhysicalPlan> {
        let projection = if projection.is_empty() {
            all_columns(dataset)
        } else {
            projection.clone()
        };

        let input = self.select(dataset, selection, &projection.input_columns())?;
        let project: Arc<dyn PhysicalOperator> = Arc::new(ProjectExec::try_new(input, projection)?);
        let aggregate = Arc::new(AggregateExec::try_new(project, aggregates.to_vec())?);

        Ok(self.finish(aggregate))
    }

    /// `scan → filter? → project(columns) → take(indices)`.
    ///
    /// `indices` address rows of the selection, in dataset order. `None`
    /// columns keeps every dataset column.
    pub fn sample_plan(
        &self,
        dataset: &Dataset,
        selection: Option<&LogicalExpr>,
        columns: Option<&[String]>,
        indices: Vec<u64>,
    ) -> ChromaResult<PhysicalPlan> {
        let projection: Projection = match columns {
            Some(columns) => columns.iter().map(|c| (c.clone(), col(c.as_str()))).collect(),
            None => all_columns(dataset),
        };

        let input = self.select(dataset, selection, &projection.input_columns())?;
        let project: Arc<dyn PhysicalOperator> = Arc::new(ProjectExec::try_new(input, projection)?);
        let take = Arc::new(TakeExec::new(project, indices));

        Ok(self.finish(take))
    }

    /// `scan → filter?` over `columns` plus the selection's columns.
    fn select(
        &self,
        dataset: &Dataset,
        selection: Option<&LogicalExpr>,
        columns: &[String],
    ) -> ChromaResult<Arc<dyn PhysicalOperator>> {
        let mut needed: HashSet<String> = columns.iter().cloned().collect();
        if let Some(selection) = selection {
            needed.extend(selection.columns());
        }

        let schema = dataset.schema();
        if let Some(missing) = needed.iter().find(|c| schema.field_with_name(c).is_err()) {
            return Err(ChromaError::column_not_found(missing.clone()));
        }
        let scan_columns: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| needed.contains(name))
            .collect();
        debug!("Scan columns for {}: [{}]", dataset.root().display(), scan_columns.join(", "));

        let scan: Arc<dyn PhysicalOperator> =
            Arc::new(ScanExec::try_new(dataset.clone(), Some(scan_columns))?);
        let Some(selection) = selection else {
            return Ok(scan);
        };

        let selection_type = selection.data_type(scan.schema().arrow_schema())?;
        if !matches!(selection_type, DataType::Boolean | DataType::Null) {
            return Err(ChromaError::type_error(format!(
                "row selection {selection} must be boolean, got {selection_type}"
            )));
        }
        Ok(Arc::new(FilterExec::new(scan, selection.clone())))
    }

    fn finish(&self, root: Arc<dyn PhysicalOperator>) -> PhysicalPlan {
        let plan = PhysicalPlan::new(root);
        let properties = plan
            .properties()
            .clone()
            .with_scan_parallelism(self.config.scan_parallelism);
        PhysicalPlan::with_properties(plan.root().clone(), properties)
    }
}

fn all_columns(dataset: &Dataset) -> Projection {
    dataset
        .schema()
        .fields()
        .iter()
        .map(|f| (f.name().clone(), col(f.name().as_str())))
        .collect()
}
