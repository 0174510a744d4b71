//! Galaxy parameter draws bounded by a catalog aggregate.

use std::sync::Arc;

use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::info;
use rand::Rng;

use common_error::{ensure, ChromaResult};

use crate::aggregate::AggregateResult;
use crate::sampler::sample_rng;

/// Aggregate output holding the lower colour bound.
pub const MIN_COLOR_OUTPUT: &str = "min_color";
/// Aggregate output holding the upper colour bound.
pub const MAX_COLOR_OUTPUT: &str = "max_color";
/// Half-light radius given to every drawn galaxy.
pub const DEFAULT_HALF_LIGHT_RADIUS: f64 = 0.5;

/// Parameters of one exponential-profile galaxy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalaxyParameters {
    pub color: f64,
    pub half_light_radius: f64,
}

/// Draws galaxy parameters with colours uniform over a closed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalaxyParameterSampler {
    min_color: f64,
    max_color: f64,
    half_light_radius: f64,
}

impl GalaxyParameterSampler {
    /// Sample colours in `[min_color, max_color]`.
    pub fn new(min_color: f64, max_color: f64) -> ChromaResult<Self> {
        ensure!(
            min_color.is_finite() && max_color.is_finite(),
            PreconditionError: "colour range must be finite, got [{}, {}]", min_color, max_color
        );
        ensure!(
            min_color <= max_color,
            PreconditionError: "empty colour range [{}, {}]", min_color, max_color
        );
        Ok(Self {
            min_color,
            max_color,
            half_light_radius: DEFAULT_HALF_LIGHT_RADIUS,
        })
    }

    /// Take the colour range from the `min_color` and `max_color` outputs.
    pub fn from_aggregate(aggregate: &AggregateResult) -> ChromaResult<Self> {
        Self::new(
            aggregate.float(MIN_COLOR_OUTPUT)?,
            aggregate.float(MAX_COLOR_OUTPUT)?,
        )
    }

    pub fn with_half_light_radius(mut self, half_light_radius: f64) -> Self {
        self.half_light_radius = half_light_radius;
        self
    }

    pub fn color_range(&self) -> (f64, f64) {
        (self.min_color, self.max_color)
    }

    pub fn half_light_radius(&self) -> f64 {
        self.half_light_radius
    }

    pub fn sample(&self, n: usize, seed: Option<u64>) -> Vec<GalaxyParameters> {
        let mut rng = sample_rng(seed);
        let galaxies: Vec<_> = (0..n)
            .map(|_| GalaxyParameters {
                color: rng.gen_range(self.min_color..=self.max_color),
                half_light_radius: self.half_light_radius,
            })
            .collect();
        info!(
            "Drew {} galaxies with colour in [{}, {}]",
            galaxies.len(),
            self.min_color,
            self.max_color
        );
        galaxies
    }
}

pub fn galaxy_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("color", DataType::Float64, false),
        Field::new("half_light_radius", DataType::Float64, false),
    ]))
}

/// Lay drawn parameters out as a record batch.
pub fn to_batch(galaxies: &[GalaxyParameters]) -> ChromaResult<RecordBatch> {
    let colors = Float64Array::from_iter_values(galaxies.iter().map(|g| g.color));
    let radii = Float64Array::from_iter_values(galaxies.iter().map(|g| g.half_light_radius));
    Ok(RecordBatch::try_new(
        galaxy_schema(),
        vec![Arc::new(colors), Arc::new(radii)],
    )?)
}
