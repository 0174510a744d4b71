//! Loader and MultiLoader over on-disk catalogs.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{AsArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chromasim_pipeline::{GalaxyParameterSampler, Loader, MultiLoader};
use common_config::{AggregateConfig, DatasetConfig, ExecutionConfig, PipelineConfig};
use common_error::ChromaError;
use parquet::arrow::ArrowWriter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use tempfile::TempDir;

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("color", DataType::Float64, true),
    ]))
}

fn write_parquet(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

/// Ids `0..rows`; color is `id / 10`, null for every id ending in 9.
fn create_catalog(rows: i64) -> TempDir {
    let dir = TempDir::new().unwrap();
    let ids: Vec<i64> = (0..rows).collect();
    let colors: Vec<Option<f64>> = ids
        .iter()
        .map(|&i| (i % 10 != 9).then(|| i as f64 / 10.0))
        .collect();
    let batch = RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(Float64Array::from(colors)),
        ],
    )
    .unwrap();
    write_parquet(&dir.path().join("catalog.parquet"), &batch);
    dir
}

fn execution() -> ExecutionConfig {
    ExecutionConfig {
        parallelism: Some(2),
        batch_size: 7,
    }
}

fn count_config(path: &Path) -> DatasetConfig {
    DatasetConfig::new(path, "parquet").with_aggregate(AggregateConfig::count_all("count"))
}

fn ids(batch: &RecordBatch) -> Vec<i64> {
    batch
        .column_by_name("id")
        .unwrap()
        .as_primitive::<Int64Type>()
        .values()
        .to_vec()
}

#[test]
fn test_count_over_large_catalog() {
    let dir = TempDir::new().unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for part in 0..4i64 {
        let ids: Vec<i64> = (part * 250_000..(part + 1) * 250_000).collect();
        let colors: Vec<f64> = ids.iter().map(|_| rng.gen_range(-2.0..2.0)).collect();
        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Float64Array::from(colors)),
            ],
        )
        .unwrap();
        write_parquet(&dir.path().join(format!("part-{part}.parquet")), &batch);
    }

    let config = DatasetConfig::new(dir.path(), "parquet")
        .with_predicate(json!({"greater": ["color", 0]}))
        .with_projection(json!("color"))
        .with_aggregate(AggregateConfig::new("color", "count", "count"))
        .with_aggregate(AggregateConfig::new("color", "min", "min_color"))
        .with_aggregate(AggregateConfig::new("color", "max", "max_color"));
    let mut loader = Loader::new(config).unwrap();
    loader.process().unwrap();

    let aggregate = loader.aggregate().unwrap();
    let count = aggregate.count().unwrap();
    assert!((495_000..=505_000).contains(&count), "count = {count}");
    assert!(aggregate.float("min_color").unwrap() > 0.0);
    assert!(aggregate.float("max_color").unwrap() < 2.0);
}

#[test]
fn test_select_is_deterministic_for_a_seed() {
    let dir = create_catalog(10);
    let mut loader = Loader::new(count_config(dir.path())).unwrap();
    loader.process().unwrap();
    assert_eq!(loader.count().unwrap(), 10);

    let first = loader.select(5, Some(42)).unwrap();
    assert_eq!(first.len(), 5);
    assert!(first.iter().all(|&i| i < 10));
    assert_eq!(first, loader.select(5, Some(42)).unwrap());
}

#[test]
fn test_sample_follows_selected_positions() {
    let dir = create_catalog(40);
    let config = count_config(dir.path()).with_filter(json!({"is_valid": "color"}));
    let mut loader = Loader::new(config).unwrap().with_execution(execution());
    loader.process().unwrap();
    assert_eq!(loader.count().unwrap(), 36);

    let selected: Vec<i64> = (0..40).filter(|i| i % 10 != 9).collect();
    let positions = loader.select(25, Some(7)).unwrap();
    let table = loader.sample(25, Some(&["id".to_string()]), Some(7)).unwrap();

    assert_eq!(table.num_columns(), 1);
    let expected: Vec<i64> = positions.iter().map(|&p| selected[p as usize]).collect();
    assert_eq!(ids(&table), expected);
}

#[test]
fn test_sample_draws_with_replacement() {
    let dir = create_catalog(3);
    let mut loader = Loader::new(count_config(dir.path())).unwrap();
    loader.process().unwrap();

    let table = loader.sample(50, None, Some(11)).unwrap();
    assert_eq!(table.num_rows(), 50);
    let names: Vec<_> = table.schema().fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(names, vec!["id", "color"]);
    let distinct: HashSet<i64> = ids(&table).into_iter().collect();
    assert!(distinct.len() <= 3);
    assert!(distinct.iter().all(|id| (0..3).contains(id)));
}

#[test]
fn test_sample_zero_rows() {
    let dir = create_catalog(5);
    let mut loader = Loader::new(count_config(dir.path())).unwrap();
    loader.process().unwrap();
    let table = loader.sample(0, Some(&["color".to_string()]), None).unwrap();
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.schema().field(0).name(), "color");
}

#[test]
fn test_empty_selection_cannot_be_sampled() {
    let dir = create_catalog(20);
    let config = count_config(dir.path()).with_predicate(json!({"greater": ["color", 100]}));
    let mut loader = Loader::new(config).unwrap();
    loader.process().unwrap();
    assert_eq!(loader.count().unwrap(), 0);

    assert!(loader.select(1, Some(1)).unwrap_err().is_precondition());
    assert!(loader.sample(1, None, Some(1)).unwrap_err().is_precondition());
}

#[test]
fn test_sampling_requires_count_output() {
    let dir = create_catalog(20);
    let config = DatasetConfig::new(dir.path(), "parquet")
        .with_projection(json!("color"))
        .with_aggregate(AggregateConfig::new("color", "mean", "mean_color"));
    let mut loader = Loader::new(config).unwrap();
    loader.process().unwrap();

    assert!(loader.aggregate().unwrap().get("mean_color").is_some());
    assert!(loader.select(2, None).unwrap_err().is_precondition());
}

#[test]
fn test_process_reports_missing_column() {
    let dir = create_catalog(20);
    let config = DatasetConfig::new(dir.path(), "parquet")
        .with_projection(json!({"mag": {"multiply": ["flux", 2]}}))
        .with_aggregate(AggregateConfig::count_all("count"));
    let mut loader = Loader::new(config).unwrap();
    let err = loader.process().unwrap_err();
    assert!(matches!(err, ChromaError::ColumnNotFound(_)));
    assert!(loader.aggregate().is_none());
}

#[tokio::test]
async fn test_blocking_api_inside_runtime_is_rejected() {
    let dir = create_catalog(5);
    let mut loader = Loader::new(count_config(dir.path())).unwrap();
    assert!(matches!(loader.process(), Err(ChromaError::InternalError(_))));

    loader.process_async().await.unwrap();
    let table = loader.sample_async(4, None, Some(3)).await.unwrap();
    assert_eq!(table.num_rows(), 4);
}

#[tokio::test]
async fn test_multi_loader_results_are_aligned() {
    let small = create_catalog(5);
    let large = create_catalog(30);
    let mut multi = MultiLoader::new(vec![count_config(large.path()), count_config(small.path())])
        .unwrap()
        .with_execution(execution());
    multi.process_async().await.unwrap();

    let counts: Vec<u64> = multi
        .aggregate()
        .into_iter()
        .map(|a| a.unwrap().count().unwrap())
        .collect();
    assert_eq!(counts, vec![30, 5]);

    let tables = multi.sample_async(12, None, Some(5)).await.unwrap();
    assert_eq!(tables.len(), 2);
    assert!(ids(&tables[0]).iter().all(|id| (0..30).contains(id)));
    assert!(ids(&tables[1]).iter().all(|id| (0..5).contains(id)));
}

#[test]
fn test_multi_loader_aborts_on_first_failure() {
    let present = create_catalog(5);
    let missing = present.path().join("missing");
    let mut multi =
        MultiLoader::new(vec![count_config(present.path()), count_config(&missing)]).unwrap();
    assert!(multi.process().is_err());
}

#[test]
fn test_pipeline_from_yaml() {
    let galaxies = create_catalog(50);
    let stars = create_catalog(8);
    let config_dir = TempDir::new().unwrap();
    let config_path = config_dir.path().join("pipeline.yaml");
    let yaml = format!(
        r#"
name: sky
execution:
  parallelism: 2
  batch_size: 16
sources:
  - name: galaxies
    path: {}
    format: parquet
    predicate: {{is_valid: color}}
    projection: [color]
    aggregate:
      - {{input: color, function: count, output: count}}
      - {{input: color, function: min, output: min_color}}
      - {{input: color, function: max, output: max_color}}
  - name: stars
    path: {}
    format: parquet
    aggregate:
      - {{function: count_all, output: count}}
    sample: {{n: 4, seed: 9}}
"#,
        galaxies.path().display(),
        stars.path().display()
    );
    std::fs::write(&config_path, yaml).unwrap();

    let pipeline = PipelineConfig::from_path(&config_path).unwrap();
    let mut multi = MultiLoader::from_pipeline(&pipeline).unwrap();
    multi.process().unwrap();

    let aggregates = multi.aggregate();
    let galaxy_aggregate = aggregates[0].unwrap();
    assert_eq!(galaxy_aggregate.count().unwrap(), 45);

    let sampler = GalaxyParameterSampler::from_aggregate(galaxy_aggregate).unwrap();
    assert_eq!(sampler.color_range(), (0.0, 4.8));

    let request = pipeline.source("stars").unwrap().sample.clone().unwrap();
    let table = multi.loaders()[1]
        .sample(request.n, None, request.seed)
        .unwrap();
    assert_eq!(table.num_rows(), 4);
    let colors = table.column_by_name("color").unwrap().as_primitive::<Float64Type>();
    assert_eq!(colors.len(), 4);
}
