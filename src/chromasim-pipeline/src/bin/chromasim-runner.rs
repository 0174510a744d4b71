//! Pipeline runner.
//!
//! Aggregates and samples the sources of a pipeline configuration and prints
//! the results.
//!
//! Usage:
//! ```
//! cargo run --bin chromasim-runner -- --config pipeline.yaml process
//! cargo run --bin chromasim-runner -- --config pipeline.yaml --source stars sample -n 10 --seed 42
//! cargo run --bin chromasim-runner -- --config pipeline.yaml galaxies -n 5
//! ```

use std::path::PathBuf;

use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use log::warn;

use chromasim_pipeline::galaxies::{self, GalaxyParameterSampler};
use chromasim_pipeline::throughputs::{parse_bands, ThroughputCache};
use chromasim_pipeline::MultiLoader;
use common_config::{PipelineConfig, SourceConfig, ThroughputConfig};
use common_error::ChromaError;

#[derive(Parser)]
#[command(name = "chromasim-runner")]
#[command(about = "Aggregate and sample reference catalogs")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Restrict to one named source
    #[arg(short, long)]
    source: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the aggregate of every source
    Process {
        /// Print aggregates as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print sampled rows of every source
    Sample {
        /// Rows to draw, overriding the sources' sample requests
        #[arg(short)]
        n: Option<usize>,

        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,

        /// Columns to materialize
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// Draw galaxy parameters bounded by a source's colour range
    Galaxies {
        /// Galaxies to draw
        #[arg(short, default_value_t = 10)]
        n: usize,

        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Load and summarize the configured throughput tables
    Throughputs,
}

fn select_sources(
    pipeline: &PipelineConfig,
    name: Option<&str>,
) -> Result<Vec<SourceConfig>, ChromaError> {
    match name {
        None => Ok(pipeline.sources.clone()),
        Some(name) => pipeline
            .source(name)
            .cloned()
            .map(|source| vec![source])
            .ok_or_else(|| ChromaError::config(format!("no source named '{name}' in pipeline"))),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut pipeline = PipelineConfig::from_path(&cli.config)?;
    pipeline.sources = select_sources(&pipeline, cli.source.as_deref())?;

    if let Command::Throughputs = cli.command {
        let config = pipeline.throughputs.clone().unwrap_or_else(ThroughputConfig::default);
        let mut cache = ThroughputCache::from_config(&config);
        for throughput in cache.load_all(&parse_bands(&config.bands)?)? {
            let (lo, hi) = throughput.range();
            println!(
                "{}: {} samples over [{lo}, {hi}] nm",
                throughput.band(),
                throughput.wavelengths().len()
            );
        }
        return Ok(());
    }

    let mut multi = MultiLoader::from_pipeline(&pipeline)?;
    multi.process()?;

    match cli.command {
        Command::Process { json } => {
            for (source, aggregate) in pipeline.sources.iter().zip(multi.aggregate()) {
                let Some(aggregate) = aggregate else { continue };
                if json {
                    println!("{}: {}", source.name, serde_json::to_string(aggregate)?);
                } else {
                    println!("{}: {aggregate}", source.name);
                }
            }
        }
        Command::Sample { n, seed, columns } => {
            for (source, loader) in pipeline.sources.iter().zip(multi.loaders()) {
                let request = source.sample.clone();
                let Some(n) = n.or(request.as_ref().map(|r| r.n)) else {
                    warn!("Source '{}' has no sample request; skipping", source.name);
                    continue;
                };
                let seed = seed.or(request.as_ref().and_then(|r| r.seed));
                let columns = columns
                    .clone()
                    .or_else(|| request.and_then(|r| r.columns));

                let table = loader.sample(n, columns.as_deref(), seed)?;
                println!("{}:\n{}", source.name, pretty_format_batches(&[table])?);
            }
        }
        Command::Galaxies { n, seed } => {
            for (source, aggregate) in pipeline.sources.iter().zip(multi.aggregate()) {
                let Some(aggregate) = aggregate else { continue };
                let sampler = match GalaxyParameterSampler::from_aggregate(aggregate) {
                    Ok(sampler) => sampler,
                    Err(e) if cli.source.is_none() && e.is_precondition() => {
                        warn!("Source '{}' has no colour range: {e}", source.name);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                let batch = galaxies::to_batch(&sampler.sample(n, seed))?;
                println!("{}:\n{}", source.name, pretty_format_batches(&[batch])?);
            }
        }
        Command::Throughputs => {}
    }

    Ok(())
}
