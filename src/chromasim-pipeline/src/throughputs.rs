//! Per-band total throughput tables.
//!
//! Tables are read from `total_<band>.dat` files: whitespace-separated
//! `wavelength throughput` rows with `#` comments. Loaded tables are kept in
//! an explicit [`ThroughputCache`] owned by the caller.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};

use common_config::ThroughputConfig;
use common_error::{ChromaError, ChromaResult};

/// Environment variable naming the throughput directory.
pub const THROUGHPUT_DIR_ENV: &str = "THROUGHPUT_DIR";

/// Photometric band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
}

impl Band {
    pub const ALL: [Band; 6] = [Band::U, Band::G, Band::R, Band::I, Band::Z, Band::Y];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::U => "u",
            Self::G => "g",
            Self::R => "r",
            Self::I => "i",
            Self::Z => "z",
            Self::Y => "y",
        }
    }

    pub fn file_name(&self) -> String {
        format!("total_{}.dat", self.as_str())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = ChromaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|band| band.as_str() == s)
            .ok_or_else(|| {
                ChromaError::config(format!(
                    "unknown band '{s}' (expected one of u, g, r, i, z, y)"
                ))
            })
    }
}

/// A sampled throughput curve, wavelengths in nm.
#[derive(Debug, Clone, PartialEq)]
pub struct Throughput {
    band: Band,
    wavelengths: Vec<f64>,
    values: Vec<f64>,
}

impl Throughput {
    /// Build a curve from strictly increasing wavelengths.
    pub fn try_new(band: Band, wavelengths: Vec<f64>, values: Vec<f64>) -> ChromaResult<Self> {
        if wavelengths.len() != values.len() {
            return Err(ChromaError::storage(format!(
                "{band}-band throughput has {} wavelengths but {} values",
                wavelengths.len(),
                values.len()
            )));
        }
        if wavelengths.is_empty() {
            return Err(ChromaError::storage(format!("{band}-band throughput is empty")));
        }
        if wavelengths.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ChromaError::storage(format!(
                "{band}-band throughput wavelengths are not strictly increasing"
            )));
        }
        Ok(Self {
            band,
            wavelengths,
            values,
        })
    }

    /// Parse the text of a throughput table.
    pub fn parse(band: Band, text: &str) -> ChromaResult<Self> {
        let mut wavelengths = Vec::new();
        let mut values = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace().map(str::parse::<f64>);
            match (fields.next(), fields.next()) {
                (Some(Ok(wavelength)), Some(Ok(value))) => {
                    wavelengths.push(wavelength);
                    values.push(value);
                }
                _ => {
                    return Err(ChromaError::storage(format!(
                        "malformed {band}-band throughput row {}: '{line}'",
                        lineno + 1
                    )))
                }
            }
        }
        Self::try_new(band, wavelengths, values)
    }

    /// Read a throughput table from disk.
    pub fn load(band: Band, path: &Path) -> ChromaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))
        })?;
        Self::parse(band, &text)
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Covered wavelength interval.
    pub fn range(&self) -> (f64, f64) {
        // try_new guarantees at least one sample
        let first = self.wavelengths[0];
        let last = self.wavelengths[self.wavelengths.len() - 1];
        (first, last)
    }

    /// Linearly interpolated throughput at `wavelength`, zero outside the table.
    pub fn at(&self, wavelength: f64) -> f64 {
        let (lo, hi) = self.range();
        if !(lo..=hi).contains(&wavelength) {
            return 0.0;
        }
        match self.wavelengths.binary_search_by(|w| w.total_cmp(&wavelength)) {
            Ok(i) => self.values[i],
            Err(i) => {
                let (x0, x1) = (self.wavelengths[i - 1], self.wavelengths[i]);
                let (y0, y1) = (self.values[i - 1], self.values[i]);
                y0 + (y1 - y0) * (wavelength - x0) / (x1 - x0)
            }
        }
    }
}

/// Lazily loaded throughput tables of one directory.
#[derive(Debug, Clone)]
pub struct ThroughputCache {
    dir: PathBuf,
    entries: HashMap<Band, Arc<Throughput>>,
}

impl ThroughputCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: HashMap::new(),
        }
    }

    /// Use `THROUGHPUT_DIR`, else the working directory.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(THROUGHPUT_DIR_ENV)
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        Self::new(dir)
    }

    /// Use the configured directory, else [`ThroughputCache::from_env`].
    pub fn from_config(config: &ThroughputConfig) -> Self {
        config.dir.as_ref().map_or_else(Self::from_env, |dir| Self::new(dir.clone()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, band: Band) -> PathBuf {
        self.dir.join(band.file_name())
    }

    /// Table for `band`, loading it on first use.
    pub fn get(&mut self, band: Band) -> ChromaResult<Arc<Throughput>> {
        if let Some(throughput) = self.entries.get(&band) {
            debug!("Throughput cache hit for {band}-band");
            return Ok(Arc::clone(throughput));
        }
        let path = self.path(band);
        info!("Loading throughput for {band}-band from {}", path.display());
        let throughput = Arc::new(Throughput::load(band, &path)?);
        self.entries.insert(band, Arc::clone(&throughput));
        Ok(throughput)
    }

    /// Load every band of `bands`, in order.
    pub fn load_all(&mut self, bands: &[Band]) -> ChromaResult<Vec<Arc<Throughput>>> {
        bands.iter().map(|&band| self.get(band)).collect()
    }

    /// Drop the cached table of `band`; returns whether one was cached.
    pub fn invalidate(&mut self, band: Band) -> bool {
        self.entries.remove(&band).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_loaded(&self, band: Band) -> bool {
        self.entries.contains_key(&band)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse configured band names.
pub fn parse_bands(names: &[String]) -> ChromaResult<Vec<Band>> {
    names.iter().map(|name| name.parse()).collect()
}
