//! Cached aggregate results.

use std::fmt;

use arrow::record_batch::RecordBatch;
use serde::ser::{Serialize, SerializeMap, Serializer};

use chromasim_logical::Value;
use common_error::{ChromaError, ChromaResult};

/// Output name of the aggregate that sampling draws from.
pub const COUNT_OUTPUT: &str = "count";

/// Aggregate outputs of one `process()` run, in aggregate order.
///
/// Each output maps to the values of its column; a global aggregate has
/// exactly one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateResult {
    columns: Vec<(String, Vec<Value>)>,
}

impl AggregateResult {
    /// Read every column of `batch`.
    pub fn from_batch(batch: &RecordBatch) -> ChromaResult<Self> {
        let schema = batch.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| {
                let values = (0..array.len())
                    .map(|i| Value::from_array(array.as_ref(), i))
                    .collect::<ChromaResult<Vec<_>>>()?;
                Ok((field.name().clone(), values))
            })
            .collect::<ChromaResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// First value of an output.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(<[Value]>::first)
    }

    /// First value of an output as a float, widening integers.
    pub fn float(&self, name: &str) -> ChromaResult<f64> {
        let value = self.scalar(name).ok_or_else(|| {
            ChromaError::precondition(format!("aggregate has no '{name}' output"))
        })?;
        value.as_float64().ok_or_else(|| {
            ChromaError::precondition(format!("aggregate output '{name}' is not numeric: {value}"))
        })
    }

    /// The row count sampling draws from, the `count` output.
    pub fn count(&self) -> ChromaResult<u64> {
        let value = self.scalar(COUNT_OUTPUT).ok_or_else(|| {
            ChromaError::precondition(format!(
                "aggregate has no '{COUNT_OUTPUT}' output to sample from"
            ))
        })?;
        value
            .as_int64()
            .and_then(|c| u64::try_from(c).ok())
            .ok_or_else(|| {
                ChromaError::precondition(format!(
                    "aggregate output '{COUNT_OUTPUT}' is not a row count: {value}"
                ))
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, values)) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            write!(f, "{name}: [{}]", values.join(", "))?;
        }
        write!(f, "}}")
    }
}
