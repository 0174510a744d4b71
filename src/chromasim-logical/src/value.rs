//! Scalar values: expression literals and aggregate results.

use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use serde::{Deserialize, Serialize};

use common_error::{ChromaError, ChromaResult};

/// A scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
        }
    }

    /// The Arrow type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Bool(_) => DataType::Boolean,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::Utf8,
        }
    }

    /// Convert a terminal JSON/YAML node (null, bool, number, string) into a value.
    ///
    /// Returns `None` for sequences and mappings.
    pub fn from_json(node: &serde_json::Value) -> Option<Self> {
        match node {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map(Self::Int64)
                    .unwrap_or_else(|| Self::Float64(n.as_f64().unwrap_or(f64::NAN))),
            ),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Read the value at `index` of an Arrow array.
    ///
    /// Integer types widen to `Int64`, floating and decimal types to `Float64`.
    pub fn from_array(array: &dyn Array, index: usize) -> ChromaResult<Self> {
        if index >= array.len() {
            return Err(ChromaError::internal(format!(
                "index {index} out of bounds for array of length {}",
                array.len()
            )));
        }
        if array.is_null(index) {
            return Ok(Self::Null);
        }

        let slice = array.slice(index, 1);
        let data_type = slice.data_type().clone();
        match data_type {
            DataType::Null => Ok(Self::Null),
            DataType::Boolean => Ok(Self::Bool(slice.as_boolean().value(0))),
            DataType::Utf8 | DataType::LargeUtf8 => {
                let utf8 = cast(&slice, &DataType::Utf8)?;
                Ok(Self::String(utf8.as_string::<i32>().value(0).to_string()))
            }
            dt if dt.is_integer() => {
                let ints = cast(&slice, &DataType::Int64)?;
                Ok(Self::Int64(ints.as_primitive::<Int64Type>().value(0)))
            }
            dt if dt.is_numeric() => {
                let floats = cast(&slice, &DataType::Float64)?;
                Ok(Self::Float64(floats.as_primitive::<Float64Type>().value(0)))
            }
            other => Err(ChromaError::type_error(format!(
                "cannot read a scalar value from column of type {other}"
            ))),
        }
    }

    /// Broadcast this value into an array of `len` rows.
    pub fn to_array(&self, len: usize) -> ArrayRef {
        match self {
            Self::Null => new_null_array(&DataType::Null, len),
            Self::Bool(b) => Arc::new(BooleanArray::from(vec![*b; len])),
            Self::Int64(i) => Arc::new(Int64Array::from(vec![*i; len])),
            Self::Float64(f) => Arc::new(Float64Array::from(vec![*f; len])),
            Self::String(s) => Arc::new(StringArray::from(vec![s.as_str(); len])),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float64(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
