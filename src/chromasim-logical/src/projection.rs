//! Ordered output-column mapping.

use serde::{Deserialize, Serialize};

use crate::LogicalExpr;

/// Ordered mapping from output column name to expression.
///
/// Inserting an existing name replaces its expression but keeps the position of
/// the first occurrence, so a repeated name in a projection list is last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    entries: Vec<(String, LogicalExpr)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an output column. Returns the replaced expression, if any.
    pub fn insert(&mut self, name: impl Into<String>, expr: LogicalExpr) -> Option<LogicalExpr> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, expr)),
            None => {
                self.entries.push((name, expr));
                None
            }
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, expr: LogicalExpr) -> Self {
        self.insert(name, expr);
        self
    }

    pub fn get(&self, name: &str) -> Option<&LogicalExpr> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LogicalExpr)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Output names in order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Columns read by any output expression, in first-appearance order.
    pub fn input_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (_, expr) in &self.entries {
            expr.collect_columns(&mut out);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, LogicalExpr)> for Projection {
    fn from_iter<I: IntoIterator<Item = (String, LogicalExpr)>>(iter: I) -> Self {
        let mut projection = Self::new();
        for (name, expr) in iter {
            projection.insert(name, expr);
        }
        projection
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, expr)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match expr.as_column() {
                Some(c) if c == name => write!(f, "{name}")?,
                _ => write!(f, "{expr} AS {name}")?,
            }
        }
        Ok(())
    }
}
