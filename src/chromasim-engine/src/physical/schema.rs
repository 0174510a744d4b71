//! Physical schema wrapping an Arrow schema.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Schema as ArrowSchema, SchemaRef};

/// Output schema of a physical operator.
#[derive(Debug, Clone)]
pub struct PhysicalSchema {
    arrow_schema: SchemaRef,
}

impl PhysicalSchema {
    pub fn new(arrow_schema: SchemaRef) -> Self {
        Self { arrow_schema }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(ArrowSchema::empty()))
    }

    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.arrow_schema
    }

    pub fn num_columns(&self) -> usize {
        self.arrow_schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrow_schema.fields().is_empty()
    }
}

impl Default for PhysicalSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for PhysicalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in self.arrow_schema.fields() {
            let null = if field.is_nullable() { "" } else { " NOT NULL" };
            writeln!(f, "  {}: {}{}", field.name(), field.data_type(), null)?;
        }
        Ok(())
    }
}

impl From<SchemaRef> for PhysicalSchema {
    fn from(schema: SchemaRef) -> Self {
        Self::new(schema)
    }
}

impl From<ArrowSchema> for PhysicalSchema {
    fn from(schema: ArrowSchema) -> Self {
        Self::new(Arc::new(schema))
    }
}
