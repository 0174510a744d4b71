//! Shear-measurement output tables.
//!
//! A measurement produces one catalog per shear step (`noshear`, `1p`,
//! `1m`, ...). Catalogs are conformed to [`measurement_schema`], tagged with
//! their step in the `mdet_step` column and laid out as batches, one
//! concatenated table, or a per-step table list.

use std::sync::{Arc, OnceLock};

use arrow::array::{ArrayRef, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;

use common_error::{ChromaError, ChromaResult};

/// Column holding the shear step of each row.
pub const STEP_COLUMN: &str = "mdet_step";

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// Schema of the measurement table.
pub fn measurement_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let f64_list = || list_of(DataType::Float64);
            let columns = [
                ("pgauss_flags", DataType::Int64),
                ("pgauss_psf_flags", DataType::Int64),
                ("pgauss_psf_g", f64_list()),
                ("pgauss_psf_T", DataType::Float64),
                ("pgauss_obj_flags", DataType::Int64),
                ("pgauss_s2n", DataType::Float64),
                ("pgauss_g", f64_list()),
                ("pgauss_g_cov", list_of(f64_list())),
                ("pgauss_T", DataType::Float64),
                ("pgauss_T_flags", DataType::Int64),
                ("pgauss_T_err", DataType::Float64),
                ("pgauss_T_ratio", DataType::Float64),
                ("pgauss_band_flux_flags", list_of(DataType::Int64)),
                ("pgauss_band_flux", f64_list()),
                ("pgauss_band_flux_err", f64_list()),
                ("shear_bands", DataType::Utf8),
                ("sx_row", DataType::Float64),
                ("sx_col", DataType::Float64),
                ("sx_row_noshear", DataType::Float64),
                ("sx_col_noshear", DataType::Float64),
                ("ormask", DataType::Int64),
                ("mfrac", DataType::Float64),
                ("bmask", DataType::Int64),
                ("mfrac_img", DataType::Float64),
                ("ormask_noshear", DataType::Int64),
                ("mfrac_noshear", DataType::Float64),
                ("bmask_noshear", DataType::Int64),
                ("det_bands", DataType::Utf8),
                ("psfrec_flags", DataType::Int64),
                ("psfrec_g", f64_list()),
                ("psfrec_T", DataType::Float64),
                (STEP_COLUMN, DataType::Utf8),
            ];
            Arc::new(Schema::new(
                columns
                    .into_iter()
                    .map(|(name, data_type)| Field::new(name, data_type, true))
                    .collect::<Vec<_>>(),
            ))
        })
        .clone()
}

/// Conform one step's catalog to the measurement schema.
///
/// Every schema column but `mdet_step` must be present in `catalog`; values
/// are cast to the schema type and extra columns are dropped.
pub fn to_batch(step: &str, catalog: &RecordBatch) -> ChromaResult<RecordBatch> {
    let schema = measurement_schema();
    let rows = catalog.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            if field.name() == STEP_COLUMN {
                return Ok(Arc::new(StringArray::from(vec![step; rows])) as ArrayRef);
            }
            let column = catalog
                .column_by_name(field.name())
                .ok_or_else(|| ChromaError::column_not_found(field.name()))?;
            if column.data_type() == field.data_type() {
                Ok(Arc::clone(column))
            } else {
                cast(column, field.data_type()).map_err(|e| {
                    ChromaError::type_error(format!(
                        "measurement column '{}' of type {} does not conform to {}: {e}",
                        field.name(),
                        column.data_type(),
                        field.data_type()
                    ))
                })
            }
        })
        .collect::<ChromaResult<Vec<_>>>()?;

    debug!("Conformed {rows} rows of step '{step}'");
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// One batch per step, in step order.
pub fn to_batches(measurement: &[(String, RecordBatch)]) -> ChromaResult<Vec<RecordBatch>> {
    measurement
        .iter()
        .map(|(step, catalog)| to_batch(step, catalog))
        .collect()
}

/// Every step concatenated into one table.
pub fn to_table(measurement: &[(String, RecordBatch)]) -> ChromaResult<RecordBatch> {
    let batches = to_batches(measurement)?;
    Ok(concat_batches(&measurement_schema(), &batches)?)
}

/// One table per step, keyed by step and in step order.
pub fn to_step_tables(
    measurement: &[(String, RecordBatch)],
) -> ChromaResult<Vec<(String, RecordBatch)>> {
    measurement
        .iter()
        .map(|(step, catalog)| Ok((step.clone(), to_batch(step, catalog)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{new_null_array, AsArray, Float32Array, Int32Array};

    fn create_catalog(rows: usize) -> RecordBatch {
        let schema = measurement_schema();
        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();
        for field in schema.fields().iter().filter(|f| f.name() != STEP_COLUMN) {
            let column: ArrayRef = match field.name().as_str() {
                "pgauss_flags" => Arc::new(Int32Array::from_iter_values(0..rows as i32)),
                "pgauss_s2n" => Arc::new(Float32Array::from(vec![12.5f32; rows])),
                _ => new_null_array(field.data_type(), rows),
            };
            fields.push(Field::new(field.name(), column.data_type().clone(), true));
            columns.push(column);
        }
        fields.push(Field::new("unused", DataType::Int64, true));
        columns.push(new_null_array(&DataType::Int64, rows));
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    fn create_measurement() -> Vec<(String, RecordBatch)> {
        vec![
            ("noshear".to_string(), create_catalog(3)),
            ("1p".to_string(), create_catalog(2)),
            ("1m".to_string(), create_catalog(0)),
        ]
    }

    #[test]
    fn test_schema() {
        let schema = measurement_schema();
        assert_eq!(schema.fields().len(), 32);
        assert_eq!(schema.field(0).name(), "pgauss_flags");
        assert_eq!(schema.field(31).name(), STEP_COLUMN);
        assert_eq!(
            schema.field_with_name("pgauss_g_cov").unwrap().data_type(),
            &list_of(list_of(DataType::Float64))
        );
    }

    #[test]
    fn test_to_batches() {
        let batches = to_batches(&create_measurement()).unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.schema() == measurement_schema()));

        let first = &batches[0];
        assert_eq!(first.num_rows(), 3);
        let steps = first.column(31).as_string::<i32>();
        assert!(steps.iter().all(|s| s == Some("noshear")));
        let flags = first.column(0).as_primitive::<arrow::datatypes::Int64Type>();
        assert_eq!(flags.values().to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_to_table() {
        let table = to_table(&create_measurement()).unwrap();
        assert_eq!(table.num_rows(), 5);
        let steps: Vec<_> = table.column(31).as_string::<i32>().iter().flatten().collect();
        assert_eq!(steps, vec!["noshear", "noshear", "noshear", "1p", "1p"]);
    }

    #[test]
    fn test_to_step_tables_keeps_order() {
        let tables = to_step_tables(&create_measurement()).unwrap();
        let steps: Vec<_> = tables.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(steps, vec!["noshear", "1p", "1m"]);
        assert_eq!(tables[2].1.num_rows(), 0);
    }

    #[test]
    fn test_missing_column() {
        let catalog = create_catalog(1);
        let reduced = catalog.project(&[0, 1, 2]).unwrap();
        let err = to_batch("noshear", &reduced).unwrap_err();
        assert!(matches!(err, ChromaError::ColumnNotFound(_)));
    }

    #[test]
    fn test_unconvertible_column() {
        let catalog = create_catalog(1);
        let mut fields: Vec<Field> =
            catalog.schema().fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns = catalog.columns().to_vec();
        let index = catalog.schema().index_of("pgauss_flags").unwrap();
        let list_type = list_of(DataType::Float64);
        fields[index] = Field::new("pgauss_flags", list_type.clone(), true);
        columns[index] = new_null_array(&list_type, 1);
        let catalog = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();
        assert!(matches!(
            to_batch("noshear", &catalog).unwrap_err(),
            ChromaError::TypeError(_)
        ));
    }
}
