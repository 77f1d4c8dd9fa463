//! Input schema validation.

use crate::model::{IDENTITY_COLUMNS, PipelineError, RawTable};

/// Checks that the raw table carries every identity column.
///
/// Columns are checked in `IDENTITY_COLUMNS` order (timestamp, then
/// location) and the first missing one is reported. Climate and case
/// columns are optional here; the cleaner derives them when absent.
pub fn validate(table: &RawTable) -> Result<(), PipelineError> {
    match IDENTITY_COLUMNS.iter().find(|col| !table.has_column(col)) {
        Some(missing) => Err(PipelineError::Schema((*missing).to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{COL_LOCATION, COL_TIMESTAMP};

    #[test]
    fn test_table_with_identity_columns_is_valid() {
        let table = RawTable::new([COL_TIMESTAMP, COL_LOCATION], Vec::new());
        assert_eq!(validate(&table), Ok(()));
    }

    #[test]
    fn test_missing_location_is_named() {
        let table = RawTable::new([COL_TIMESTAMP, "temperature"], Vec::new());
        assert_eq!(
            validate(&table),
            Err(PipelineError::Schema("location".to_string()))
        );
    }

    #[test]
    fn test_missing_both_reports_timestamp_first() {
        let table = RawTable::new(["temperature", "dengue"], Vec::new());
        let err = validate(&table).expect_err("table without identity columns must fail");
        assert_eq!(err.to_string(), "missing required column: timestamp");
    }

    #[test]
    fn test_standard_table_is_valid_even_when_empty() {
        let table = RawTable::with_standard_columns(Vec::new());
        assert!(validate(&table).is_ok());
    }
}
