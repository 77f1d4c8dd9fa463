//! Data acquisition adapters.
//!
//! Every loader ends in the same place: a `RawTable` with one row per
//! (date, municipality), ready for `preprocess`.
//!
//! - `csv_table`: raw tables and alert lists as CSV.
//! - `daily`: collapses sub-daily climate readings and case reports into daily rows.
//! - `db`: the surveillance Postgres database.
//! - `synthetic`: seeded fallback data when the database is unreachable.

pub mod csv_table;
pub mod daily;
pub mod db;
pub mod synthetic;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("row {row}, column '{column}': '{value}' is not a number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("synthetic data generation failed: {0}")]
    Synthetic(String),
}
