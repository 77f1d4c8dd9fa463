//! Arbovirus early-warning service.
//!
//! Turns daily climate and case-count data per municipality into
//! model-ready features, asks a risk model for per-disease probabilities,
//! and raises alerts when the dominant disease's risk crosses a threshold.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod municipalities;
pub mod predict;
pub mod preprocess;
pub mod run;

pub use model::{AlertRecord, Disease, DiseaseMap, NormalizedRecord, PipelineError, RawTable, RiskRecord};
pub use preprocess::{Preprocessor, preprocess};
pub use run::{RunOutcome, run_batch};
