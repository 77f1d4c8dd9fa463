//! Preprocessing pipeline: raw table in, model-ready table out.
//!
//! Stages run in a fixed order:
//! - `validate`: identity columns must be present.
//! - `clean`: imputation and percentile clipping.
//! - `features`: calendar, cyclical, lag and rolling features.
//! - `normalize`: standard scaling with retained parameters.
//!
//! Rows whose lag history is incomplete are dropped after normalization, so
//! the scalers are fitted on every row of the batch.

pub mod clean;
pub mod features;
pub mod normalize;
pub mod validate;

pub use clean::{CleanedTable, CleaningDiagnostic, clean};
pub use features::build_features;
pub use normalize::{ScaleParams, StandardScaler, normalize};
pub use validate::validate;

use crate::logging::{self, Stage};
use crate::model::{NormalizedRecord, PipelineError, RawTable};

/// Runs the pipeline and owns what it fitted.
///
/// The scale parameters and cleaning diagnostics of the most recent run
/// stay on the instance so callers can persist or re-apply them.
#[derive(Debug, Default)]
pub struct Preprocessor {
    scale_params: Option<ScaleParams>,
    diagnostics: Vec<CleaningDiagnostic>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate → clean → build features → normalize → drop incomplete rows.
    pub fn preprocess(&mut self, raw: &RawTable) -> Result<Vec<NormalizedRecord>, PipelineError> {
        tracing::info!(stage = %Stage::Preprocess, rows = raw.len(), "preprocessing started");

        validate(raw)?;

        let cleaned = clean(raw);
        for diagnostic in &cleaned.diagnostics {
            logging::warn(Stage::Preprocess, None, &diagnostic.to_string());
        }

        let features = build_features(&cleaned.records)?;
        let (normalized, params) = normalize(features);

        let total = normalized.len();
        let complete: Vec<NormalizedRecord> = normalized
            .into_iter()
            .filter(|r| r.features.has_complete_history())
            .collect();
        logging::log_stage_summary(Stage::Preprocess, total, complete.len());

        self.scale_params = Some(params);
        self.diagnostics = cleaned.diagnostics;
        Ok(complete)
    }

    /// Scale parameters fitted by the last successful run.
    pub fn scale_params(&self) -> Option<&ScaleParams> {
        self.scale_params.as_ref()
    }

    /// Cleaning diagnostics of the last successful run.
    pub fn diagnostics(&self) -> &[CleaningDiagnostic] {
        &self.diagnostics
    }
}

/// One-shot preprocessing with a throwaway `Preprocessor`.
pub fn preprocess(raw: &RawTable) -> Result<Vec<NormalizedRecord>, PipelineError> {
    Preprocessor::new().preprocess(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{COL_LOCATION, COL_TIMESTAMP, DiseaseMap, LAG_DAYS, RawRecord};
    use chrono::{Duration, NaiveDate};

    fn raw_series(location: &str, days: usize) -> Vec<RawRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..days)
            .map(|i| RawRecord {
                timestamp: (start + Duration::days(i as i64)).to_string(),
                location: location.to_string(),
                temperature: Some(20.0 + (i % 7) as f64),
                humidity: if i % 5 == 0 { None } else { Some(65.0) },
                precipitation: Some((i % 3) as f64),
                cases: DiseaseMap {
                    dengue: Some((i % 11) as f64),
                    zika: Some(1.0),
                    chikungunya: None,
                },
            })
            .collect()
    }

    #[test]
    fn test_rows_without_full_lag_history_are_dropped() {
        let mut records = raw_series("Diamantina", 40);
        records.extend(raw_series("Teófilo Otoni", 30));
        let max_lag = *LAG_DAYS.iter().max().unwrap();

        let mut pre = Preprocessor::new();
        let out = pre.preprocess(&RawTable::with_standard_columns(records)).unwrap();

        assert_eq!(out.len(), (40 - max_lag) + (30 - max_lag));
        assert!(out.iter().all(|r| r.features.has_complete_history()));
        assert!(pre.scale_params().is_some());
    }

    #[test]
    fn test_schema_error_aborts_before_cleaning() {
        let table = RawTable::new([COL_TIMESTAMP, "temperature"], raw_series("Diamantina", 5));
        let mut pre = Preprocessor::new();
        let err = pre.preprocess(&table).expect_err("missing location must fail");
        assert_eq!(err, PipelineError::Schema(COL_LOCATION.to_string()));
        assert!(pre.scale_params().is_none());
    }

    #[test]
    fn test_parse_error_propagates() {
        let mut records = raw_series("Diamantina", 5);
        records[3].timestamp = "31/31/2024".to_string();
        let err = preprocess(&RawTable::with_standard_columns(records)).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { row: 3, .. }));
    }

    #[test]
    fn test_short_series_yields_empty_output() {
        let out = preprocess(&RawTable::with_standard_columns(raw_series("Diamantina", 10))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_diagnostics_are_retained() {
        let mut pre = Preprocessor::new();
        let table = RawTable::new(
            [COL_TIMESTAMP, COL_LOCATION, "temperature", "dengue"],
            raw_series("Diamantina", 30),
        );
        pre.preprocess(&table).unwrap();
        assert!(pre
            .diagnostics()
            .contains(&CleaningDiagnostic::CaseColumnAbsent(crate::model::Disease::Zika)));
        assert!(pre.diagnostics().contains(&CleaningDiagnostic::ClimateColumnAbsent(
            crate::model::ClimateColumn::Humidity
        )));
    }
}
