/// Imputation and outlier clipping.
///
/// Climate gaps are filled with the dataset-wide column mean; case gaps
/// become zero. Case counts are then clipped into the [p5, p95] range of
/// their column. Percentiles are computed over the whole batch, not per
/// location.

use serde::Serialize;
use std::fmt;

use crate::analysis::stats::{finite_mean, percentile};
use crate::model::{CleanedRecord, ClimateColumn, Disease, DiseaseMap, RawTable};

const LOWER_QUANTILE: f64 = 0.05;
const UPPER_QUANTILE: f64 = 0.95;

/// Something the cleaner had to make up or correct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CleaningDiagnostic {
    /// The climate column was not provided; every row was filled with 0.0.
    ClimateColumnAbsent(ClimateColumn),
    /// The climate column had no usable value to average; filled with 0.0.
    ClimateColumnEmpty(ClimateColumn),
    /// The case column was not provided; every row was filled with 0.
    CaseColumnAbsent(Disease),
    /// Negative case counts were raised to 0 before clipping.
    NegativeCasesFloored { disease: Disease, rows: usize },
}

impl fmt::Display for CleaningDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleaningDiagnostic::ClimateColumnAbsent(col) => {
                write!(f, "climate column '{}' absent, filled with 0.0", col)
            }
            CleaningDiagnostic::ClimateColumnEmpty(col) => {
                write!(f, "climate column '{}' has no values, filled with 0.0", col)
            }
            CleaningDiagnostic::CaseColumnAbsent(disease) => {
                write!(f, "case column '{}' absent, filled with 0", disease.key())
            }
            CleaningDiagnostic::NegativeCasesFloored { disease, rows } => {
                write!(f, "{} negative '{}' counts raised to 0", rows, disease.key())
            }
        }
    }
}

/// Output of the cleaner: the cleaned rows in input order plus diagnostics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedTable {
    pub records: Vec<CleanedRecord>,
    pub diagnostics: Vec<CleaningDiagnostic>,
}

/// Cleans a validated raw table.
pub fn clean(table: &RawTable) -> CleanedTable {
    let mut diagnostics = Vec::new();

    let fills = ClimateColumn::ALL.map(|col| climate_fill_value(table, col, &mut diagnostics));
    let [temp_fill, humidity_fill, precip_fill] = fills;

    let absent_cases = DiseaseMap::from_fn(|d| !table.has_column(d.key()));
    for disease in Disease::ALL {
        if absent_cases[disease] {
            diagnostics.push(CleaningDiagnostic::CaseColumnAbsent(disease));
        }
    }

    let mut cases: Vec<DiseaseMap<f64>> = table
        .records
        .iter()
        .map(|r| {
            r.cases.map(|d, v| match v {
                Some(count) if !absent_cases[d] && count.is_finite() => *count,
                _ => 0.0,
            })
        })
        .collect();

    for disease in Disease::ALL {
        let floored = floor_negative_counts(&mut cases, disease);
        if floored > 0 {
            diagnostics.push(CleaningDiagnostic::NegativeCasesFloored {
                disease,
                rows: floored,
            });
        }
        clip_to_percentiles(&mut cases, disease);
    }

    let records = table
        .records
        .iter()
        .zip(cases)
        .map(|(raw, cases)| CleanedRecord {
            timestamp: raw.timestamp.clone(),
            location: raw.location.clone(),
            temperature: fill_climate(table, raw.temperature, ClimateColumn::Temperature, temp_fill),
            humidity: fill_climate(table, raw.humidity, ClimateColumn::Humidity, humidity_fill),
            precipitation: fill_climate(
                table,
                raw.precipitation,
                ClimateColumn::Precipitation,
                precip_fill,
            ),
            cases,
        })
        .collect();

    CleanedTable {
        records,
        diagnostics,
    }
}

/// The value used for missing cells of a climate column.
fn climate_fill_value(
    table: &RawTable,
    column: ClimateColumn,
    diagnostics: &mut Vec<CleaningDiagnostic>,
) -> f64 {
    if !table.has_column(column.key()) {
        diagnostics.push(CleaningDiagnostic::ClimateColumnAbsent(column));
        return 0.0;
    }
    match finite_mean(table.records.iter().filter_map(|r| r.climate(column))) {
        Some(mean) => mean,
        None => {
            if !table.is_empty() {
                diagnostics.push(CleaningDiagnostic::ClimateColumnEmpty(column));
            }
            0.0
        }
    }
}

fn fill_climate(table: &RawTable, value: Option<f64>, column: ClimateColumn, fill: f64) -> f64 {
    if !table.has_column(column.key()) {
        return fill;
    }
    value.filter(|v| v.is_finite()).unwrap_or(fill)
}

fn floor_negative_counts(cases: &mut [DiseaseMap<f64>], disease: Disease) -> usize {
    let mut floored = 0;
    for row in cases.iter_mut() {
        if row[disease] < 0.0 {
            row[disease] = 0.0;
            floored += 1;
        }
    }
    floored
}

/// Clamps one case column into its own [p5, p95] range.
fn clip_to_percentiles(cases: &mut [DiseaseMap<f64>], disease: Disease) {
    let mut sorted: Vec<f64> = cases.iter().map(|c| c[disease]).collect();
    sorted.sort_by(f64::total_cmp);

    let (Some(lower), Some(upper)) = (
        percentile(&sorted, LOWER_QUANTILE),
        percentile(&sorted, UPPER_QUANTILE),
    ) else {
        return;
    };

    tracing::debug!(
        disease = disease.key(),
        lower,
        upper,
        "clipping case counts"
    );
    for row in cases.iter_mut() {
        row[disease] = row[disease].clamp(lower, upper);
    }
}
