/// Calendar, cyclical, lag and rolling-mean features.
///
/// Lag and rolling features are computed per location over that location's
/// rows sorted by date. A lag of `L` means "`L` rows earlier", which equals
/// "`L` days earlier" only when the upstream data has one row per day per
/// location. That daily sampling is assumed, not checked.
///
/// Slash dates are read day first (`DD/MM/YYYY`), the Brazilian convention
/// used by the surveillance exports: `01/03/2024` is 1 March, never 3 January.
/// Month-first input must be converted to ISO dates upstream.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::model::{
    CalendarFeatures, CleanedRecord, Disease, DiseaseMap, FeatureRecord, LAG_DAYS, PipelineError,
    ROLLING_WINDOW,
};

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Parses a timestamp cell into a calendar date.
///
/// Accepts plain dates, naive date-times, and RFC 3339 date-times (whose
/// local date is kept, not the UTC date).
pub fn parse_timestamp(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Calendar and cyclical month features for a date.
pub fn calendar_features(date: NaiveDate) -> CalendarFeatures {
    let month = date.month();
    let angle = 2.0 * PI * f64::from(month) / 12.0;
    CalendarFeatures {
        year: date.year(),
        month,
        day_of_year: date.ordinal(),
        epi_week: date.iso_week().week(),
        month_sin: angle.sin(),
        month_cos: angle.cos(),
    }
}

/// Builds feature records for a cleaned table.
///
/// Output rows are in input order. Fails on the first row whose timestamp
/// is not a date.
pub fn build_features(records: &[CleanedRecord]) -> Result<Vec<FeatureRecord>, PipelineError> {
    let dates = records
        .iter()
        .enumerate()
        .map(|(row, r)| {
            parse_timestamp(&r.timestamp).ok_or_else(|| PipelineError::Parse {
                row,
                value: r.timestamp.clone(),
            })
        })
        .collect::<Result<Vec<NaiveDate>, PipelineError>>()?;

    let mut lags: Vec<DiseaseMap<[Option<f64>; 4]>> = vec![DiseaseMap::default(); records.len()];
    let mut rolling: Vec<DiseaseMap<f64>> = vec![DiseaseMap::default(); records.len()];

    for (location, rows) in partition_by_location(records, &dates) {
        tracing::trace!(location, rows = rows.len(), "building location features");
        for disease in Disease::ALL {
            let series: Vec<f64> = rows.iter().map(|&i| records[i].cases[disease]).collect();
            for (pos, &row) in rows.iter().enumerate() {
                lags[row][disease] = LAG_DAYS.map(|lag| pos.checked_sub(lag).map(|j| series[j]));
                rolling[row][disease] = trailing_mean(&series, pos, ROLLING_WINDOW);
            }
        }
    }

    Ok(records
        .iter()
        .zip(dates)
        .zip(lags.into_iter().zip(rolling))
        .map(|((record, date), (lags, rolling_mean))| FeatureRecord {
            base: record.clone(),
            date,
            calendar: calendar_features(date),
            lags,
            rolling_mean,
        })
        .collect())
}

/// Row indices grouped by location, each group stably sorted by date.
fn partition_by_location<'a>(
    records: &'a [CleanedRecord],
    dates: &[NaiveDate],
) -> BTreeMap<&'a str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        groups.entry(record.location.as_str()).or_default().push(i);
    }
    for rows in groups.values_mut() {
        rows.sort_by_key(|&i| dates[i]);
    }
    groups
}

/// Mean of up to `window` values ending at `pos` (inclusive).
fn trailing_mean(series: &[f64], pos: usize, window: usize) -> f64 {
    let start = (pos + 1).saturating_sub(window);
    let slice = &series[start..=pos];
    slice.iter().sum::<f64>() / slice.len() as f64
}
