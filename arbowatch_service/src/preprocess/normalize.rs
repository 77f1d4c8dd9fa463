/// Zero-mean, unit-variance rescaling of the climate columns and day of year.
///
/// The fitted (mean, std) pair of every column is kept in `ScaleParams` so
/// the exact transform can be re-applied to new batches or inverted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::stats::{finite_mean, population_std};
use crate::model::{FeatureRecord, NormalizedRecord, NumericColumn, ScaledValues};

/// Affine transform `(x - mean) / std` fitted on one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub std: f64,
}

impl StandardScaler {
    /// Fits on the finite values of `values`; non-finite entries are
    /// treated as missing and replaced by the mean before computing std.
    pub fn fit(values: &[f64]) -> Self {
        let mean = finite_mean(values.iter().copied()).unwrap_or(0.0);
        let filled: Vec<f64> = values
            .iter()
            .map(|v| if v.is_finite() { *v } else { mean })
            .collect();
        StandardScaler {
            mean,
            std: population_std(&filled, mean),
        }
    }

    /// Rescales a value. A constant column (std = 0) maps to 0.0, and a
    /// missing value is treated as the mean.
    pub fn transform(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { self.mean };
        if self.std == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }

    /// Undoes `transform`. For a constant column this returns the mean.
    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        scaled * self.std + self.mean
    }
}

/// Fitted scalers, one per normalized column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleParams {
    scalers: BTreeMap<NumericColumn, StandardScaler>,
}

impl ScaleParams {
    /// Fits every column in `NumericColumn::ALL` over `records`.
    pub fn fit(records: &[FeatureRecord]) -> Self {
        let scalers = NumericColumn::ALL
            .into_iter()
            .map(|col| {
                let values: Vec<f64> = records.iter().map(|r| r.numeric(col)).collect();
                (col, StandardScaler::fit(&values))
            })
            .collect();
        ScaleParams { scalers }
    }

    pub fn get(&self, column: NumericColumn) -> Option<&StandardScaler> {
        self.scalers.get(&column)
    }

    /// Applies the fitted transform to one record.
    pub fn transform(&self, record: FeatureRecord) -> NormalizedRecord {
        let mut scaled = ScaledValues::default();
        for col in NumericColumn::ALL {
            let value = record.numeric(col);
            let out = match self.get(col) {
                Some(scaler) => scaler.transform(value),
                None => value,
            };
            scaled.set(col, out);
        }
        NormalizedRecord {
            features: record,
            scaled,
        }
    }

    /// Applies the fitted transform to a batch, e.g. new data scored with
    /// the parameters of an earlier run.
    pub fn apply(&self, records: Vec<FeatureRecord>) -> Vec<NormalizedRecord> {
        records.into_iter().map(|r| self.transform(r)).collect()
    }

    /// Reconstructs the unscaled values of a normalized record.
    pub fn inverse(&self, scaled: &ScaledValues) -> ScaledValues {
        let mut restored = ScaledValues::default();
        for col in NumericColumn::ALL {
            let value = scaled.get(col);
            let out = match self.get(col) {
                Some(scaler) => scaler.inverse_transform(value),
                None => value,
            };
            restored.set(col, out);
        }
        restored
    }
}

/// Fits scale parameters over the whole batch and rescales it.
pub fn normalize(records: Vec<FeatureRecord>) -> (Vec<NormalizedRecord>, ScaleParams) {
    let params = ScaleParams::fit(&records);
    for (col, scaler) in &params.scalers {
        tracing::debug!(column = col.key(), mean = scaler.mean, std = scaler.std, "fitted scaler");
    }
    (params.apply(records), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CleanedRecord, DiseaseMap};
    use crate::preprocess::features::calendar_features;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};

    fn feature(day_offset: i64, temperature: f64, humidity: f64) -> FeatureRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day_offset);
        FeatureRecord {
            base: CleanedRecord {
                timestamp: date.to_string(),
                location: "Diamantina".to_string(),
                temperature,
                humidity,
                precipitation: 4.0,
                cases: DiseaseMap::default(),
            },
            date,
            calendar: calendar_features(date),
            lags: DiseaseMap::default(),
            rolling_mean: DiseaseMap::default(),
        }
    }

    #[test]
    fn test_scaler_fit_and_transform() {
        let scaler = StandardScaler::fit(&[2.0, 4.0, 6.0]);
        assert_abs_diff_eq!(scaler.mean, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scaler.std, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(scaler.transform(4.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_normalizes_to_zero() {
        let scaler = StandardScaler::fit(&[5.0, 5.0, 5.0]);
        assert_eq!(scaler.std, 0.0);
        assert_eq!(scaler.transform(5.0), 0.0);
        assert_eq!(scaler.transform(9.0), 0.0);
        assert_eq!(scaler.inverse_transform(0.0), 5.0);
    }

    #[test]
    fn test_non_finite_values_treated_as_mean() {
        let scaler = StandardScaler::fit(&[1.0, f64::NAN, 3.0]);
        assert_abs_diff_eq!(scaler.mean, 2.0, epsilon = 1e-12);
        assert_eq!(scaler.transform(f64::NAN), 0.0);
    }

    #[test]
    fn test_normalized_columns_have_zero_mean_unit_variance() {
        let records: Vec<FeatureRecord> = (0..10)
            .map(|i| feature(i, 20.0 + i as f64, 60.0 + 2.0 * i as f64))
            .collect();
        let (normalized, _) = normalize(records);
        for col in [NumericColumn::Temperature, NumericColumn::Humidity, NumericColumn::DayOfYear] {
            let values: Vec<f64> = normalized.iter().map(|r| r.scaled.get(col)).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-9);
        }
        // Precipitation is constant in this batch.
        assert!(normalized.iter().all(|r| r.scaled.precipitation == 0.0));
    }

    #[test]
    fn test_inverse_reconstructs_original_values() {
        let records: Vec<FeatureRecord> = (0..5)
            .map(|i| feature(i * 3, 18.5 + i as f64 * 1.7, 55.0 - i as f64))
            .collect();
        let originals: Vec<FeatureRecord> = records.clone();
        let (normalized, params) = normalize(records);
        for (record, original) in normalized.iter().zip(&originals) {
            let restored = params.inverse(&record.scaled);
            assert_abs_diff_eq!(restored.temperature, original.base.temperature, epsilon = 1e-9);
            assert_abs_diff_eq!(restored.humidity, original.base.humidity, epsilon = 1e-9);
            assert_abs_diff_eq!(
                restored.day_of_year,
                f64::from(original.calendar.day_of_year),
                epsilon = 1e-9
            );
            // std = 0: the inverse is the column mean, which is the constant.
            assert_abs_diff_eq!(restored.precipitation, 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_params_reapply_to_new_data() {
        let train: Vec<FeatureRecord> = (0..4).map(|i| feature(i, 20.0 + i as f64, 60.0)).collect();
        let (_, params) = normalize(train);
        let scaler = *params.get(NumericColumn::Temperature).unwrap();
        let fresh = params.apply(vec![feature(10, 30.0, 60.0)]);
        assert_abs_diff_eq!(
            fresh[0].scaled.temperature,
            (30.0 - scaler.mean) / scaler.std,
            epsilon = 1e-12
        );
        // The unscaled record travels along.
        assert_eq!(fresh[0].features.base.temperature, 30.0);
    }

    #[test]
    fn test_scale_params_serialize_by_column_name() {
        let (_, params) = normalize(vec![feature(0, 20.0, 60.0), feature(1, 22.0, 62.0)]);
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"temperature\""));
        assert!(json.contains("\"day_of_year\""));
        let back: ScaleParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
