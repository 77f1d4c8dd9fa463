/// Disease, DiseaseMap, the record types of each pipeline stage, and the
/// pipeline error taxonomy.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no pipeline logic and no I/O, only types and small accessors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_LOCATION: &str = "location";
pub const COL_TEMPERATURE: &str = "temperature";
pub const COL_HUMIDITY: &str = "humidity";
pub const COL_PRECIPITATION: &str = "precipitation";

/// Identity columns, in the order the validator checks them.
pub const IDENTITY_COLUMNS: [&str; 2] = [COL_TIMESTAMP, COL_LOCATION];

/// Lag offsets (in rows, i.e. days under daily sampling) for case features.
pub const LAG_DAYS: [usize; 4] = [7, 14, 21, 28];

/// Trailing window length for the rolling case mean.
pub const ROLLING_WINDOW: usize = 4;

// ---------------------------------------------------------------------------
// Diseases
// ---------------------------------------------------------------------------

/// Arboviruses tracked by the service.
///
/// Declaration order is the tie-break priority used when two diseases share
/// the highest risk: dengue, then zika, then chikungunya.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Dengue,
    Zika,
    Chikungunya,
}

impl Disease {
    /// All diseases in priority order.
    pub const ALL: [Disease; 3] = [Disease::Dengue, Disease::Zika, Disease::Chikungunya];

    /// Lowercase key, also the name of the case-count column.
    pub fn key(self) -> &'static str {
        match self {
            Disease::Dengue => "dengue",
            Disease::Zika => "zika",
            Disease::Chikungunya => "chikungunya",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Disease::Dengue => "Dengue",
            Disease::Zika => "Zika",
            Disease::Chikungunya => "Chikungunya",
        }
    }

    /// Case-insensitive lookup by key.
    pub fn from_key(key: &str) -> Option<Disease> {
        Disease::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One value per disease.
///
/// Stands in for "disease name -> value" dictionaries so every stage is
/// forced to handle all three diseases.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiseaseMap<T> {
    pub dengue: T,
    pub zika: T,
    pub chikungunya: T,
}

impl<T> DiseaseMap<T> {
    pub fn from_fn(mut f: impl FnMut(Disease) -> T) -> Self {
        DiseaseMap {
            dengue: f(Disease::Dengue),
            zika: f(Disease::Zika),
            chikungunya: f(Disease::Chikungunya),
        }
    }

    pub fn get(&self, disease: Disease) -> &T {
        match disease {
            Disease::Dengue => &self.dengue,
            Disease::Zika => &self.zika,
            Disease::Chikungunya => &self.chikungunya,
        }
    }

    pub fn get_mut(&mut self, disease: Disease) -> &mut T {
        match disease {
            Disease::Dengue => &mut self.dengue,
            Disease::Zika => &mut self.zika,
            Disease::Chikungunya => &mut self.chikungunya,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Disease, &T) -> U) -> DiseaseMap<U> {
        DiseaseMap::from_fn(|d| f(d, self.get(d)))
    }

    /// Iterates in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (Disease, &T)> {
        Disease::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

impl<T> Index<Disease> for DiseaseMap<T> {
    type Output = T;

    fn index(&self, disease: Disease) -> &T {
        self.get(disease)
    }
}

impl<T> IndexMut<Disease> for DiseaseMap<T> {
    fn index_mut(&mut self, disease: Disease) -> &mut T {
        self.get_mut(disease)
    }
}

// ---------------------------------------------------------------------------
// Climate and numeric columns
// ---------------------------------------------------------------------------

/// Climate measurements carried on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateColumn {
    Temperature,
    Humidity,
    Precipitation,
}

impl ClimateColumn {
    pub const ALL: [ClimateColumn; 3] = [
        ClimateColumn::Temperature,
        ClimateColumn::Humidity,
        ClimateColumn::Precipitation,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ClimateColumn::Temperature => COL_TEMPERATURE,
            ClimateColumn::Humidity => COL_HUMIDITY,
            ClimateColumn::Precipitation => COL_PRECIPITATION,
        }
    }
}

impl fmt::Display for ClimateColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Columns rescaled by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    Temperature,
    Humidity,
    Precipitation,
    DayOfYear,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 4] = [
        NumericColumn::Temperature,
        NumericColumn::Humidity,
        NumericColumn::Precipitation,
        NumericColumn::DayOfYear,
    ];

    pub fn key(self) -> &'static str {
        match self {
            NumericColumn::Temperature => COL_TEMPERATURE,
            NumericColumn::Humidity => COL_HUMIDITY,
            NumericColumn::Precipitation => COL_PRECIPITATION,
            NumericColumn::DayOfYear => "day_of_year",
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One row of the raw input table, one per (timestamp, location).
///
/// The timestamp stays textual until the feature builder parses it, so a
/// malformed date surfaces as a parse error at that stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: String,
    pub location: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub cases: DiseaseMap<Option<f64>>,
}

impl RawRecord {
    pub fn climate(&self, column: ClimateColumn) -> Option<f64> {
        match column {
            ClimateColumn::Temperature => self.temperature,
            ClimateColumn::Humidity => self.humidity,
            ClimateColumn::Precipitation => self.precipitation,
        }
    }
}

/// The raw table: which columns the source provided, plus its rows.
///
/// Column presence is tracked separately from null values because the
/// validator and cleaner treat "absent column" and "null cell" differently.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new<I, S>(columns: I, records: Vec<RawRecord>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawTable {
            columns: columns.into_iter().map(Into::into).collect(),
            records,
        }
    }

    /// A table that declares every standard input column.
    pub fn with_standard_columns(records: Vec<RawRecord>) -> Self {
        RawTable::new(standard_columns(), records)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The full input schema, in canonical column order.
pub fn standard_columns() -> Vec<&'static str> {
    let mut columns = vec![COL_TIMESTAMP, COL_LOCATION];
    columns.extend(ClimateColumn::ALL.iter().map(|c| c.key()));
    columns.extend(Disease::ALL.iter().map(|d| d.key()));
    columns
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// A raw record after imputation and outlier clipping. No field is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub timestamp: String,
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub cases: DiseaseMap<f64>,
}

impl CleanedRecord {
    pub fn climate(&self, column: ClimateColumn) -> f64 {
        match column {
            ClimateColumn::Temperature => self.temperature,
            ClimateColumn::Humidity => self.humidity,
            ClimateColumn::Precipitation => self.precipitation,
        }
    }
}

/// Calendar fields derived from the record date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub year: i32,
    pub month: u32,
    pub day_of_year: u32,
    /// ISO 8601 week number.
    pub epi_week: u32,
    pub month_sin: f64,
    pub month_cos: f64,
}

/// A cleaned record extended with calendar, cyclical, lag and rolling features.
///
/// `lags[d][k]` is the case count of disease `d` `LAG_DAYS[k]` rows earlier
/// in the same location's date-sorted series, or `None` when that history
/// does not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub base: CleanedRecord,
    pub date: NaiveDate,
    pub calendar: CalendarFeatures,
    pub lags: DiseaseMap<[Option<f64>; 4]>,
    pub rolling_mean: DiseaseMap<f64>,
}

impl FeatureRecord {
    /// The unscaled value of a normalizer column.
    pub fn numeric(&self, column: NumericColumn) -> f64 {
        match column {
            NumericColumn::Temperature => self.base.temperature,
            NumericColumn::Humidity => self.base.humidity,
            NumericColumn::Precipitation => self.base.precipitation,
            NumericColumn::DayOfYear => f64::from(self.calendar.day_of_year),
        }
    }

    /// True when every lag feature has history behind it.
    pub fn has_complete_history(&self) -> bool {
        self.lags.iter().all(|(_, lags)| lags.iter().all(Option::is_some))
    }
}

/// Normalized values of the four rescaled columns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaledValues {
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub day_of_year: f64,
}

impl ScaledValues {
    pub fn get(&self, column: NumericColumn) -> f64 {
        match column {
            NumericColumn::Temperature => self.temperature,
            NumericColumn::Humidity => self.humidity,
            NumericColumn::Precipitation => self.precipitation,
            NumericColumn::DayOfYear => self.day_of_year,
        }
    }

    pub fn set(&mut self, column: NumericColumn, value: f64) {
        match column {
            NumericColumn::Temperature => self.temperature = value,
            NumericColumn::Humidity => self.humidity = value,
            NumericColumn::Precipitation => self.precipitation = value,
            NumericColumn::DayOfYear => self.day_of_year = value,
        }
    }
}

/// A feature record plus its rescaled numeric columns.
///
/// The unscaled values stay available on `features` so the dashboard and
/// the report text keep their physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub features: FeatureRecord,
    pub scaled: ScaledValues,
}

impl NormalizedRecord {
    pub fn date(&self) -> NaiveDate {
        self.features.date
    }

    pub fn location(&self) -> &str {
        &self.features.base.location
    }
}

// ---------------------------------------------------------------------------
// Model output and alerts
// ---------------------------------------------------------------------------

/// Per-disease risk probabilities for one record, as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub timestamp: NaiveDate,
    pub location: String,
    pub probabilities: DiseaseMap<f64>,
}

/// A threshold breach for the dominant disease of one risk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: NaiveDate,
    pub location: String,
    pub disease: Disease,
    pub risk_level: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural input errors. Both are fatal for a pipeline run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A required identity column is absent from the input table.
    #[error("missing required column: {0}")]
    Schema(String),
    /// A timestamp could not be converted to a date.
    #[error("row {row}: timestamp '{value}' is not a valid date")]
    Parse { row: usize, value: String },
}

/// Failures of the external risk model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model could not be loaded or reached at all.
    #[error("model unavailable: {0}")]
    Unavailable(String),
    /// The model was reachable but a single prediction failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Failures delivering an alert batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport credentials are not configured")]
    MissingCredentials,
    #[error("invalid mail address '{0}'")]
    InvalidAddress(String),
    #[error("failed to build alert message: {0}")]
    Message(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disease_priority_order_is_dengue_zika_chikungunya() {
        assert_eq!(
            Disease::ALL,
            [Disease::Dengue, Disease::Zika, Disease::Chikungunya]
        );
        assert!(Disease::Dengue < Disease::Zika);
        assert!(Disease::Zika < Disease::Chikungunya);
    }

    #[test]
    fn test_disease_keys_round_trip_case_insensitively() {
        for disease in Disease::ALL {
            assert_eq!(Disease::from_key(disease.key()), Some(disease));
            assert_eq!(Disease::from_key(disease.display_name()), Some(disease));
        }
        assert_eq!(Disease::from_key("malaria"), None);
    }

    #[test]
    fn test_disease_map_indexing_and_map() {
        let mut counts = DiseaseMap::from_fn(|d| d as usize);
        counts[Disease::Zika] = 10;
        assert_eq!(counts[Disease::Dengue], 0);
        assert_eq!(counts[Disease::Zika], 10);
        assert_eq!(counts[Disease::Chikungunya], 2);

        let doubled = counts.map(|_, v| v * 2);
        assert_eq!(doubled.zika, 20);

        let order: Vec<Disease> = counts.iter().map(|(d, _)| d).collect();
        assert_eq!(order, Disease::ALL.to_vec());
    }

    #[test]
    fn test_standard_columns_cover_identity_climate_and_cases() {
        let columns = standard_columns();
        assert_eq!(columns.len(), 8);
        assert_eq!(&columns[..2], &IDENTITY_COLUMNS);
        for disease in Disease::ALL {
            assert!(columns.contains(&disease.key()));
        }
    }

    #[test]
    fn test_schema_error_message_names_the_column() {
        let err = PipelineError::Schema(COL_LOCATION.to_string());
        assert_eq!(err.to_string(), "missing required column: location");
    }

    #[test]
    fn test_disease_serializes_lowercase() {
        let json = serde_json::to_string(&Disease::Chikungunya).unwrap();
        assert_eq!(json, "\"chikungunya\"");
    }
}
