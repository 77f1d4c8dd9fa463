/// Daily aggregation of climate readings and case reports.
///
/// Climate stations report several times a day while case notifications
/// arrive per day. Both are collapsed to one row per (date, municipality):
/// temperature and humidity are averaged, precipitation is summed, and case
/// reports are joined onto the climate days. Days with case reports but no
/// climate reading are dropped, days with climate but no report get zero
/// cases.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

use crate::model::{Disease, DiseaseMap, RawRecord, RawTable};

/// A single climate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateReading {
    pub observed_at: NaiveDateTime,
    pub location: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Case notifications for one municipality on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    pub date: NaiveDate,
    pub location: String,
    pub cases: DiseaseMap<Option<f64>>,
}

#[derive(Debug, Default)]
struct DayAccumulator {
    temperature_sum: f64,
    temperature_count: usize,
    humidity_sum: f64,
    humidity_count: usize,
    precipitation_sum: f64,
}

impl DayAccumulator {
    fn add(&mut self, reading: &ClimateReading) {
        if let Some(t) = reading.temperature.filter(|v| v.is_finite()) {
            self.temperature_sum += t;
            self.temperature_count += 1;
        }
        if let Some(h) = reading.humidity.filter(|v| v.is_finite()) {
            self.humidity_sum += h;
            self.humidity_count += 1;
        }
        if let Some(p) = reading.precipitation.filter(|v| v.is_finite()) {
            self.precipitation_sum += p;
        }
    }

    fn mean(sum: f64, count: usize) -> Option<f64> {
        (count > 0).then(|| sum / count as f64)
    }
}

/// Builds the daily raw table, sorted by date then municipality.
pub fn aggregate_daily(readings: &[ClimateReading], reports: &[CaseReport]) -> RawTable {
    let mut days: BTreeMap<(NaiveDate, &str), DayAccumulator> = BTreeMap::new();
    for reading in readings {
        days.entry((reading.observed_at.date(), reading.location.as_str()))
            .or_default()
            .add(reading);
    }

    let mut cases: HashMap<(NaiveDate, &str), DiseaseMap<f64>> = HashMap::new();
    for report in reports {
        let totals = cases
            .entry((report.date, report.location.as_str()))
            .or_default();
        for disease in Disease::ALL {
            totals[disease] += report.cases[disease].filter(|v| v.is_finite()).unwrap_or(0.0);
        }
    }

    let unmatched = cases.keys().filter(|key| !days.contains_key(*key)).count();
    if unmatched > 0 {
        tracing::debug!(unmatched, "case reports without a climate day were dropped");
    }

    let records = days
        .into_iter()
        .map(|((date, location), acc)| {
            let day_cases = cases.get(&(date, location)).copied().unwrap_or_default();
            RawRecord {
                timestamp: date.format("%Y-%m-%d").to_string(),
                location: location.to_string(),
                temperature: DayAccumulator::mean(acc.temperature_sum, acc.temperature_count),
                humidity: DayAccumulator::mean(acc.humidity_sum, acc.humidity_count),
                precipitation: Some(acc.precipitation_sum),
                cases: day_cases.map(|_, v| Some(*v)),
            }
        })
        .collect();

    RawTable::with_standard_columns(records)
}
