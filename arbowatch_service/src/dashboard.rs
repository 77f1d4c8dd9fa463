/// Dashboard data layer.
///
/// Reads the normalized records, risk records and alerts of a run and
/// produces a filtered, JSON-serializable snapshot for the dashboard front
/// end. Nothing here mutates its inputs. Climate and case values are the
/// unscaled cleaned values, in physical units.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::alert::recommendations::{RiskSeverity, recommendations};
use crate::analysis::stats;
use crate::logging::{self, Stage};
use crate::model::{AlertRecord, ClimateColumn, Disease, DiseaseMap, NormalizedRecord, RiskRecord};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Location and inclusive date range. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardFilter {
    pub location: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DashboardFilter {
    pub fn matches_location(&self, location: &str) -> bool {
        self.location.as_deref().is_none_or(|l| l == location)
    }

    pub fn matches_date(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    pub fn matches(&self, location: &str, date: NaiveDate) -> bool {
        self.matches_location(location) && self.matches_date(date)
    }
}

// ---------------------------------------------------------------------------
// Snapshot components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub cases: DiseaseMap<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPoint {
    pub date: NaiveDate,
    pub location: String,
    pub probabilities: DiseaseMap<f64>,
}

/// Case totals for one (year, ISO week) cell of the heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyCases {
    pub year: i32,
    pub epi_week: u32,
    pub cases: DiseaseMap<f64>,
}

/// Pearson correlations between climate and case columns.
///
/// `values[i][j]` is `None` when the correlation is undefined (fewer than
/// two rows, or a constant column).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<&'static str>,
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCard {
    pub date: NaiveDate,
    pub location: String,
    pub disease: Disease,
    pub risk_level: f64,
    pub severity: RiskSeverity,
    pub recommendations: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub filter: DashboardFilter,
    pub case_totals: DiseaseMap<f64>,
    pub series: Vec<SeriesPoint>,
    pub risk_series: Vec<RiskPoint>,
    pub weekly_cases: Vec<WeeklyCases>,
    pub correlation: CorrelationMatrix,
    pub recent_alerts: Vec<AlertCard>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn series_point(record: &NormalizedRecord) -> SeriesPoint {
    let base = &record.features.base;
    SeriesPoint {
        date: record.date(),
        location: base.location.clone(),
        temperature: base.temperature,
        humidity: base.humidity,
        precipitation: base.precipitation,
        cases: base.cases,
    }
}

/// Weekly case sums, ordered by year then week.
pub fn weekly_case_totals(records: &[&NormalizedRecord]) -> Vec<WeeklyCases> {
    let mut weeks: BTreeMap<(i32, u32), DiseaseMap<f64>> = BTreeMap::new();
    for record in records {
        let calendar = record.features.calendar;
        let totals = weeks.entry((calendar.year, calendar.epi_week)).or_default();
        for disease in Disease::ALL {
            totals[disease] += record.features.base.cases[disease];
        }
    }
    weeks
        .into_iter()
        .map(|((year, epi_week), cases)| WeeklyCases { year, epi_week, cases })
        .collect()
}

/// Correlation matrix over temperature, humidity, precipitation and the
/// three case columns.
pub fn correlation_matrix(records: &[&NormalizedRecord]) -> CorrelationMatrix {
    let mut columns: Vec<&'static str> = ClimateColumn::ALL.iter().map(|c| c.key()).collect();
    columns.extend(Disease::ALL.iter().map(|d| d.key()));

    let mut data: Vec<Vec<f64>> = ClimateColumn::ALL
        .iter()
        .map(|&c| records.iter().map(|r| r.features.base.climate(c)).collect())
        .collect();
    data.extend(
        Disease::ALL
            .iter()
            .map(|&d| records.iter().map(|r| r.features.base.cases[d]).collect()),
    );

    let values = data
        .iter()
        .map(|xs| data.iter().map(|ys| stats::pearson(xs, ys)).collect())
        .collect();

    CorrelationMatrix { columns, values }
}

/// The newest `limit` alerts per location matching the location filter,
/// newest first. Alerts on the same date keep their input order.
pub fn recent_alert_cards(alerts: &[AlertRecord], filter: &DashboardFilter, limit: usize) -> Vec<AlertCard> {
    let mut matching: Vec<&AlertRecord> = alerts
        .iter()
        .filter(|a| filter.matches_location(&a.location))
        .collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut per_location: HashMap<&str, usize> = HashMap::new();
    matching
        .into_iter()
        .filter(|a| {
            let count = per_location.entry(a.location.as_str()).or_insert(0);
            *count += 1;
            *count <= limit
        })
        .map(|a| AlertCard {
            date: a.timestamp,
            location: a.location.clone(),
            disease: a.disease,
            risk_level: a.risk_level,
            severity: RiskSeverity::from_risk(a.risk_level),
            recommendations: recommendations(a.disease, a.risk_level),
        })
        .collect()
}

/// Builds the dashboard snapshot for one filter.
pub fn build_snapshot(
    records: &[NormalizedRecord],
    risks: &[RiskRecord],
    alerts: &[AlertRecord],
    filter: &DashboardFilter,
    recent_limit: usize,
) -> DashboardSnapshot {
    let selected: Vec<&NormalizedRecord> = records
        .iter()
        .filter(|r| filter.matches(r.location(), r.date()))
        .collect();

    let mut case_totals = DiseaseMap::<f64>::default();
    for record in &selected {
        for disease in Disease::ALL {
            case_totals[disease] += record.features.base.cases[disease];
        }
    }

    let risk_series = risks
        .iter()
        .filter(|r| filter.matches(&r.location, r.timestamp))
        .map(|r| RiskPoint {
            date: r.timestamp,
            location: r.location.clone(),
            probabilities: r.probabilities,
        })
        .collect();

    let snapshot = DashboardSnapshot {
        filter: filter.clone(),
        case_totals,
        series: selected.iter().map(|r| series_point(r)).collect(),
        risk_series,
        weekly_cases: weekly_case_totals(&selected),
        correlation: correlation_matrix(&selected),
        recent_alerts: recent_alert_cards(alerts, filter, recent_limit),
    };

    logging::debug(
        Stage::Dashboard,
        filter.location.as_deref(),
        &format!(
            "snapshot built: {} records, {} risk points, {} alert cards",
            snapshot.series.len(),
            snapshot.risk_series.len(),
            snapshot.recent_alerts.len()
        ),
    );
    snapshot
}
