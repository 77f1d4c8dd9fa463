//! Risk threshold checking.
//!
//! Each risk record is reduced to its dominant disease, and an alert is
//! raised when that disease's probability reaches the threshold. There is no
//! deduplication or cooldown: every batch is evaluated on its own.

use crate::model::{AlertRecord, Disease, DiseaseMap, RiskRecord};

/// Probability at or above which an alert is raised.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Returns the disease with the highest probability and that probability.
///
/// Ties go to the earlier disease in priority order (dengue, zika,
/// chikungunya). A NaN probability never wins; if every probability is NaN
/// the result is dengue with NaN, which no threshold comparison accepts.
pub fn dominant_disease(probabilities: &DiseaseMap<f64>) -> (Disease, f64) {
    let mut best = (Disease::Dengue, probabilities.dengue);
    for (disease, &p) in probabilities.iter().skip(1) {
        // Strictly greater keeps the earlier disease on ties.
        if p > best.1 || (best.1.is_nan() && !p.is_nan()) {
            best = (disease, p);
        }
    }
    best
}

/// Builds the alert for one risk record, or `None` below the threshold.
pub fn evaluate(risk: &RiskRecord, threshold: f64) -> Option<AlertRecord> {
    let (disease, risk_level) = dominant_disease(&risk.probabilities);
    (risk_level >= threshold).then(|| AlertRecord {
        timestamp: risk.timestamp,
        location: risk.location.clone(),
        disease,
        risk_level,
    })
}

/// Evaluates every risk record, keeping input order.
pub fn generate_alerts(risks: &[RiskRecord], threshold: f64) -> Vec<AlertRecord> {
    risks.iter().filter_map(|r| evaluate(r, threshold)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn risk(date: (i32, u32, u32), location: &str, d: f64, z: f64, c: f64) -> RiskRecord {
        RiskRecord {
            timestamp: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            location: location.to_string(),
            probabilities: DiseaseMap {
                dengue: d,
                zika: z,
                chikungunya: c,
            },
        }
    }

    #[test]
    fn test_dengue_above_threshold_raises_alert() {
        let alerts = generate_alerts(&[risk((2024, 3, 1), "Diamantina", 0.72, 0.10, 0.18)], 0.7);
        assert_eq!(
            alerts,
            vec![AlertRecord {
                timestamp: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                location: "Diamantina".to_string(),
                disease: Disease::Dengue,
                risk_level: 0.72,
            }]
        );
    }

    #[test]
    fn test_tie_below_threshold_is_suppressed() {
        let alerts = generate_alerts(&[risk((2024, 3, 1), "Diamantina", 0.5, 0.5, 0.0)], 0.7);
        assert!(alerts.is_empty(), "0.5 < 0.7 must not alert, tie or not");
    }

    #[test]
    fn test_tie_above_threshold_resolves_to_dengue() {
        let alerts = generate_alerts(&[risk((2024, 3, 1), "Teófilo Otoni", 0.6, 0.6, 0.1)], 0.55);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].disease, Disease::Dengue);
        assert_eq!(alerts[0].risk_level, 0.6);
    }

    #[test]
    fn test_zika_chikungunya_tie_resolves_to_zika() {
        let (disease, p) = dominant_disease(&DiseaseMap {
            dengue: 0.1,
            zika: 0.45,
            chikungunya: 0.45,
        });
        assert_eq!(disease, Disease::Zika);
        assert_eq!(p, 0.45);
    }

    #[test]
    fn test_risk_exactly_at_threshold_alerts() {
        let alerts = generate_alerts(&[risk((2024, 1, 5), "Diamantina", 0.1, 0.1, 0.7)], 0.7);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].disease, Disease::Chikungunya);
    }

    #[test]
    fn test_nan_probability_never_dominates() {
        let (disease, p) = dominant_disease(&DiseaseMap {
            dengue: f64::NAN,
            zika: 0.2,
            chikungunya: 0.3,
        });
        assert_eq!(disease, Disease::Chikungunya);
        assert_eq!(p, 0.3);

        let all_nan = risk((2024, 1, 5), "Diamantina", f64::NAN, f64::NAN, f64::NAN);
        assert!(evaluate(&all_nan, 0.0).is_none());
    }

    #[test]
    fn test_alert_order_follows_input_order() {
        let risks = vec![
            risk((2024, 3, 2), "Teófilo Otoni", 0.9, 0.0, 0.1),
            risk((2024, 3, 1), "Diamantina", 0.1, 0.1, 0.1),
            risk((2024, 3, 1), "Diamantina", 0.0, 0.8, 0.2),
        ];
        let alerts = generate_alerts(&risks, 0.7);
        let order: Vec<(&str, Disease)> = alerts.iter().map(|a| (a.location.as_str(), a.disease)).collect();
        assert_eq!(order, vec![("Teófilo Otoni", Disease::Dengue), ("Diamantina", Disease::Zika)]);
    }

    #[test]
    fn test_emitted_alert_iff_max_reaches_threshold() {
        let grid = [0.0, 0.25, 0.5, 0.69, 0.7, 0.71, 1.0];
        for &d in &grid {
            for &z in &grid {
                let r = risk((2024, 2, 1), "Diamantina", d, z, 0.3);
                let max = d.max(z).max(0.3);
                assert_eq!(evaluate(&r, 0.7).is_some(), max >= 0.7, "d={} z={}", d, z);
            }
        }
    }
}
