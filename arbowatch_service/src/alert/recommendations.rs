/// Severity tiers and recommended public-health actions for an alert.
///
/// Shared by the email report and the dashboard alert cards.

use serde::Serialize;
use std::fmt;

use crate::model::Disease;

/// Severity tier of a risk level. Tiers are open below: 0.8 is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Info,
    Warning,
    Critical,
}

impl RiskSeverity {
    pub const CRITICAL_ABOVE: f64 = 0.8;
    pub const WARNING_ABOVE: f64 = 0.6;

    pub fn from_risk(risk_level: f64) -> Self {
        if risk_level > Self::CRITICAL_ABOVE {
            RiskSeverity::Critical
        } else if risk_level > Self::WARNING_ABOVE {
            RiskSeverity::Warning
        } else {
            RiskSeverity::Info
        }
    }
}

impl fmt::Display for RiskSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskSeverity::Info => write!(f, "INFO"),
            RiskSeverity::Warning => write!(f, "WARNING"),
            RiskSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

fn disease_actions(disease: Disease) -> [&'static str; 3] {
    match disease {
        Disease::Dengue => [
            "Intensify vector control in high-risk areas",
            "Run awareness campaigns on eliminating breeding sites",
            "Strengthen surveillance for suspected cases",
        ],
        Disease::Zika => [
            "Monitor pregnant women in the affected area",
            "Intensify Aedes aegypti control",
            "Strengthen laboratory surveillance",
        ],
        Disease::Chikungunya => [
            "Prepare health services for a rise in joint-pain consultations",
            "Intensify vector control",
            "Monitor chronic cases",
        ],
    }
}

/// Recommended actions for an alert, most specific first.
///
/// Every disease has three standing actions; warning and critical tiers add
/// escalation steps after them.
pub fn recommendations(disease: Disease, risk_level: f64) -> Vec<&'static str> {
    let mut actions = disease_actions(disease).to_vec();
    match RiskSeverity::from_risk(risk_level) {
        RiskSeverity::Critical => {
            actions.push("Consider declaring an epidemiological emergency");
            actions.push("Mobilize additional healthcare teams");
        }
        RiskSeverity::Warning => {
            actions.push("Intensify preventive measures");
            actions.push("Alert local health units");
        }
        RiskSeverity::Info => {}
    }
    actions
}
