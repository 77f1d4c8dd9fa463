//! Alert generation and delivery.

pub mod notify;
pub mod recommendations;
pub mod thresholds;

pub use notify::{EmailNotifier, LogNotifier, MailTransport, Notifier, OutgoingMail, SmtpMailer, format_report};
pub use recommendations::{RiskSeverity, recommendations};
pub use thresholds::{DEFAULT_THRESHOLD, dominant_disease, evaluate, generate_alerts};

use crate::logging::{self, Stage};
use crate::model::{AlertRecord, RiskRecord};

/// Generates alerts and hands a non-empty batch to the notifier once.
///
/// The notifier swallows its own failures, so this never fails either.
pub fn generate_and_notify(risks: &[RiskRecord], threshold: f64, notifier: &dyn Notifier) -> Vec<AlertRecord> {
    let alerts = generate_alerts(risks, threshold);
    logging::info(
        Stage::Alert,
        None,
        &format!(
            "{} alerts from {} risk records at threshold {:.2}",
            alerts.len(),
            risks.len(),
            threshold
        ),
    );
    if !alerts.is_empty() {
        notifier.notify(&alerts);
    }
    alerts
}
