/// Alert notification.
///
/// A `Notifier` receives each non-empty alert batch once. Delivery problems
/// stop at this boundary: they are logged with a failure classification and
/// the pipeline carries on as if the batch had been sent.
///
/// The email notifier splits formatting from delivery. `format_report`
/// turns a batch into an `OutgoingMail`; a `MailTransport` delivers it. The
/// real transport is SMTP with STARTTLS via lettre; tests substitute a
/// recording transport.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::recommendations::{RiskSeverity, recommendations};
use crate::config::{ConfigError, TransportConfig};
use crate::logging::{self, Stage};
use crate::model::{AlertRecord, Disease, TransportError};

// ---------------------------------------------------------------------------
// Notifier seam
// ---------------------------------------------------------------------------

/// Receives alert batches. Never fails from the caller's point of view.
pub trait Notifier {
    fn notify(&self, alerts: &[AlertRecord]);
}

/// Writes each alert to the log instead of sending anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alerts: &[AlertRecord]) {
        for alert in alerts {
            logging::warn(
                Stage::Alert,
                Some(&alert.location),
                &format!(
                    "{} risk {} on {} [{}]",
                    alert.disease,
                    format_percent(alert.risk_level),
                    format_date(alert),
                    RiskSeverity::from_risk(alert.risk_level)
                ),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Report formatting
// ---------------------------------------------------------------------------

/// A fully formatted alert report, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

fn format_date(alert: &AlertRecord) -> String {
    alert.timestamp.format("%d/%m/%Y").to_string()
}

fn format_percent(risk_level: f64) -> String {
    format!("{:.1}%", risk_level * 100.0)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Diseases present in the batch, in priority order, each with its highest risk.
fn diseases_in_batch(alerts: &[AlertRecord]) -> Vec<(Disease, f64)> {
    Disease::ALL
        .into_iter()
        .filter_map(|disease| {
            alerts
                .iter()
                .filter(|a| a.disease == disease)
                .map(|a| a.risk_level)
                .fold(None, |max: Option<f64>, r| Some(max.map_or(r, |m| m.max(r))))
                .map(|max| (disease, max))
        })
        .collect()
}

/// Formats an alert batch as an HTML and plain-text report.
pub fn format_report(from: &str, to: &str, alerts: &[AlertRecord]) -> OutgoingMail {
    let subject = format!("ALERT: {} new arbovirus alerts", alerts.len());
    let actions = diseases_in_batch(alerts);

    let mut text = String::from("Arbovirus risk alerts\n\n");
    text.push_str("Date       | Location | Disease | Risk\n");
    for alert in alerts {
        text.push_str(&format!(
            "{} | {} | {} | {}\n",
            format_date(alert),
            alert.location,
            alert.disease,
            format_percent(alert.risk_level)
        ));
    }
    text.push_str("\nRecommended actions:\n");
    for (disease, max_risk) in &actions {
        text.push_str(&format!("{}:\n", disease));
        for action in recommendations(*disease, *max_risk) {
            text.push_str(&format!("  - {}\n", action));
        }
    }

    let mut html = String::from(
        "<html><body>\n<h2>Arbovirus risk alerts</h2>\n<table border=\"1\">\n\
         <tr><th>Date</th><th>Location</th><th>Disease</th><th>Risk</th></tr>\n",
    );
    for alert in alerts {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            format_date(alert),
            escape_html(&alert.location),
            alert.disease,
            format_percent(alert.risk_level)
        ));
    }
    html.push_str("</table>\n<h3>Recommended actions</h3>\n");
    for (disease, max_risk) in &actions {
        html.push_str(&format!("<p><b>{}</b></p>\n<ul>\n", disease));
        for action in recommendations(*disease, *max_risk) {
            html.push_str(&format!("<li>{}</li>\n", action));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</body></html>\n");

    OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject,
        html_body: html,
        text_body: text,
    }
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// Delivers a formatted report.
pub trait MailTransport {
    fn deliver(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// Blocking SMTP delivery with STARTTLS and password authentication.
pub struct SmtpMailer {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|_| TransportError::InvalidAddress(address.to_string()))
}

impl MailTransport for SmtpMailer {
    fn deliver(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = Message::builder()
            .from(parse_mailbox(&mail.from)?)
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                mail.text_body.clone(),
                mail.html_body.clone(),
            ))
            .map_err(|e| TransportError::Message(e.to_string()))?;

        let mailer = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| TransportError::Delivery(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(self.user.clone(), self.password.clone()))
            .build();

        mailer
            .send(&message)
            .map(|_| ())
            .map_err(|e| TransportError::Delivery(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Email notifier
// ---------------------------------------------------------------------------

/// Emails each alert batch to the configured recipient.
pub struct EmailNotifier {
    config: TransportConfig,
    transport: Option<Box<dyn MailTransport>>,
}

impl EmailNotifier {
    /// Delivers over SMTP using the host, port and credentials in `config`.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Reads the transport settings from the environment (`.env` honoured).
    pub fn from_env() -> Self {
        Self::from_settings(TransportConfig::from_env())
    }

    /// Builds the notifier from a key lookup. Invalid settings are logged
    /// and leave the notifier unconfigured, so it sends nothing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_settings(TransportConfig::from_lookup(lookup))
    }

    fn from_settings(settings: Result<TransportConfig, ConfigError>) -> Self {
        match settings {
            Ok(config) => Self::new(config),
            Err(err) => {
                logging::error(
                    Stage::Notify,
                    None,
                    &format!("transport configuration rejected, alerts will not be sent: {}", err),
                );
                Self::new(TransportConfig::default())
            }
        }
    }

    /// Delivers through the given transport instead of SMTP.
    pub fn with_transport(config: TransportConfig, transport: Box<dyn MailTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
        }
    }

    /// Formats and delivers the batch, returning any delivery error.
    pub fn try_notify(&self, alerts: &[AlertRecord]) -> Result<(), TransportError> {
        let (user, password) = self
            .config
            .credentials()
            .ok_or(TransportError::MissingCredentials)?;
        let recipient = self.config.recipient().unwrap_or(user);
        let mail = format_report(user, recipient, alerts);

        match &self.transport {
            Some(transport) => transport.deliver(&mail),
            None => SmtpMailer::new(&self.config.host, self.config.port, user, password).deliver(&mail),
        }
    }
}

impl Notifier for EmailNotifier {
    fn notify(&self, alerts: &[AlertRecord]) {
        if alerts.is_empty() {
            return;
        }
        match self.try_notify(alerts) {
            Ok(()) => logging::info(
                Stage::Notify,
                self.config.recipient(),
                &format!("alert report sent: {} alerts", alerts.len()),
            ),
            Err(err) => logging::log_transport_failure(self.config.recipient(), &err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
