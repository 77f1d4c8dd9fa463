/// Structured logging for the arbovirus early-warning service
///
/// Every event carries the pipeline stage that emitted it and, when known,
/// the municipality it concerns. Output goes to the console and optionally
/// to a plain-text log file for scheduled batch runs.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt as tfmt};

use crate::model::{ModelError, TransportError};

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Preprocess,
    Model,
    Alert,
    Notify,
    Dashboard,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Preprocess => write!(f, "PREP"),
            Stage::Model => write!(f, "MODEL"),
            Stage::Alert => write!(f, "ALERT"),
            Stage::Notify => write!(f, "NOTIFY"),
            Stage::Dashboard => write!(f, "DASH"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. credentials deliberately left unset
    Expected,
    /// Unexpected failure - indicates a configuration bug or service outage
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

/// Installs the global tracing subscriber.
///
/// `level` is an `EnvFilter` directive ("info", "arbowatch_service=debug");
/// `RUST_LOG` takes precedence when set. When `log_file` is given, events
/// are also appended to it without ANSI colors. Calling this twice is
/// harmless: the second call leaves the first subscriber in place.
pub fn init_logging(
    level: &str,
    log_file: Option<&Path>,
    console_timestamps: bool,
) -> std::io::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let console = if console_timestamps {
        tfmt::layer().with_target(false).boxed()
    } else {
        tfmt::layer().with_target(false).without_time().boxed()
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
        vec![console.with_filter(filter()).boxed()];

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let file_layer = tfmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(filter())
            .boxed();
        layers.push(file_layer);
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(stage: Stage, location: Option<&str>, message: &str) {
    tracing::info!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(stage: Stage, location: Option<&str>, message: &str) {
    tracing::warn!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(stage: Stage, location: Option<&str>, message: &str) {
    tracing::error!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(stage: Stage, location: Option<&str>, message: &str) {
    tracing::debug!(stage = %stage, location = location.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a notifier delivery failure
pub fn classify_transport_failure(err: &TransportError) -> FailureType {
    match err {
        // Running without mail credentials is a supported configuration.
        TransportError::MissingCredentials => FailureType::Expected,
        // Bad addresses or message bodies are configuration or code bugs.
        TransportError::InvalidAddress(_) | TransportError::Message(_) => FailureType::Unexpected,
        TransportError::Delivery(msg) => {
            let msg = msg.to_lowercase();
            if msg.contains("timed out") || msg.contains("connection") || msg.contains("authentication") {
                FailureType::Unexpected
            } else {
                FailureType::Unknown
            }
        }
    }
}

/// Classify a risk model failure
pub fn classify_model_failure(err: &ModelError) -> FailureType {
    match err {
        ModelError::Unavailable(msg) if msg.contains("token") => FailureType::Expected,
        ModelError::Unavailable(_) => FailureType::Unexpected,
        ModelError::Inference(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a notifier failure with automatic classification
pub fn log_transport_failure(recipient: Option<&str>, err: &TransportError) {
    let failure_type = classify_transport_failure(err);
    let message = format!("alert delivery failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Stage::Notify, recipient, &message),
        FailureType::Unexpected => error(Stage::Notify, recipient, &message),
        FailureType::Unknown => warn(Stage::Notify, recipient, &message),
    }
}

/// Log a model failure with automatic classification
pub fn log_model_failure(location: Option<&str>, operation: &str, err: &ModelError) {
    let failure_type = classify_model_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Stage::Model, location, &message),
        FailureType::Unexpected => error(Stage::Model, location, &message),
        FailureType::Unknown => warn(Stage::Model, location, &message),
    }
}

// ---------------------------------------------------------------------------
// Stage Summary Logging
// ---------------------------------------------------------------------------

/// Log how many of a stage's input rows survived it
pub fn log_stage_summary(stage: Stage, total: usize, kept: usize) {
    let dropped = total.saturating_sub(kept);
    let message = format!("{} complete: {}/{} rows kept, {} dropped", stage, kept, total, dropped);

    if total > 0 && kept == 0 {
        warn(stage, None, &message);
    } else {
        info(stage, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tags_are_distinct() {
        let tags: Vec<String> = [
            Stage::Ingest,
            Stage::Preprocess,
            Stage::Model,
            Stage::Alert,
            Stage::Notify,
            Stage::Dashboard,
            Stage::System,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let unique: std::collections::HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn test_transport_failure_classification() {
        assert_eq!(
            classify_transport_failure(&TransportError::MissingCredentials),
            FailureType::Expected
        );
        assert_eq!(
            classify_transport_failure(&TransportError::InvalidAddress("nobody".into())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_transport_failure(&TransportError::Delivery("Connection refused".into())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_transport_failure(&TransportError::Delivery("451 try later".into())),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_model_failure_classification() {
        let missing_token = ModelError::Unavailable("API token HF_API_TOKEN is not set".into());
        assert_eq!(classify_model_failure(&missing_token), FailureType::Expected);
        let down = ModelError::Unavailable("endpoint returned 503".into());
        assert_eq!(classify_model_failure(&down), FailureType::Unexpected);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        assert!(init_logging("debug", None, false).is_ok());
        assert!(init_logging("info", None, true).is_ok());
    }

    #[test]
    fn test_init_logging_with_file_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbowatch.log");
        init_logging("info", Some(&path), true).unwrap();
        assert!(path.exists());
    }
}
