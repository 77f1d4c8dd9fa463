/// Service configuration.
///
/// Pipeline settings come from a TOML file; secrets (mail credentials, the
/// model API token) come from the environment, with `.env` honoured. Both are
/// read once at startup into plain structs that are handed to the
/// components that need them.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alert::thresholds::DEFAULT_THRESHOLD;
use crate::municipalities;

pub const DEFAULT_TRANSPORT_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_TRANSPORT_PORT: u16 = 587;
pub const DEFAULT_MODEL_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/mmcleige/arbovirus_bert_base_LR.5e-5_N.5";

// Environment variable names
pub const ENV_TRANSPORT_HOST: &str = "TRANSPORT_HOST";
pub const ENV_TRANSPORT_PORT: &str = "TRANSPORT_PORT";
pub const ENV_TRANSPORT_USER: &str = "TRANSPORT_USER";
pub const ENV_TRANSPORT_PASSWORD: &str = "TRANSPORT_PASSWORD";
pub const ENV_ALERT_RECIPIENT: &str = "ALERT_RECIPIENT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// File configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Minimum dominant-disease probability that raises an alert.
    pub threshold: f64,
    /// How many recent alerts the dashboard snapshot lists per location.
    pub recent_limit: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            recent_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Text-classification inference endpoint.
    pub endpoint: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            token_env: "HF_API_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
    pub console_timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Municipalities pulled from the database and used for synthetic data.
    pub municipalities: Vec<String>,
    /// Length of the synthetic fallback series, in days.
    pub synthetic_days: usize,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            municipalities: municipalities::all_names()
                .into_iter()
                .map(String::from)
                .collect(),
            synthetic_days: 365,
        }
    }
}

/// Everything read from the TOML config file. Every section is optional.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub alerts: AlertSettings,
    pub model: ModelConfig,
    pub logging: LoggingSettings,
    pub data: DataSettings,
}

impl AppConfig {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.alerts.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "alerts.threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.data.municipalities.is_empty() {
            return Err(ConfigError::Invalid(
                "data.municipalities must list at least one municipality".to_string(),
            ));
        }
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "model.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Environment configuration
// ---------------------------------------------------------------------------

/// Mail transport settings for the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub recipient: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TRANSPORT_HOST.to_string(),
            port: DEFAULT_TRANSPORT_PORT,
            user: None,
            password: None,
            recipient: None,
        }
    }
}

impl TransportConfig {
    /// Reads the transport settings from the process environment,
    /// loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the transport settings through an arbitrary key lookup.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get(ENV_TRANSPORT_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a port number, got '{}'", ENV_TRANSPORT_PORT, raw))
            })?,
            None => DEFAULT_TRANSPORT_PORT,
        };

        Ok(Self {
            host: get(ENV_TRANSPORT_HOST).unwrap_or_else(|| DEFAULT_TRANSPORT_HOST.to_string()),
            port,
            user: get(ENV_TRANSPORT_USER),
            password: get(ENV_TRANSPORT_PASSWORD),
            recipient: get(ENV_ALERT_RECIPIENT),
        })
    }

    /// User and password, if both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// Where alerts go: the configured recipient, else the sending user.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref().or(self.user.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.alerts.threshold, 0.7);
        assert_eq!(config.data.municipalities.len(), 2);
    }

    #[test]
    fn test_partial_toml_overrides_only_given_keys() {
        let config = AppConfig::from_toml_str(
            r#"
            [alerts]
            threshold = 0.55

            [logging]
            level = "debug"
            file = "arbowatch.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.alerts.threshold, 0.55);
        assert_eq!(config.alerts.recent_limit, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("arbowatch.log")));
        assert!(config.logging.console_timestamps);
    }

    #[test]
    fn test_threshold_outside_unit_interval_rejected() {
        let err = AppConfig::from_toml_str("[alerts]\nthreshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {:?}", err);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("[alerts\nthreshold = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbowatch.toml");
        std::fs::write(&path, "[data]\nmunicipalities = [\"Diamantina\"]\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.data.municipalities, vec!["Diamantina".to_string()]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = AppConfig::load(Path::new("/nonexistent/arbowatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_transport_defaults_without_environment() {
        let config = TransportConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, TransportConfig::default());
        assert!(config.credentials().is_none());
        assert!(config.recipient().is_none());
    }

    #[test]
    fn test_transport_reads_all_options() {
        let config = TransportConfig::from_lookup(lookup_from(&[
            ("TRANSPORT_HOST", "smtp.example.org"),
            ("TRANSPORT_PORT", "2525"),
            ("TRANSPORT_USER", "alerts@example.org"),
            ("TRANSPORT_PASSWORD", "secret"),
            ("ALERT_RECIPIENT", "vigilancia@example.org"),
        ]))
        .unwrap();
        assert_eq!(config.host, "smtp.example.org");
        assert_eq!(config.port, 2525);
        assert_eq!(config.credentials(), Some(("alerts@example.org", "secret")));
        assert_eq!(config.recipient(), Some("vigilancia@example.org"));
    }

    #[test]
    fn test_recipient_defaults_to_user() {
        let config = TransportConfig::from_lookup(lookup_from(&[
            ("TRANSPORT_USER", "alerts@example.org"),
            ("ALERT_RECIPIENT", "   "),
        ]))
        .unwrap();
        assert_eq!(config.recipient(), Some("alerts@example.org"));
        assert!(config.credentials().is_none(), "password is missing");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = TransportConfig::from_lookup(lookup_from(&[("TRANSPORT_PORT", "smtp")])).unwrap_err();
        assert!(err.to_string().contains("TRANSPORT_PORT"));
    }
}
