/// Risk model adapter.
///
/// The risk model is an external text classifier. Each normalized record is
/// rendered as a one-line situation report; the classifier returns a score
/// per label, which is mapped onto the three diseases. The model itself is
/// opaque: anything implementing `RiskModel` can stand in for it.
///
/// # Failure policy
/// - No model (e.g. the API token is missing): empty risk set, logged.
/// - One prediction fails: that record is skipped, logged, the rest continue.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::logging::{self, Stage};
use crate::model::{Disease, DiseaseMap, ModelError, NormalizedRecord, RiskRecord};

/// Per-disease probabilities for one record.
pub trait RiskModel {
    fn predict(&self, record: &NormalizedRecord) -> Result<DiseaseMap<f64>, ModelError>;
}

// ---------------------------------------------------------------------------
// Report text
// ---------------------------------------------------------------------------

/// The situation report the classifier was trained on.
///
/// Uses the unscaled cleaned values. The wording is Portuguese because that
/// is the language of the classifier's training reports.
pub fn report_text(record: &NormalizedRecord) -> String {
    let base = &record.features.base;
    format!(
        "Relatório de {} em {}: Temp: {:.1}°C, Umidade: {:.1}%, Precipitação: {:.1}mm. Casos: D{:.0} Z{:.0} C{:.0}",
        base.location,
        record.date().format("%Y-%m-%d"),
        base.temperature,
        base.humidity,
        base.precipitation,
        base.cases.dengue,
        base.cases.zika,
        base.cases.chikungunya,
    )
}

/// Numerically stable softmax. Empty in, empty out.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Text-classification endpoints answer either `[[{label, score}, ..]]`
/// or `[{label, score}, ..]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl InferenceResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            InferenceResponse::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
            InferenceResponse::Flat(scores) => scores,
        }
    }
}

/// Maps a classifier label to a disease: `LABEL_0..2` by index, else by name.
pub fn label_disease(label: &str) -> Option<Disease> {
    match label.trim() {
        "LABEL_0" => Some(Disease::Dengue),
        "LABEL_1" => Some(Disease::Zika),
        "LABEL_2" => Some(Disease::Chikungunya),
        other => Disease::from_key(other),
    }
}

const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Collects one score per disease; raw logits are passed through softmax.
pub fn probabilities_from_scores(scores: &[LabelScore]) -> Result<DiseaseMap<f64>, ModelError> {
    let mut found: DiseaseMap<Option<f64>> = DiseaseMap::default();
    for entry in scores {
        if let Some(disease) = label_disease(&entry.label) {
            found[disease] = Some(entry.score);
        }
    }

    let mut raw = [0.0; 3];
    for (i, disease) in Disease::ALL.into_iter().enumerate() {
        raw[i] = found[disease].ok_or_else(|| {
            ModelError::Inference(format!("response has no score for {}", disease.key()))
        })?;
    }

    // Scores outside [0, 1] can only be logits. In-range scores are taken as
    // probabilities; serialization noise past 1 is tolerated, a larger
    // excess is renormalized.
    let sum: f64 = raw.iter().sum();
    let probs = if !raw.iter().all(|p| (0.0..=1.0).contains(p)) {
        softmax(&raw)
    } else if sum > 1.0 + PROBABILITY_SUM_TOLERANCE {
        raw.iter().map(|p| p / sum).collect()
    } else {
        raw.to_vec()
    };

    Ok(DiseaseMap {
        dengue: probs[0],
        zika: probs[1],
        chikungunya: probs[2],
    })
}

/// Parses a raw inference response body.
pub fn parse_response(body: &str) -> Result<DiseaseMap<f64>, ModelError> {
    let response: InferenceResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Inference(format!("unreadable response: {}", e)))?;
    probabilities_from_scores(&response.into_scores())
}

// ---------------------------------------------------------------------------
// HTTP model
// ---------------------------------------------------------------------------

/// Text classifier served over HTTP with bearer-token authentication.
pub struct HttpRiskModel {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl HttpRiskModel {
    /// Builds the client, reading the API token from `config.token_env`.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        dotenv::dotenv().ok();
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ModelError::Unavailable(format!("API token {} is not set", config.token_env)))?;
        Self::with_token(config, token)
    }

    pub fn with_token(config: &ModelConfig, token: String) -> Result<Self, ModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token,
        })
    }
}

impl RiskModel for HttpRiskModel {
    fn predict(&self, record: &NormalizedRecord) -> Result<DiseaseMap<f64>, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "inputs": report_text(record) }))
            .send()
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ModelError::Inference(format!("endpoint returned {}", response.status())));
        }

        let body = response.text().map_err(|e| ModelError::Inference(e.to_string()))?;
        parse_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Batch prediction
// ---------------------------------------------------------------------------

/// Predicts every record. Records whose prediction fails are left out.
pub fn predict_batch(model: Option<&dyn RiskModel>, records: &[NormalizedRecord]) -> Vec<RiskRecord> {
    let Some(model) = model else {
        logging::warn(Stage::Model, None, "no risk model available; risk set is empty");
        return Vec::new();
    };

    let mut risks = Vec::with_capacity(records.len());
    for record in records {
        match model.predict(record) {
            Ok(probabilities) => risks.push(RiskRecord {
                timestamp: record.date(),
                location: record.location().to_string(),
                probabilities,
            }),
            Err(err) => logging::log_model_failure(Some(record.location()), "prediction", &err),
        }
    }

    logging::log_stage_summary(Stage::Model, records.len(), risks.len());
    risks
}
