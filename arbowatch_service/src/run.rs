/// One end-to-end batch run.
///
/// preprocess → predict → alert → notify. Schema and parse errors abort the
/// run; a missing model or a failed delivery only shrinks what the run
/// produces.

use crate::alert::{Notifier, generate_and_notify};
use crate::logging::{self, Stage};
use crate::model::{AlertRecord, NormalizedRecord, PipelineError, RawTable, RiskRecord};
use crate::predict::{RiskModel, predict_batch};
use crate::preprocess::{CleaningDiagnostic, Preprocessor, ScaleParams};

/// Everything a run produced, for writing out or building the dashboard.
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<NormalizedRecord>,
    pub scale_params: Option<ScaleParams>,
    pub risks: Vec<RiskRecord>,
    pub alerts: Vec<AlertRecord>,
    pub diagnostics: Vec<CleaningDiagnostic>,
}

pub fn run_batch(
    raw: &RawTable,
    model: Option<&dyn RiskModel>,
    notifier: &dyn Notifier,
    threshold: f64,
) -> Result<RunOutcome, PipelineError> {
    let mut preprocessor = Preprocessor::new();
    let records = preprocessor.preprocess(raw)?;

    let risks = predict_batch(model, &records);
    let alerts = generate_and_notify(&risks, threshold, notifier);

    logging::info(
        Stage::System,
        None,
        &format!(
            "run complete: {} raw rows, {} model-ready, {} risk records, {} alerts",
            raw.len(),
            records.len(),
            risks.len(),
            alerts.len()
        ),
    );

    Ok(RunOutcome {
        records,
        scale_params: preprocessor.scale_params().cloned(),
        risks,
        alerts,
        diagnostics: preprocessor.diagnostics().to_vec(),
    })
}
