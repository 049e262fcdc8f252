// Per-mode job pipelines built from runner phases

use super::log_poller::{parse_final_metrics, PhaseSpan};
use super::runner::{run_step, CancelFlag, PhaseSpec};
use crate::error::{Result, StudioError};
use crate::file_manager::find_input_file;
use crate::models::{JobOutcome, JobStatus, ModelKind, RunMode};
use crate::utils::{WorkspaceLayout, PREDICT_EXE, RELATEDNESS_EXE, TRANSFER_EXE};
use log::{info, warn};
use std::time::Duration;

/// One queued unit of work handed to a worker
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub ticket: u64,
    pub mode: RunMode,
    pub phenotype: String,
    pub layout: WorkspaceLayout,
    pub model: ModelKind,
    pub poll_interval: Duration,
}

impl JobRequest {
    /// Phases in execution order
    pub fn phases(&self) -> Vec<PhaseSpec> {
        let layout = &self.layout;
        let phase = |label: &str, exe, log, config, span| PhaseSpec {
            label: label.to_string(),
            exe,
            log,
            config,
            phenotype: self.phenotype.clone(),
            span,
            poll_interval: self.poll_interval,
        };

        match self.mode {
            RunMode::Train => vec![
                phase(
                    RELATEDNESS_EXE,
                    layout.relatedness_exe(),
                    layout.step1_log_path(),
                    layout.esn_config_path(),
                    PhaseSpan::new(0, 2),
                ),
                phase(
                    self.model.train_exe_stem(),
                    layout.train_exe(self.model),
                    layout.step2_log_path(),
                    layout.model_config_path(self.model),
                    PhaseSpan::new(1, 2),
                ),
            ],
            RunMode::TransferLearn => vec![phase(
                TRANSFER_EXE,
                layout.transfer_exe(),
                layout.transfer_log_path(),
                layout.model_config_path(self.model),
                PhaseSpan::SINGLE,
            )],
            RunMode::Predict => vec![phase(
                PREDICT_EXE,
                layout.predict_exe(),
                layout.predict_log_path(),
                layout.model_config_path(self.model),
                PhaseSpan::SINGLE,
            )],
        }
    }
}

/// Prediction needs an input file and a trained model
fn check_prediction_inputs(layout: &WorkspaceLayout, phenotype: &str) -> Result<()> {
    if find_input_file(layout, phenotype).is_none() {
        return Err(StudioError::MissingInputFile {
            phenotype: phenotype.to_string(),
        });
    }
    let path = layout.model_artifact(phenotype);
    if !path.is_file() {
        return Err(StudioError::MissingModelFile {
            phenotype: phenotype.to_string(),
            path,
        });
    }
    Ok(())
}

/// Run every phase of a job in order; the first failing phase ends the job.
pub async fn run_job<P>(request: &JobRequest, cancel: &CancelFlag, mut on_progress: P) -> JobOutcome
where
    P: FnMut(u8) + Send,
{
    let phenotype = request.phenotype.as_str();
    let mut outcome = JobOutcome::new(phenotype, request.mode, JobStatus::Succeeded);

    if cancel.is_cancelled() {
        outcome.status = JobStatus::Cancelled;
        return outcome;
    }

    if request.mode == RunMode::Predict {
        if let Err(e) = check_prediction_inputs(&request.layout, phenotype) {
            warn!("{}", e);
            outcome.status = e.into();
            return outcome;
        }
    }

    for spec in request.phases() {
        let step = run_step(&spec, cancel, &mut on_progress).await;
        let ok = step.ok;
        let error = step.error.clone();
        outcome.steps.push(step);

        if !ok {
            outcome.status = if cancel.is_cancelled() {
                JobStatus::Cancelled
            } else {
                JobStatus::Failed {
                    reason: error.unwrap_or_else(|| format!("{} failed", spec.label)),
                }
            };
            return outcome;
        }
    }

    match request.mode {
        RunMode::Train | RunMode::TransferLearn => {
            if let Some(last) = request.phases().last() {
                outcome.metrics = Some(parse_final_metrics(&last.log));
            }
        }
        RunMode::Predict => {
            let output = request.layout.prediction_artifact(phenotype);
            if output.is_file() {
                outcome.output_file = Some(output);
            } else {
                warn!("pred finished for {} but {:?} was not written", phenotype, output);
            }
        }
    }

    info!(
        "{} job for {} finished in {:.2}s",
        request.mode.label(),
        phenotype,
        outcome.total_seconds()
    );
    outcome
}
