// Job data models
use crate::error::StudioError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Train,
    TransferLearn,
    Predict,
}

impl RunMode {
    /// Training-like runs collect settings through the dialog chain first
    pub fn needs_settings(&self) -> bool {
        matches!(self, RunMode::Train | RunMode::TransferLearn)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Train => "Training",
            RunMode::TransferLearn => "Transfer learning",
            RunMode::Predict => "Prediction",
        }
    }
}

/// Outcome of one external process invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub phase: String,
    pub ok: bool,
    pub seconds: f64,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub last_epoch: i64,
    pub target_epochs: u32,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub log_tail: Vec<String>,
}

/// Evaluation metrics scraped from the final log line
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub train_r2: Option<f64>,
    pub val_r2: Option<f64>,
}

impl EvalMetrics {
    pub fn is_complete(&self) -> bool {
        self.train_r2.is_some() && self.val_r2.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed { reason: String },
    MissingInput,
    MissingModel { path: PathBuf },
    Cancelled,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

/// Job-level errors end up as the job's terminal status
impl From<StudioError> for JobStatus {
    fn from(err: StudioError) -> Self {
        match err {
            StudioError::MissingInputFile { .. } => JobStatus::MissingInput,
            StudioError::MissingModelFile { path, .. } => JobStatus::MissingModel { path },
            StudioError::Cancelled => JobStatus::Cancelled,
            other => JobStatus::Failed {
                reason: other.to_string(),
            },
        }
    }
}

/// Terminal record the worker sends back for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub phenotype: String,
    pub mode: RunMode,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
    pub metrics: Option<EvalMetrics>,
    pub output_file: Option<PathBuf>,
}

impl JobOutcome {
    pub fn new(phenotype: impl Into<String>, mode: RunMode, status: JobStatus) -> Self {
        Self {
            phenotype: phenotype.into(),
            mode,
            status,
            steps: vec![],
            metrics: None,
            output_file: None,
        }
    }

    pub fn total_seconds(&self) -> f64 {
        self.steps.iter().map(|s| s.seconds).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_errors_map_to_statuses() {
        let missing_input = StudioError::MissingInputFile {
            phenotype: "height".into(),
        };
        assert_eq!(JobStatus::from(missing_input), JobStatus::MissingInput);

        let path = PathBuf::from("/ws/height_model.pt");
        let missing_model = StudioError::MissingModelFile {
            phenotype: "height".into(),
            path: path.clone(),
        };
        assert_eq!(JobStatus::from(missing_model), JobStatus::MissingModel { path });
        assert_eq!(JobStatus::from(StudioError::Cancelled), JobStatus::Cancelled);

        let failed = JobStatus::from(StudioError::ExecutableNotFound {
            path: PathBuf::from("pred"),
        });
        assert!(matches!(failed, JobStatus::Failed { reason } if reason.starts_with("Executable not found")));
    }
}
