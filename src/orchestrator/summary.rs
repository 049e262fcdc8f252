// Run summary: one human-readable line per finished job

use crate::models::{EvalMetrics, JobOutcome, JobStatus, RunMode};
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub phenotype: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Local>,
    pub entries: Vec<SummaryEntry>,
    pub notes: Vec<String>,
}

/// Minutes with two decimals from one minute up, seconds below
pub fn format_elapsed(seconds: f64) -> String {
    if seconds >= 60.0 {
        format!("{:.2} min", seconds / 60.0)
    } else {
        format!("{:.2} s", seconds)
    }
}

fn describe_metrics(metrics: Option<&EvalMetrics>) -> String {
    let metrics = metrics.copied().unwrap_or_default();
    let value = |v: Option<f64>| match v {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    };
    if metrics.is_complete() {
        format!("train R2 = {}, val R2 = {}", value(metrics.train_r2), value(metrics.val_r2))
    } else {
        format!(
            "metrics unavailable (could not parse the final log line: train R2 = {}, val R2 = {})",
            value(metrics.train_r2),
            value(metrics.val_r2)
        )
    }
}

/// Summary line for one job outcome
pub fn describe_outcome(outcome: &JobOutcome) -> String {
    let elapsed = format_elapsed(outcome.total_seconds());
    match (&outcome.status, outcome.mode) {
        (JobStatus::Succeeded, RunMode::Predict) => match &outcome.output_file {
            Some(path) => format!("Success - predictions written to {} ({})", path.display(), elapsed),
            None => format!("Success - no prediction file was produced ({})", elapsed),
        },
        (JobStatus::Succeeded, _) => format!(
            "Success - {} - elapsed {}",
            describe_metrics(outcome.metrics.as_ref()),
            elapsed
        ),
        (JobStatus::Failed { reason }, _) => format!("Failed - {} - elapsed {}", reason, elapsed),
        (JobStatus::MissingInput, _) => "Failed - no input file found".to_string(),
        (JobStatus::MissingModel { path }, _) => {
            format!("Failed - model missing ({})", path.display())
        }
        (JobStatus::Cancelled, _) => "Cancelled".to_string(),
    }
}

impl RunSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            started_at: Local::now(),
            entries: vec![],
            notes: vec![],
        }
    }

    pub fn record(&mut self, outcome: &JobOutcome) {
        self.entries.push(SummaryEntry {
            phenotype: outcome.phenotype.clone(),
            success: outcome.status.is_success(),
            message: describe_outcome(outcome),
        });
    }

    pub fn record_cancelled(&mut self, phenotype: &str) {
        self.entries.push(SummaryEntry {
            phenotype: phenotype.to_string(),
            success: false,
            message: "Cancelled".to_string(),
        });
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.success)
            .map(|e| e.phenotype.as_str())
            .collect()
    }

    pub fn title(&self) -> String {
        let failed = self.entries.iter().filter(|e| !e.success).count();
        if self.entries.is_empty() {
            format!("{} skipped", self.mode.label())
        } else if failed == 0 {
            format!("{} complete", self.mode.label())
        } else {
            format!("{} finished with {} failure(s)", self.mode.label(), failed)
        }
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.notes.clone();
        if self.entries.is_empty() {
            lines.push(match self.mode {
                RunMode::Predict => "No items were predicted.".to_string(),
                _ => "No items were trained.".to_string(),
            });
        }
        for entry in &self.entries {
            lines.push(format!("{}: {}", entry.phenotype, entry.message));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepResult;
    use std::path::PathBuf;

    fn step(seconds: f64) -> StepResult {
        StepResult {
            phase: "train_mmnet".to_string(),
            ok: true,
            seconds,
            started_at: Local::now(),
            finished_at: Local::now(),
            last_epoch: 49,
            target_epochs: 50,
            exit_code: Some(0),
            error: None,
            log_tail: vec![],
        }
    }

    #[test]
    fn test_elapsed_switches_to_minutes() {
        assert_eq!(format_elapsed(12.5), "12.50 s");
        assert_eq!(format_elapsed(59.99), "59.99 s");
        assert_eq!(format_elapsed(90.0), "1.50 min");
    }

    #[test]
    fn test_success_line_with_metrics() {
        let mut outcome = JobOutcome::new("height", RunMode::Train, JobStatus::Succeeded);
        outcome.steps = vec![step(30.0), step(60.0)];
        outcome.metrics = Some(EvalMetrics {
            train_r2: Some(0.91),
            val_r2: Some(0.85),
        });

        let line = describe_outcome(&outcome);
        assert_eq!(line, "Success - train R2 = 0.9100, val R2 = 0.8500 - elapsed 1.50 min");
    }

    #[test]
    fn test_unparsable_metrics_are_called_out() {
        let mut outcome = JobOutcome::new("height", RunMode::Train, JobStatus::Succeeded);
        outcome.metrics = Some(EvalMetrics {
            train_r2: Some(0.5),
            val_r2: None,
        });
        let line = describe_outcome(&outcome);
        assert!(line.contains("metrics unavailable"));
        assert!(line.contains("val R2 = n/a"));
    }

    #[test]
    fn test_prediction_lines() {
        let missing = JobOutcome::new("a", RunMode::Predict, JobStatus::MissingInput);
        assert_eq!(describe_outcome(&missing), "Failed - no input file found");

        let no_model = JobOutcome::new(
            "a",
            RunMode::Predict,
            JobStatus::MissingModel {
                path: PathBuf::from("a_model.pt"),
            },
        );
        assert!(describe_outcome(&no_model).contains("model missing"));
    }

    #[test]
    fn test_empty_summary_reports_no_items() {
        let summary = RunSummary::new(RunMode::Train);
        assert_eq!(summary.render(), "No items were trained.");
        assert_eq!(summary.title(), "Training skipped");
    }

    #[test]
    fn test_render_keeps_order_and_duplicates() {
        let mut summary = RunSummary::new(RunMode::Train);
        summary.record(&JobOutcome::new("a", RunMode::Train, JobStatus::Succeeded));
        summary.record(&JobOutcome::new(
            "a",
            RunMode::Train,
            JobStatus::Failed {
                reason: "boom".into(),
            },
        ));
        summary.record_cancelled("b");

        let text = summary.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("a: Success"));
        assert!(lines[1].starts_with("a: Failed - boom"));
        assert_eq!(lines[2], "b: Cancelled");
        assert_eq!(summary.succeeded(), vec!["a"]);
        assert_eq!(summary.title(), "Training finished with 2 failure(s)");
    }
}
