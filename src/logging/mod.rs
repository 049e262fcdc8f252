//! Logging setup, log file retention and the per-job run history

use crate::error::{Result, StudioError};
use crate::file_manager::dir_size_mb;
use crate::models::{JobOutcome, JobStatus, ModelKind, StepResult};
use crate::orchestrator::format_elapsed;
use crate::utils::{DataKind, WorkspaceLayout};
use chrono::{DateTime, Local, NaiveDate};
use log::{info, warn};
use nvml_wrapper::Nvml;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

lazy_static::lazy_static! {
    static ref GPU_NAME: String = detect_gpu_name();
}

/// Name of the first NVIDIA GPU, "Unknown" when NVML is unavailable
fn detect_gpu_name() -> String {
    Nvml::init()
        .and_then(|nvml| nvml.device_by_index(0).and_then(|device| device.name()))
        .unwrap_or_else(|e| {
            log::debug!("No GPU name available: {}", e);
            "Unknown".to_string()
        })
}

pub fn gpu_name() -> &'static str {
    GPU_NAME.as_str()
}

pub fn log_file_name(date: NaiveDate) -> String {
    format!("mmnet-studio-{}.log", date.format("%Y-%m-%d"))
}

/// Open (append) today's log file in `logs_dir`, creating the directory
pub fn open_log_file(logs_dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(logs_dir).map_err(|e| StudioError::io(logs_dir, e))?;
    let path = logs_dir.join(log_file_name(Local::now().date_naive()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StudioError::io(&path, e))?;
    Ok((path, file))
}

/// Every record goes to stderr and to the dated log file
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger. `RUST_LOG` overrides the default filter.
/// With a `logs_dir` the output is also kept in a dated file there.
pub fn init_logging(verbose: bool, logs_dir: Option<&Path>) -> Option<PathBuf> {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();

    let mut log_path = None;
    let mut open_error = None;
    if let Some(dir) = logs_dir {
        match open_log_file(dir) {
            Ok((path, file)) => {
                builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
                log_path = Some(path);
            }
            Err(e) => open_error = Some(e),
        }
    }

    if builder.try_init().is_err() {
        // Already installed, e.g. by a test harness
        log::debug!("Logger already initialized");
        return None;
    }
    if let Some(e) = open_error {
        warn!("Logging to stderr only: {}", e);
    }
    log_path
}

/// Delete `.log` files older than the retention window. Returns how many were removed.
pub fn cleanup_old_logs(logs_dir: &Path, retention_days: u64) -> usize {
    if !logs_dir.exists() {
        return 0;
    }

    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    if let Ok(entries) = fs::read_dir(logs_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "log") {
                let age = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                if let Some(age) = age {
                    if age > retention && fs::remove_file(&path).is_ok() {
                        info!("Cleaned up old log: {:?}", path.file_name());
                        removed += 1;
                    }
                }
            }
        }
    }
    removed
}

fn status_label(status: &JobStatus) -> String {
    match status {
        JobStatus::Succeeded => "succeeded".to_string(),
        JobStatus::Failed { reason } => format!("failed ({})", reason),
        JobStatus::MissingInput => "failed (no input file)".to_string(),
        JobStatus::MissingModel { path } => format!("failed (model missing: {})", path.display()),
        JobStatus::Cancelled => "cancelled".to_string(),
    }
}

fn format_step(step: &StepResult) -> String {
    format!(
        "{} {} ({} - {}, epoch {}/{})",
        step.phase,
        format_elapsed(step.seconds),
        step.started_at.format(TIMESTAMP_FORMAT),
        step.finished_at.format(TIMESTAMP_FORMAT),
        step.last_epoch + 1,
        step.target_epochs
    )
}

/// Sizes of the data folders at the time a job finished
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSizes {
    pub gene_mb: f64,
    pub phen_mb: f64,
}

/// One history line per finished job
pub fn format_history_line(
    now: DateTime<Local>,
    outcome: &JobOutcome,
    model: ModelKind,
    gpu: &str,
    sizes: DataSizes,
) -> String {
    let steps: Vec<String> = outcome.steps.iter().map(format_step).collect();

    format!(
        "[{}] {} {} ({}) - {} - total {} | {} | GPU: {} | genotype {:.2} MB, phenotype {:.2} MB",
        now.format(TIMESTAMP_FORMAT),
        outcome.mode.label(),
        outcome.phenotype,
        model.label(),
        status_label(&outcome.status),
        format_elapsed(outcome.total_seconds()),
        if steps.is_empty() { "no steps".to_string() } else { steps.join("; ") },
        gpu,
        sizes.gene_mb,
        sizes.phen_mb
    )
}

pub fn append_run_history(layout: &WorkspaceLayout, model: ModelKind, outcome: &JobOutcome) -> Result<()> {
    let path = layout.run_history_path();
    let sizes = DataSizes {
        gene_mb: dir_size_mb(&layout.data_dir(DataKind::Gene)),
        phen_mb: dir_size_mb(&layout.data_dir(DataKind::Phen)),
    };
    let line = format_history_line(Local::now(), outcome, model, gpu_name(), sizes);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StudioError::io(&path, e))?;
    writeln!(file, "{}", line).map_err(|e| StudioError::io(&path, e))?;
    Ok(())
}

/// Best-effort variant used by the orchestrator
pub fn record_run_history(layout: &WorkspaceLayout, model: ModelKind, outcome: &JobOutcome) {
    if let Err(e) = append_run_history(layout, model, outcome) {
        warn!("Failed to append run history: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunMode;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, hour, min, sec).unwrap()
    }

    fn step(phase: &str, seconds: f64, start: DateTime<Local>, end: DateTime<Local>) -> StepResult {
        StepResult {
            phase: phase.to_string(),
            ok: true,
            seconds,
            started_at: start,
            finished_at: end,
            last_epoch: 49,
            target_epochs: 50,
            exit_code: Some(0),
            error: None,
            log_tail: vec![],
        }
    }

    #[test]
    fn test_history_line_lists_steps_and_sizes() {
        let mut outcome = JobOutcome::new("height", RunMode::Train, JobStatus::Succeeded);
        outcome
            .steps
            .push(step("generate_genetic_relatedness", 3.0, at(10, 0, 0), at(10, 0, 3)));
        outcome.steps.push(step("train_mmnet", 90.0, at(10, 0, 3), at(10, 1, 33)));
        let sizes = DataSizes {
            gene_mb: 1.5,
            phen_mb: 0.25,
        };

        let line = format_history_line(at(10, 1, 34), &outcome, ModelKind::Mmnet, "RTX 4090", sizes);
        assert!(line.starts_with("[2026-03-14 10:01:34] Training height (MMNet) - succeeded - total 1.55 min"));
        assert!(line.contains(
            "generate_genetic_relatedness 3.00 s (2026-03-14 10:00:00 - 2026-03-14 10:00:03, epoch 50/50)"
        ));
        assert!(line.contains("train_mmnet 1.50 min (2026-03-14 10:00:03 - 2026-03-14 10:01:33, epoch 50/50)"));
        assert!(line.ends_with("GPU: RTX 4090 | genotype 1.50 MB, phenotype 0.25 MB"));
    }

    #[test]
    fn test_append_run_history_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(tmp.path().join("MMNET"));
        let outcome = JobOutcome::new("a", RunMode::Predict, JobStatus::MissingInput);

        append_run_history(&layout, ModelKind::Menet, &outcome).unwrap();
        append_run_history(&layout, ModelKind::Menet, &outcome).unwrap();

        let text = fs::read_to_string(tmp.path().join("run_history.log")).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Prediction a (MENet) - failed (no input file)"));
    }

    #[test]
    fn test_log_file_is_dated_and_reopened() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");

        let (path, mut file) = open_log_file(&dir).unwrap();
        writeln!(file, "first").unwrap();
        let (again, mut file) = open_log_file(&dir).unwrap();
        writeln!(file, "second").unwrap();

        assert_eq!(path, again);
        assert_eq!(path.file_name().unwrap().to_string_lossy(), log_file_name(Local::now().date_naive()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(log_file_name(date), "mmnet-studio-2026-01-05.log");
    }

    #[test]
    fn test_cleanup_removes_expired_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, file) = open_log_file(tmp.path()).unwrap();
        drop(file);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cleanup_old_logs(tmp.path(), 0), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_keeps_recent_logs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("step1.log"), "epoch = 1").unwrap();
        fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(cleanup_old_logs(tmp.path(), 7), 0);
        assert!(tmp.path().join("step1.log").exists());
        assert_eq!(cleanup_old_logs(&tmp.path().join("missing"), 7), 0);
    }
}
