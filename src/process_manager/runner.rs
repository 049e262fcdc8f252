// External process runner
// Spawns one pipeline executable, watches its log for progress and reports a StepResult

use super::log_poller::{last_non_empty_lines, PhaseSpan, ProgressState};
use crate::error::StudioError;
use crate::file_manager::read_saved_epochs;
use crate::models::StepResult;
use chrono::Local;
use log::{debug, error, info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub const LOG_TAIL_LINES: usize = 20;

/// Shared stop request, checked by the runner on every poll tick
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything needed to run one phase of a job
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub label: String,
    pub exe: PathBuf,
    pub log: PathBuf,
    pub config: PathBuf,
    pub phenotype: String,
    pub span: PhaseSpan,
    pub poll_interval: Duration,
}

struct Finished {
    status: ExitStatus,
    last_epoch: i64,
    target_epochs: u32,
}

fn recreate_log(path: &Path) -> Result<(), StudioError> {
    File::create(path)
        .map(|_| ())
        .map_err(|source| StudioError::LogCreate {
            path: path.to_path_buf(),
            source,
        })
}

fn forward_output<R>(reader: R, name: String)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{}] {}", name, line);
        }
    });
}

async fn execute<P>(
    spec: &PhaseSpec,
    cancel: &CancelFlag,
    on_progress: &mut P,
    last_epoch: &mut i64,
    target: &mut u32,
) -> Result<Finished, StudioError>
where
    P: FnMut(u8) + Send,
{
    recreate_log(&spec.log)?;

    let target_epochs = read_saved_epochs(&spec.config, &spec.phenotype);
    *target = target_epochs;

    if !spec.exe.is_file() {
        return Err(StudioError::ExecutableNotFound {
            path: spec.exe.clone(),
        });
    }

    let work_dir = spec
        .exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(
        "Starting {:?} --phenotype {} (cwd {:?}, budget {} epochs)",
        spec.exe, spec.phenotype, work_dir, target_epochs
    );

    let mut cmd = Command::new(&spec.exe);
    cmd.arg("--phenotype")
        .arg(&spec.phenotype)
        .current_dir(&work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let mut child = cmd.spawn().map_err(|source| StudioError::Spawn {
        exe: spec.exe.clone(),
        source,
    })?;

    if let Some(stdout) = child.stdout.take() {
        forward_output(stdout, spec.label.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_output(stderr, spec.label.clone());
    }

    let mut progress = ProgressState::new(&spec.log, target_epochs);
    let mut polling = true;
    let mut ticker = tokio::time::interval(spec.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| StudioError::io(&spec.exe, e))?;
            }
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    warn!("Cancelling {} for {}", spec.label, spec.phenotype);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {:?}: {}", spec.exe, e);
                    }
                    *last_epoch = progress.last_epoch;
                    return Err(StudioError::Cancelled);
                }
                if polling {
                    if let Some(local) = progress.poll() {
                        debug!("{} epoch {} -> {}%", spec.label, progress.last_epoch, local);
                        on_progress(spec.span.overall(local));
                    }
                    if progress.budget_reached() {
                        debug!("{} reached its epoch budget; waiting for exit", spec.label);
                        polling = false;
                    }
                }
            }
        }
    };

    // Pick up markers written between the last tick and exit
    if let Some(local) = progress.poll() {
        on_progress(spec.span.overall(local));
    }
    *last_epoch = progress.last_epoch;

    if status.success() {
        on_progress(spec.span.overall(progress.complete()));
    }

    Ok(Finished {
        status,
        last_epoch: progress.last_epoch,
        target_epochs,
    })
}

/// Run one phase to completion. Never returns an error: every failure is
/// folded into the StepResult so the caller can move on to the next job.
pub async fn run_step<P>(spec: &PhaseSpec, cancel: &CancelFlag, mut on_progress: P) -> StepResult
where
    P: FnMut(u8) + Send,
{
    let started_at = Local::now();
    let timer = Instant::now();
    let mut last_epoch = super::log_poller::NO_EPOCH;
    let mut target_epochs = crate::models::DEFAULT_SAVED_EPOCHS;

    let outcome = execute(spec, cancel, &mut on_progress, &mut last_epoch, &mut target_epochs).await;

    let seconds = timer.elapsed().as_secs_f64();
    let finished_at = Local::now();

    let (ok, exit_code, error, log_tail) = match outcome {
        Ok(finished) if finished.status.success() => {
            info!(
                "{} finished for {} in {:.2}s (epoch {}/{})",
                spec.label, spec.phenotype, seconds, finished.last_epoch, finished.target_epochs
            );
            (true, finished.status.code(), None, vec![])
        }
        Ok(finished) => {
            let tail = last_non_empty_lines(&spec.log, LOG_TAIL_LINES);
            let failure = StudioError::ProcessFailure {
                exe: spec.exe.clone(),
                code: finished.status.code(),
                tail: tail.clone(),
            };
            error!("{} for {}", failure, spec.phenotype);
            for line in &tail {
                error!("  | {}", line);
            }
            (false, finished.status.code(), Some(failure.to_string()), tail)
        }
        Err(e) => {
            error!("{} failed for {}: {}", spec.label, spec.phenotype, e);
            let tail = match e {
                StudioError::LogCreate { .. } | StudioError::ExecutableNotFound { .. } => vec![],
                _ => last_non_empty_lines(&spec.log, LOG_TAIL_LINES),
            };
            (false, None, Some(e.to_string()), tail)
        }
    };

    StepResult {
        phase: spec.label.clone(),
        ok,
        seconds,
        started_at,
        finished_at,
        last_epoch,
        target_epochs,
        exit_code,
        error,
        log_tail,
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::test_support::write_script;
    use super::*;
    use crate::file_manager::write_json_file;
    use serde_json::json;
    use std::fs;

    fn spec(dir: &Path, exe: PathBuf) -> PhaseSpec {
        PhaseSpec {
            label: "train".to_string(),
            exe,
            log: dir.join("step2.log"),
            config: dir.join("configs").join("MMNet.json"),
            phenotype: "height".to_string(),
            span: PhaseSpan::SINGLE,
            poll_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_successful_run_reaches_100() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write_json_file(&dir.join("configs").join("MMNet.json"), &json!({ "height": { "saved": 50 } })).unwrap();
        let exe = write_script(
            dir,
            "train_mmnet",
            "[ \"$1\" = \"--phenotype\" ] || exit 9\n\
             [ \"$2\" = \"height\" ] || exit 8\n\
             echo \"epoch = 10\" >> step2.log\n\
             sleep 0.1\n\
             echo \"epoch = 49\" >> step2.log\n\
             echo \"stdout noise\"\n\
             exit 0",
        );

        let mut seen = vec![];
        let result = run_step(&spec(dir, exe), &CancelFlag::new(), |p| seen.push(p)).await;

        assert!(result.ok, "error: {:?}", result.error);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.target_epochs, 50);
        assert_eq!(result.last_epoch, 49);
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {:?}", seen);
        assert!(seen.contains(&98));
    }

    #[tokio::test]
    async fn test_previous_log_is_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("step2.log"), "epoch = 99\n").unwrap();
        let exe = write_script(dir, "train_mmnet", "exit 0");

        let result = run_step(&spec(dir, exe), &CancelFlag::new(), |_| {}).await;

        assert!(result.ok);
        assert_eq!(result.last_epoch, -1);
        assert_eq!(fs::read_to_string(dir.join("step2.log")).unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_executable_is_reported_distinctly() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        let result = run_step(&spec(dir, dir.join("nope")), &CancelFlag::new(), |_| {}).await;

        assert!(!result.ok);
        assert_eq!(result.exit_code, None);
        assert!(result.error.unwrap().contains("Executable not found"));
    }

    #[tokio::test]
    async fn test_unexecutable_file_is_a_spawn_failure() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let exe = dir.join("train_mmnet");
        fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o644)).unwrap();

        let result = run_step(&spec(dir, exe), &CancelFlag::new(), |_| {}).await;

        assert!(!result.ok);
        let error = result.error.unwrap();
        assert!(error.starts_with("Failed to start"), "{}", error);
        assert!(!error.contains("Executable not found"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_log_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let exe = write_script(
            dir,
            "train_mmnet",
            "i=0\nwhile [ $i -lt 25 ]; do echo \"line $i\" >> step2.log; i=$((i+1)); done\nexit 3",
        );

        let result = run_step(&spec(dir, exe), &CancelFlag::new(), |_| {}).await;

        assert!(!result.ok);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.log_tail.len(), 20);
        assert_eq!(result.log_tail.last().unwrap(), "line 24");
        assert!(result.error.unwrap().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_log_create_error_when_directory_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let exe = write_script(dir, "train_mmnet", "exit 0");
        let mut spec = spec(dir, exe);
        spec.log = dir.join("missing").join("step2.log");

        let result = run_step(&spec, &CancelFlag::new(), |_| {}).await;

        assert!(!result.ok);
        assert!(result.error.unwrap().contains("Cannot create log file"));
    }

    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let exe = write_script(dir, "train_mmnet", "echo \"epoch = 0\" >> step2.log\nsleep 30");
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = run_step(&spec(dir, exe), &cancel, |_| {}).await;

        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("Cancelled"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
