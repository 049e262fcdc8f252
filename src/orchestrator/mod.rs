// Sequential job orchestration
//
// The orchestrator owns all run state and is driven by one event channel.
// Frontends answer dialogs and workers report progress by sending UiEvents;
// neither touches orchestrator state directly.

pub mod dialog_chain;
pub mod queue;
pub mod summary;

pub use dialog_chain::*;
pub use queue::*;
pub use summary::*;

use crate::models::{JobOutcome, JobSetting, ModelKind, RunMode};
use crate::process_manager::{run_job, CancelFlag, JobRequest};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<UiEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<UiEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug)]
pub enum UiEvent {
    Submit { mode: RunMode, items: Vec<String> },
    DialogResolved { ticket: u64, decision: DialogDecision },
    Progress { ticket: u64, percent: u8 },
    JobFinished { ticket: u64, outcome: Box<JobOutcome> },
    Cancel,
    Shutdown,
}

/// What a settings dialog needs to pre-populate itself
#[derive(Debug, Clone)]
pub struct DialogRequest {
    pub ticket: u64,
    pub phenotype: String,
    pub position: usize,
    pub total: usize,
    pub mode: RunMode,
    pub model: ModelKind,
    pub defaults: JobSetting,
}

impl DialogRequest {
    pub fn accept(&self, setting: JobSetting) -> UiEvent {
        UiEvent::DialogResolved {
            ticket: self.ticket,
            decision: DialogDecision::Accepted(setting),
        }
    }

    pub fn reject(&self) -> UiEvent {
        UiEvent::DialogResolved {
            ticket: self.ticket,
            decision: DialogDecision::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// User-facing surface of a run
pub trait Frontend: Send {
    fn alert(&mut self, level: AlertLevel, message: &str);

    /// Open a dialog without blocking; the answer must come back through `reply`
    fn open_settings_dialog(&mut self, request: DialogRequest, reply: EventSender);

    fn job_started(&mut self, _phenotype: &str, _position: usize, _total: usize) {}

    fn progress(&mut self, phenotype: &str, percent: u8);

    fn show_summary(&mut self, summary: &RunSummary);

    fn set_trigger_enabled(&mut self, mode: RunMode, enabled: bool);
}

/// Starts one job in the background and reports back over the event channel
pub trait JobExecutor: Send {
    fn launch(&mut self, request: JobRequest, events: EventSender, cancel: CancelFlag);
}

/// Runs jobs as real subprocess pipelines on the tokio runtime
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl JobExecutor for ProcessExecutor {
    fn launch(&mut self, request: JobRequest, events: EventSender, cancel: CancelFlag) {
        tokio::spawn(async move {
            let ticket = request.ticket;
            let progress_events = events.clone();
            let outcome = run_job(&request, &cancel, move |percent| {
                let _ = progress_events.send(UiEvent::Progress { ticket, percent });
            })
            .await;
            let _ = events.send(UiEvent::JobFinished {
                ticket,
                outcome: Box::new(outcome),
            });
        });
    }
}

/// Feed events to the orchestrator until it goes idle (when `until_idle`)
/// or a shutdown has been fully wound down.
pub async fn drive<F, E>(orchestrator: &mut Orchestrator<F, E>, events: &mut EventReceiver, until_idle: bool)
where
    F: Frontend,
    E: JobExecutor,
{
    let mut shutting_down = false;
    while let Some(event) = events.recv().await {
        shutting_down |= matches!(event, UiEvent::Shutdown);
        orchestrator.handle(event);
        if orchestrator.is_idle() && (until_idle || shutting_down) {
            break;
        }
    }
}
