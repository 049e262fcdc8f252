// Run state machine: dialog chain, sequential execution, summary

use super::dialog_chain::{DialogChain, DialogDecision};
use super::summary::RunSummary;
use super::{AlertLevel, DialogRequest, EventSender, Frontend, JobExecutor, UiEvent};
use crate::error::{Result, StudioError};
use crate::file_manager::{load_setting, persist_settings};
use crate::logging::record_run_history;
use crate::models::{JobOutcome, ModelKind, RunMode};
use crate::process_manager::{CancelFlag, JobRequest};
use crate::utils::WorkspaceLayout;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    DialogPhase,
    Executing,
    Summarizing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phenotype: Option<String>,
    pub percent: u8,
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub layout: WorkspaceLayout,
    pub model: ModelKind,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
struct ActiveJob {
    ticket: u64,
    phenotype: String,
}

pub struct Orchestrator<F, E> {
    frontend: F,
    executor: E,
    config: OrchestratorConfig,
    events: EventSender,
    state: RunState,
    mode: RunMode,
    dialogs: DialogChain,
    dialog_total: usize,
    exec_queue: VecDeque<String>,
    exec_total: usize,
    next_ticket: u64,
    active: Option<ActiveJob>,
    cancel: CancelFlag,
    summary: Option<RunSummary>,
    last_summary: Option<RunSummary>,
    progress: ProgressSnapshot,
}

impl<F: Frontend, E: JobExecutor> Orchestrator<F, E> {
    pub fn new(frontend: F, executor: E, config: OrchestratorConfig, events: EventSender) -> Self {
        Self {
            frontend,
            executor,
            config,
            events,
            state: RunState::Idle,
            mode: RunMode::Train,
            dialogs: DialogChain::default(),
            dialog_total: 0,
            exec_queue: VecDeque::new(),
            exec_total: 0,
            next_ticket: 0,
            active: None,
            cancel: CancelFlag::new(),
            summary: None,
            last_summary: None,
            progress: ProgressSnapshot::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RunState::Idle
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.clone()
    }

    pub fn last_summary(&self) -> Option<&RunSummary> {
        self.last_summary.as_ref()
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::Submit { mode, items } => {
                let _ = self.submit(mode, items);
            }
            UiEvent::DialogResolved { ticket, decision } => self.on_dialog_resolved(ticket, decision),
            UiEvent::Progress { ticket, percent } => self.on_progress(ticket, percent),
            UiEvent::JobFinished { ticket, outcome } => self.on_job_finished(ticket, *outcome),
            UiEvent::Cancel | UiEvent::Shutdown => self.cancel(),
        }
    }

    /// Start a run. Refused while another run is active or when nothing is selected.
    pub fn submit(&mut self, mode: RunMode, items: Vec<String>) -> Result<()> {
        if self.state != RunState::Idle {
            return self.refuse(mode, StudioError::AlreadyRunning);
        }

        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return self.refuse(mode, StudioError::NoSelection);
        }

        info!("{} requested for {} item(s): {:?}", mode.label(), items.len(), items);
        self.mode = mode;
        self.cancel.reset();
        self.summary = Some(RunSummary::new(mode));
        self.frontend.set_trigger_enabled(mode, false);

        if mode.needs_settings() {
            self.state = RunState::DialogPhase;
            self.dialog_total = items.len();
            self.dialogs.load(items);
            self.show_next_dialog();
        } else {
            self.begin_execution(items);
        }
        Ok(())
    }

    fn refuse(&mut self, mode: RunMode, err: StudioError) -> Result<()> {
        let level = if err.is_queue_level() {
            AlertLevel::Warning
        } else {
            AlertLevel::Error
        };
        warn!("Ignoring {} request: {}", mode.label(), err);
        self.frontend.alert(level, &err.to_string());
        Err(err)
    }

    /// Stop the run. Queued work is dropped; the running process is killed by its worker.
    pub fn cancel(&mut self) {
        match self.state {
            RunState::Idle | RunState::Summarizing => {}
            RunState::DialogPhase => {
                info!("{} cancelled during settings", self.mode.label());
                self.cancel.cancel();
                self.dialogs.clear();
                if let Some(summary) = self.summary.as_mut() {
                    summary.note("Cancelled before any job started.");
                }
                self.summarize();
            }
            RunState::Executing => {
                info!("{} cancel requested", self.mode.label());
                self.cancel.cancel();
                if self.active.is_none() {
                    self.launch_next();
                }
            }
        }
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn show_next_dialog(&mut self) {
        let position = self.dialog_total - self.dialogs.remaining() + 1;
        let ticket = self.issue_ticket();
        let Some(pending) = self.dialogs.advance(ticket).cloned() else {
            self.finish_dialog_phase();
            return;
        };

        let defaults = load_setting(&self.config.layout, self.config.model, &pending.phenotype);
        debug!("Opening settings dialog {} for {}", ticket, pending.phenotype);
        let request = DialogRequest {
            ticket,
            phenotype: pending.phenotype,
            position,
            total: self.dialog_total,
            mode: self.mode,
            model: self.config.model,
            defaults,
        };
        self.frontend.open_settings_dialog(request, self.events.clone());
    }

    fn on_dialog_resolved(&mut self, ticket: u64, decision: DialogDecision) {
        if self.state != RunState::DialogPhase {
            debug!("Ignoring dialog answer {} outside the settings phase", ticket);
            return;
        }
        if !self.dialogs.resolve(ticket, decision) {
            debug!("Ignoring stale dialog answer {}", ticket);
            return;
        }
        self.show_next_dialog();
    }

    fn finish_dialog_phase(&mut self) {
        let accepted = self.dialogs.take_accepted();
        if accepted.is_empty() {
            info!("All {} settings dialog(s) were skipped", self.dialogs.rejected());
            self.summarize();
            return;
        }

        if let Err(e) = persist_settings(&self.config.layout, self.config.model, &accepted) {
            error!("Failed to save settings: {}", e);
            self.frontend
                .alert(AlertLevel::Error, &format!("Failed to save settings: {}", e));
            if let Some(summary) = self.summary.as_mut() {
                summary.note(format!("Settings could not be saved ({}); no jobs were started.", e));
            }
            self.summarize();
            return;
        }

        self.begin_execution(accepted.into_iter().map(|(phenotype, _)| phenotype).collect());
    }

    fn begin_execution(&mut self, items: Vec<String>) {
        self.state = RunState::Executing;
        self.exec_total = items.len();
        self.exec_queue = items.into();
        self.launch_next();
    }

    fn launch_next(&mut self) {
        if self.cancel.is_cancelled() {
            for phenotype in self.exec_queue.drain(..) {
                if let Some(summary) = self.summary.as_mut() {
                    summary.record_cancelled(&phenotype);
                }
            }
        }

        let Some(phenotype) = self.exec_queue.pop_front() else {
            self.summarize();
            return;
        };

        let ticket = self.issue_ticket();
        let position = self.exec_total - self.exec_queue.len();
        self.progress = ProgressSnapshot {
            phenotype: Some(phenotype.clone()),
            percent: 0,
            position,
            total: self.exec_total,
        };
        self.active = Some(ActiveJob {
            ticket,
            phenotype: phenotype.clone(),
        });

        info!("Starting {} {} ({}/{})", self.mode.label(), phenotype, position, self.exec_total);
        self.frontend.job_started(&phenotype, position, self.exec_total);
        self.frontend.progress(&phenotype, 0);

        let request = JobRequest {
            ticket,
            mode: self.mode,
            phenotype,
            layout: self.config.layout.clone(),
            model: self.config.model,
            poll_interval: self.config.poll_interval,
        };
        self.executor.launch(request, self.events.clone(), self.cancel.clone());
    }

    fn active_phenotype(&self, ticket: u64) -> Option<String> {
        self.active
            .as_ref()
            .filter(|job| job.ticket == ticket)
            .map(|job| job.phenotype.clone())
    }

    fn on_progress(&mut self, ticket: u64, percent: u8) {
        let Some(phenotype) = self.active_phenotype(ticket) else {
            debug!("Ignoring progress from stale job {}", ticket);
            return;
        };
        let percent = percent.min(100);
        if percent <= self.progress.percent {
            return;
        }
        self.progress.percent = percent;
        self.frontend.progress(&phenotype, percent);
    }

    fn on_job_finished(&mut self, ticket: u64, outcome: JobOutcome) {
        let Some(phenotype) = self.active_phenotype(ticket) else {
            debug!("Ignoring result from stale job {}", ticket);
            return;
        };
        self.active = None;

        if outcome.status.is_success() {
            self.on_progress_complete(&phenotype);
        } else {
            warn!("{} {} did not succeed: {:?}", self.mode.label(), phenotype, outcome.status);
        }

        record_run_history(&self.config.layout, self.config.model, &outcome);
        if let Some(summary) = self.summary.as_mut() {
            summary.record(&outcome);
        }
        self.launch_next();
    }

    fn on_progress_complete(&mut self, phenotype: &str) {
        if self.progress.percent < 100 {
            self.progress.percent = 100;
            self.frontend.progress(phenotype, 100);
        }
    }

    fn summarize(&mut self) {
        self.state = RunState::Summarizing;
        let summary = self
            .summary
            .take()
            .unwrap_or_else(|| RunSummary::new(self.mode));
        info!("{}\n{}", summary.title(), summary.render());
        self.frontend.show_summary(&summary);
        self.last_summary = Some(summary);

        self.active = None;
        self.exec_queue.clear();
        self.dialogs.clear();
        self.progress = ProgressSnapshot::default();
        self.cancel.reset();
        self.state = RunState::Idle;
        self.frontend.set_trigger_enabled(self.mode, true);
    }
}
