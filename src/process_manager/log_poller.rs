// Log-based progress estimation
//
// External trainers append `epoch = N` lines to their log. The file is small,
// so each poll re-reads it in full; no incremental parser state is kept.

use crate::models::EvalMetrics;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Returned when no epoch marker has been seen yet
pub const NO_EPOCH: i64 = -1;

lazy_static::lazy_static! {
    static ref EPOCH_RE: Regex = Regex::new(r"epoch = (\d+)").unwrap();
    static ref TRAIN_R2_RE: Regex =
        Regex::new(r"train_R2\s*=\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)").unwrap();
    static ref VAL_R2_RE: Regex =
        Regex::new(r"val_R2\s*=\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)").unwrap();
}

/// Value of the last `epoch = N` marker in the text, or `NO_EPOCH`
pub fn latest_epoch_in(text: &str) -> i64 {
    EPOCH_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<i64>().ok()))
        .last()
        .unwrap_or(NO_EPOCH)
}

pub fn parse_latest_epoch(log_path: &Path) -> i64 {
    match fs::read(log_path) {
        Ok(bytes) => latest_epoch_in(&String::from_utf8_lossy(&bytes)),
        Err(_) => NO_EPOCH,
    }
}

/// `min(100, floor((N+1) * 100 / (budget+1)))`, 0 before the first marker
pub fn epoch_percent(epoch: i64, target_epochs: u32) -> u8 {
    if epoch < 0 {
        return 0;
    }
    let percent = (epoch as u128 + 1) * 100 / (target_epochs as u128 + 1);
    percent.min(100) as u8
}

/// Last `count` non-blank lines of a log, oldest first
pub fn last_non_empty_lines(log_path: &Path, count: usize) -> Vec<String> {
    let Ok(bytes) = fs::read(log_path) else {
        return vec![];
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

/// `train_R2` / `val_R2` from a single line; each capture is independent
pub fn parse_metrics_line(line: &str) -> EvalMetrics {
    let capture = |re: &Regex| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    EvalMetrics {
        train_r2: capture(&TRAIN_R2_RE),
        val_r2: capture(&VAL_R2_RE),
    }
}

/// Metrics from the final non-blank line of a log
pub fn parse_final_metrics(log_path: &Path) -> EvalMetrics {
    last_non_empty_lines(log_path, 1)
        .first()
        .map(|line| parse_metrics_line(line))
        .unwrap_or_default()
}

/// Position of one phase inside a multi-phase job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpan {
    pub index: u8,
    pub count: u8,
}

impl PhaseSpan {
    pub const SINGLE: PhaseSpan = PhaseSpan { index: 0, count: 1 };

    pub fn new(index: u8, count: u8) -> Self {
        let count = count.max(1);
        Self {
            index: index.min(count - 1),
            count,
        }
    }

    /// Map a phase-local percent into this phase's slice of 0..=100
    pub fn overall(&self, local: u8) -> u8 {
        let local = local.min(100) as u32;
        ((self.index as u32 * 100 + local) / self.count as u32) as u8
    }
}

/// Progress of the phase currently being watched
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub log_path: PathBuf,
    pub target_epochs: u32,
    pub last_epoch: i64,
    pub percent: u8,
}

impl ProgressState {
    pub fn new(log_path: impl Into<PathBuf>, target_epochs: u32) -> Self {
        Self {
            log_path: log_path.into(),
            target_epochs,
            last_epoch: NO_EPOCH,
            percent: 0,
        }
    }

    /// Accept an epoch reading; returns the new percent only when it moved forward
    pub fn observe(&mut self, epoch: i64) -> Option<u8> {
        if epoch <= self.last_epoch {
            return None;
        }
        self.last_epoch = epoch;
        let percent = epoch_percent(epoch, self.target_epochs);
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn poll(&mut self) -> Option<u8> {
        let epoch = parse_latest_epoch(&self.log_path);
        self.observe(epoch)
    }

    /// All budgeted epochs (0-based) have been reported
    pub fn budget_reached(&self) -> bool {
        self.last_epoch >= 0 && self.last_epoch + 1 >= self.target_epochs as i64
    }

    pub fn complete(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_returns_sentinel_not_zero() {
        assert_eq!(latest_epoch_in("loading data\nstarting\n"), NO_EPOCH);
        assert_eq!(latest_epoch_in(""), NO_EPOCH);
    }

    #[test]
    fn test_missing_file_returns_sentinel() {
        assert_eq!(parse_latest_epoch(Path::new("/nonexistent/step.log")), NO_EPOCH);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let text = "epoch = 1 loss 0.5\nepoch = 3 loss 0.4\nepoch = 2 loss 0.45\n";
        assert_eq!(latest_epoch_in(text), 2);
    }

    #[test]
    fn test_garbage_lines_are_ignored() {
        let text = "epoch = 4\nepoch = \nepoch=oops\nepoch = 99999999999999999999999\n";
        assert_eq!(latest_epoch_in(text), 4);
    }

    #[test]
    fn test_parse_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("step2.log");
        fs::write(&log, "epoch = 0\nepoch = 1\n").unwrap();
        assert_eq!(parse_latest_epoch(&log), 1);
    }

    #[test]
    fn test_epoch_percent_formula() {
        assert_eq!(epoch_percent(NO_EPOCH, 100), 0);
        assert_eq!(epoch_percent(0, 100), 0);
        assert_eq!(epoch_percent(49, 50), 98);
        assert_eq!(epoch_percent(50, 50), 100);
        assert_eq!(epoch_percent(500, 50), 100);
    }

    #[test]
    fn test_progress_never_moves_backward() {
        let mut state = ProgressState::new("unused.log", 10);
        assert_eq!(state.observe(3), Some(36));
        assert_eq!(state.observe(1), None);
        assert_eq!(state.percent, 36);
        assert_eq!(state.observe(3), None);
        assert_eq!(state.observe(4), Some(45));
    }

    #[test]
    fn test_budget_reached_after_last_epoch() {
        let mut state = ProgressState::new("unused.log", 3);
        assert!(!state.budget_reached());
        state.observe(1);
        assert!(!state.budget_reached());
        state.observe(2);
        assert!(state.budget_reached());
    }

    #[test]
    fn test_phase_span_halves() {
        let first = PhaseSpan::new(0, 2);
        let second = PhaseSpan::new(1, 2);
        assert_eq!(first.overall(0), 0);
        assert_eq!(first.overall(100), 50);
        assert_eq!(second.overall(0), 50);
        assert_eq!(second.overall(98), 99);
        assert_eq!(second.overall(100), 100);
        assert_eq!(PhaseSpan::SINGLE.overall(42), 42);
    }

    #[test]
    fn test_metrics_are_independent_captures() {
        let both = parse_metrics_line("done: train_R2 = 0.91, val_R2 = 0.85");
        assert_eq!(both.train_r2, Some(0.91));
        assert_eq!(both.val_r2, Some(0.85));
        assert!(both.is_complete());

        let only_val = parse_metrics_line("val_R2 = -0.2");
        assert_eq!(only_val.train_r2, None);
        assert_eq!(only_val.val_r2, Some(-0.2));

        assert_eq!(parse_metrics_line("finished"), EvalMetrics::default());
    }

    #[test]
    fn test_final_metrics_use_last_non_blank_line() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("step2.log");
        fs::write(&log, "train_R2 = 0.1 val_R2 = 0.1\ntrain_R2 = 0.7 val_R2 = 0.6\n\n  \n").unwrap();

        let metrics = parse_final_metrics(&log);
        assert_eq!(metrics.train_r2, Some(0.7));
        assert_eq!(metrics.val_r2, Some(0.6));
    }

    #[test]
    fn test_tail_keeps_newest_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("step1.log");
        let body: String = (0..30).map(|i| format!("line {}\n\n", i)).collect();
        fs::write(&log, body).unwrap();

        let tail = last_non_empty_lines(&log, 20);
        assert_eq!(tail.len(), 20);
        assert_eq!(tail.first().unwrap(), "line 10");
        assert_eq!(tail.last().unwrap(), "line 29");
    }
}
