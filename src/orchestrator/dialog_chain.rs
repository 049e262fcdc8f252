// Settings dialog chain
//
// Items are shown one dialog at a time. Each resolution is a separate event,
// so the chain is a queue plus the one request currently waiting for an answer.

use crate::models::JobSetting;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum DialogDecision {
    Accepted(JobSetting),
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDialog {
    pub ticket: u64,
    pub phenotype: String,
}

#[derive(Debug, Default)]
pub struct DialogChain {
    queue: VecDeque<String>,
    pending: Option<PendingDialog>,
    accepted: Vec<(String, JobSetting)>,
    rejected: usize,
}

impl DialogChain {
    pub fn load(&mut self, items: impl IntoIterator<Item = String>) {
        self.clear();
        self.queue.extend(items);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending = None;
        self.accepted.clear();
        self.rejected = 0;
    }

    /// Pop the next item and mark it as waiting for a decision
    pub fn advance(&mut self, ticket: u64) -> Option<&PendingDialog> {
        let phenotype = self.queue.pop_front()?;
        self.pending = Some(PendingDialog { ticket, phenotype });
        self.pending.as_ref()
    }

    /// Apply a decision for the open dialog. Stale tickets are refused.
    pub fn resolve(&mut self, ticket: u64, decision: DialogDecision) -> bool {
        if self.pending.as_ref().map(|p| p.ticket) != Some(ticket) {
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };
        match decision {
            DialogDecision::Accepted(setting) => {
                self.accepted.push((pending.phenotype, setting.normalized()))
            }
            DialogDecision::Rejected => self.rejected += 1,
        }
        true
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn take_accepted(&mut self) -> Vec<(String, JobSetting)> {
        std::mem::take(&mut self.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_and_reject_in_order() {
        let mut chain = DialogChain::default();
        chain.load(vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        assert_eq!(chain.advance(1).unwrap().phenotype, "a");
        assert!(chain.resolve(1, DialogDecision::Accepted(JobSetting::default())));
        assert_eq!(chain.advance(2).unwrap().phenotype, "b");
        assert!(chain.resolve(2, DialogDecision::Rejected));
        assert_eq!(chain.advance(3).unwrap().phenotype, "c");
        assert!(chain.resolve(3, DialogDecision::Accepted(JobSetting::default())));
        assert!(chain.advance(4).is_none());

        let accepted: Vec<String> = chain.take_accepted().into_iter().map(|(p, _)| p).collect();
        assert_eq!(accepted, vec!["a", "c"]);
        assert_eq!(chain.rejected(), 1);
    }

    #[test]
    fn test_stale_ticket_is_refused() {
        let mut chain = DialogChain::default();
        chain.load(vec!["a".to_string()]);
        chain.advance(7);

        assert!(!chain.resolve(6, DialogDecision::Rejected));
        assert!(chain.resolve(7, DialogDecision::Rejected));
        assert!(!chain.resolve(7, DialogDecision::Rejected));
    }

    #[test]
    fn test_duplicates_each_get_a_dialog() {
        let mut chain = DialogChain::default();
        chain.load(vec!["a".to_string(), "a".to_string()]);
        chain.advance(1);
        chain.resolve(1, DialogDecision::Accepted(JobSetting::default()));
        chain.advance(2);
        chain.resolve(2, DialogDecision::Accepted(JobSetting::default()));

        assert_eq!(chain.take_accepted().len(), 2);
    }

    #[test]
    fn test_accepted_values_are_clamped() {
        let mut chain = DialogChain::default();
        chain.load(vec!["a".to_string()]);
        chain.advance(1);
        let mut setting = JobSetting::default();
        setting.net.p2 = 4.0;
        chain.resolve(1, DialogDecision::Accepted(setting));

        assert_eq!(chain.take_accepted()[0].1.net.p2, 1.0);
    }
}
