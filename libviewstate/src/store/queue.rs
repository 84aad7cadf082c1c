//! Ordered action queue with an append-only history

use std::collections::VecDeque;

use super::action::{Action, ActionRecord};

/// Pending actions waiting for their dispatch cycle, plus the log of those
/// already applied.
///
/// Actions leave `pending` strictly in submission order. The history keeps
/// the most recent `history_limit` records (0 keeps everything).
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: VecDeque<ActionRecord>,
    applied: VecDeque<ActionRecord>,
    history_limit: usize,
}

impl ActionQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            applied: VecDeque::new(),
            history_limit,
        }
    }

    /// Stamp and enqueue an action, returning its sequence number.
    pub fn submit(&mut self, action: Action) -> u64 {
        let record = ActionRecord::new(action);
        let seq = record.seq;
        self.pending.push_back(record);
        seq
    }

    /// Next action to apply, oldest first.
    pub fn take_next(&mut self) -> Option<ActionRecord> {
        self.pending.pop_front()
    }

    pub fn record_applied(&mut self, record: ActionRecord) {
        self.applied.push_back(record);
        if self.history_limit > 0 {
            while self.applied.len() > self.history_limit {
                self.applied.pop_front();
            }
        }
    }

    pub fn history(&self) -> Vec<ActionRecord> {
        self.applied.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
