use chrono::{DateTime, Utc};
use common::utils::now;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::CycleReport;

/// A row that was fetched but never written.
///
/// The watermark moves past such rows, so they are not retried on later
/// cycles. They are kept here for operators instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub table: &'static str,
    pub key: String,
    pub cause: String,
    pub cycle_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded in-memory log of dead letters, oldest evicted first.
#[derive(Debug)]
pub struct DeadLetterLog {
    entries: VecDeque<DeadLetter>,
    capacity: usize,
    evicted: u64,
}

impl DeadLetterLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, letter: DeadLetter) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(letter);
    }

    /// Record every write failure of a cycle. Returns how many were added.
    pub fn record(&mut self, report: &CycleReport) -> usize {
        let recorded_at = now();
        let mut added = 0;
        for (table, failure) in report.failures() {
            self.push(DeadLetter {
                table,
                key: failure.key.clone(),
                cause: failure.cause.clone(),
                cycle_id: report.cycle_id,
                recorded_at,
            });
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeadLetter> {
        self.entries.iter()
    }
}
