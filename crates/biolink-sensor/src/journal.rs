//! Shared state between the ingest loop and command callers.
//!
//! The log and the pending queue sit behind one mutex so every published
//! line lands in both or neither. A condition variable wakes waiters as soon
//! as the ingest loop publishes, so nobody polls on a fixed interval.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use tracing::debug;

use crate::line::Line;
use crate::log_store::LogStore;
use crate::pending::PendingQueue;

const JOURNAL_TARGET: &str = "biolink_sensor::journal";

#[derive(Debug)]
struct JournalState {
    log: LogStore,
    pending: PendingQueue,
}

/// Log plus pending queue, safe to share between threads.
#[derive(Debug)]
pub struct Journal {
    state: Mutex<JournalState>,
    arrivals: Condvar,
}

impl Journal {
    /// Creates an empty journal with the given bounds.
    #[must_use]
    pub fn new(log_capacity: usize, pending_capacity: usize) -> Self {
        Self {
            state: Mutex::new(JournalState {
                log: LogStore::with_capacity(log_capacity),
                pending: PendingQueue::with_capacity(pending_capacity),
            }),
            arrivals: Condvar::new(),
        }
    }

    /// Records an inbound line in the log and offers it to waiters.
    pub fn publish(&self, line: Line) {
        let mut state = self.lock();
        state.log.append(line.clone());
        if state.pending.push(line) {
            debug!(
                target: JOURNAL_TARGET,
                evicted_total = state.pending.evicted(),
                "pending queue full, dropped oldest unclaimed line"
            );
        }
        drop(state);
        self.arrivals.notify_all();
    }

    /// Appends a host-generated status line to the log only.
    ///
    /// Status lines are never offered to waiters, so they can never satisfy
    /// a response pattern.
    pub fn record_status(&self, text: impl Into<String>) -> Line {
        let line = Line::now(text);
        self.lock().log.append(line.clone());
        line
    }

    /// Takes the oldest unclaimed line, blocking until one arrives or
    /// `deadline` passes.
    #[must_use]
    pub fn next_pending(&self, deadline: Instant) -> Option<Line> {
        let mut state = self.lock();
        loop {
            if let Some(line) = state.pending.pop() {
                return Some(line);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .arrivals
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
    }

    /// The newest `limit` log lines, oldest first.
    #[must_use]
    pub fn snapshot(&self, limit: usize) -> Vec<Line> {
        self.lock().log.recent(limit)
    }

    /// Empties the log; unclaimed lines stay available to waiters.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Removes every unclaimed line, oldest first.
    ///
    /// The lines stay in the log.
    #[must_use]
    pub fn drain_pending(&self) -> Vec<Line> {
        self.lock().pending.drain()
    }

    /// Number of lines currently held in the log.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.lock().log.len()
    }

    /// Maximum number of log lines retained.
    #[must_use]
    pub fn log_capacity(&self) -> usize {
        self.lock().log.capacity()
    }

    /// Number of unclaimed lines.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Total lines evicted from the pending queue since startup.
    #[must_use]
    pub fn pending_evictions(&self) -> u64 {
        self.lock().pending.evicted()
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
