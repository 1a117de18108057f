//! Blocking search of the pending queue for a specific response.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::journal::Journal;
use crate::line::Line;

const WAITER_TARGET: &str = "biolink_sensor::waiter";

/// Claims the first pending line accepted by a predicate.
///
/// Lines that do not match are consumed and dropped from the queue; they
/// remain visible in the log.
#[derive(Debug, Clone, Copy)]
pub struct ResponseWaiter<'a> {
    journal: &'a Journal,
}

impl<'a> ResponseWaiter<'a> {
    /// Creates a waiter over `journal`.
    #[must_use]
    pub const fn new(journal: &'a Journal) -> Self {
        Self { journal }
    }

    /// Waits up to `timeout` for a line satisfying `predicate`.
    pub fn wait_for<P>(&self, predicate: P, timeout: Duration) -> Option<Line>
    where
        P: Fn(&Line) -> bool,
    {
        self.wait_until(predicate, Instant::now() + timeout)
    }

    /// Waits until `deadline` for a line satisfying `predicate`.
    pub fn wait_until<P>(&self, predicate: P, deadline: Instant) -> Option<Line>
    where
        P: Fn(&Line) -> bool,
    {
        while let Some(line) = self.journal.next_pending(deadline) {
            if predicate(&line) {
                return Some(line);
            }
            trace!(
                target: WAITER_TARGET,
                line = line.text(),
                "skipping uncorrelated line"
            );
        }
        None
    }
}
