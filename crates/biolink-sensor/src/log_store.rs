//! Bounded, ordered record of everything seen on the link.

use std::collections::VecDeque;

use crate::line::Line;

/// Keeps the most recent `capacity` lines in arrival order.
#[derive(Debug, Clone)]
pub(crate) struct LogStore {
    lines: VecDeque<Line>,
    capacity: usize,
}

impl LogStore {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a line, evicting the oldest entries beyond capacity.
    pub(crate) fn append(&mut self, line: Line) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// The newest `limit` lines, oldest first.
    pub(crate) fn recent(&self, limit: usize) -> Vec<Line> {
        let skip = self.lines.len().saturating_sub(limit);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.lines.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }
}
