//! Queue of lines not yet claimed by a waiting command.

use std::collections::VecDeque;

use crate::line::Line;

/// FIFO of unclaimed lines, bounded with oldest-first eviction.
#[derive(Debug)]
pub(crate) struct PendingQueue {
    lines: VecDeque<Line>,
    capacity: usize,
    evicted: u64,
}

impl PendingQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Enqueues a line; returns `true` when an older line had to be dropped.
    pub(crate) fn push(&mut self, line: Line) -> bool {
        if self.capacity == 0 {
            self.evicted = self.evicted.saturating_add(1);
            return true;
        }
        let mut dropped = false;
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
            self.evicted = self.evicted.saturating_add(1);
            dropped = true;
        }
        self.lines.push_back(line);
        dropped
    }

    /// Removes and returns the oldest unclaimed line.
    pub(crate) fn pop(&mut self) -> Option<Line> {
        self.lines.pop_front()
    }

    /// Removes every unclaimed line, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<Line> {
        self.lines.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) const fn evicted(&self) -> u64 {
        self.evicted
    }
}
