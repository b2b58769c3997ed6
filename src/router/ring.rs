//! Bounded in-memory history of recent lines.

use super::LogLine;
use std::collections::VecDeque;

/// Fixed-capacity FIFO; the oldest line is evicted first.
#[derive(Debug)]
pub struct RingBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, line: LogLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The last `n` lines accepted by `keep`, oldest first.
    pub fn recent<F>(&self, n: usize, keep: F) -> Vec<LogLine>
    where
        F: Fn(&LogLine) -> bool,
    {
        let mut out: Vec<LogLine> = self
            .lines
            .iter()
            .rev()
            .filter(|l| keep(l))
            .take(n)
            .cloned()
            .collect();
        out.reverse();
        out
    }
}
