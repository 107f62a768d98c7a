//! Bounded line buffer
//!
//! FIFO ring of delivered lines. Escape sequences captured in markup mode are
//! stored verbatim.

use std::collections::VecDeque;

/// Ring buffer of the most recently delivered lines
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    /// Maximum number of lines to store
    max_lines: usize,
    /// Bytes of line content currently stored
    total_bytes: usize,
}

impl LineBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            total_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Append a line, evicting the oldest when full
    pub fn push_line(&mut self, line: String) {
        if self.max_lines == 0 {
            return;
        }

        if self.lines.len() >= self.max_lines {
            if let Some(removed) = self.lines.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(removed.len());
            }
        }

        self.total_bytes += line.len();
        self.lines.push_back(line);
    }

    pub fn extend<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.push_line(line);
        }
    }

    /// The last `n` lines, oldest first
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &str> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(|s| s.as_str())
    }

    /// Occupancy as a percentage of capacity
    pub fn usage_percent(&self) -> f64 {
        if self.max_lines == 0 {
            return 0.0;
        }
        self.lines.len() as f64 / self.max_lines as f64 * 100.0
    }

    /// Estimate memory usage of this buffer
    pub fn estimate_memory(&self) -> usize {
        // VecDeque header + string contents + string object overhead
        std::mem::size_of::<VecDeque<String>>()
            + self.total_bytes
            + self.lines.len() * std::mem::size_of::<String>()
    }
}
