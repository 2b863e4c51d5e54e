//! Append-only output sink.
//!
//! Line ids keep counting across generations: a recycled generation starts
//! its log with [`OutputLog::continuing`] from the previous log.

use serde::{Deserialize, Serialize};

use crate::record::OutputLine;

/// The output lines written during one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputLog {
    lines: Vec<OutputLine>,
    next_id: u64,
}

impl OutputLog {
    /// An empty log whose first line gets id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty log that continues the id counter of `previous`.
    pub fn continuing(previous: &OutputLog) -> Self {
        Self {
            lines: Vec::new(),
            next_id: previous.next_id,
        }
    }

    /// Append a line and return it.
    pub fn write(&mut self, kind: impl Into<String>, data: serde_json::Value) -> OutputLine {
        let line = OutputLine {
            id: self.next_id,
            kind: kind.into(),
            data,
        };
        self.next_id += 1;
        self.lines.push(line.clone());
        line
    }

    /// Lines in write order.
    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Id the next line will get.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
