//! Spreads the rows of a scan grid over a fixed number of host frames. The scheduler only decides
//! which rows a frame owns; the session does the sampling.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Lifecycle of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Prepared,
    Sampling,
    PostProcessing,
    Complete,
}

impl ScanState {
    /// Whether rows can still be sampled in this state
    pub fn can_advance(&self) -> bool {
        matches!(self, ScanState::Prepared | ScanState::Sampling)
    }
}

/// The resume cursor of a frame-sliced scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowScheduler {
    total_rows: usize,
    frame_budget: usize,
    cursor: usize,
    frame: usize,
}

impl RowScheduler {
    /// A scheduler at row zero. A zero `frame_budget` is treated as one frame.
    pub fn new(total_rows: usize, frame_budget: usize) -> Self {
        Self {
            total_rows,
            frame_budget: frame_budget.max(1),
            cursor: 0,
            frame: 0,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn frame_budget(&self) -> usize {
        self.frame_budget
    }

    /// The first row not yet handed out
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of frames which have been handed rows
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Rows handed out per frame before the last one
    pub fn quota(&self) -> usize {
        self.total_rows.div_ceil(self.frame_budget)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.total_rows
    }

    /// Hands out the rows owned by the next frame and moves the cursor past them. Once all rows
    /// have been handed out the range is empty and the cursor no longer moves.
    pub fn next_rows(&mut self) -> Range<usize> {
        if self.is_complete() {
            return self.cursor..self.cursor;
        }

        self.frame += 1;
        let end = end_row(self.total_rows, self.frame_budget, self.frame);
        let rows = self.cursor..end;
        self.cursor = end;
        rows
    }
}

/// The cursor position after `frame` frames. The final budgeted frame always ends on the last
/// row, absorbing whatever the fixed quota left over.
fn end_row(total_rows: usize, frame_budget: usize, frame: usize) -> usize {
    if frame >= frame_budget {
        total_rows
    } else {
        (total_rows.div_ceil(frame_budget) * frame).min(total_rows)
    }
}
