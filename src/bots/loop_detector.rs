//! Flags bots that keep revisiting the same few tiles.

use std::collections::VecDeque;

use crate::constants::bot::{HISTORY_CAPACITY, LOOP_THRESHOLD, RECENT_WINDOW};
use crate::util::grid::GridPos;

/// Bounded position history with a repetition check.
///
/// Movement counts as looping when more than 30% of the most recent positions
/// also appear earlier in the history. Comparison is by exact discretized
/// cell, so a steadily advancing path never trips it.
pub struct LoopDetector {
    history: VecDeque<GridPos>,
    capacity: usize,
    recent_window: usize,
    threshold: f32,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY, RECENT_WINDOW, LOOP_THRESHOLD)
    }
}

impl LoopDetector {
    pub fn new(capacity: usize, recent_window: usize, threshold: f32) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            recent_window,
            threshold,
        }
    }

    pub fn record(&mut self, pos: GridPos) {
        self.history.push_back(pos);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    pub fn is_looping(&self) -> bool {
        if self.history.len() < 2 * self.recent_window {
            return false;
        }

        let split = self.history.len() - self.recent_window;
        let mut repeats = 0usize;
        for recent in self.history.iter().skip(split) {
            if self.history.iter().take(split).any(|older| older == recent) {
                repeats += 1;
            }
        }

        (repeats as f32 / self.recent_window as f32) > self.threshold
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
