//! Cycling color assignment for newly added skeletons.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::Color;

/// Distinguishable colors handed out to new skeletons, in cycle order.
const CYCLE: &[Color] = &[
    Color::new(1.0, 1.0, 0.0),   // yellow
    Color::new(1.0, 0.0, 1.0),   // magenta
    Color::new(0.0, 1.0, 1.0),   // cyan
    Color::new(1.0, 0.0, 0.0),   // red
    Color::new(0.0, 1.0, 0.0),   // green
    Color::new(0.3, 0.5, 1.0),   // light blue
    Color::new(1.0, 0.5, 0.0),   // orange
    Color::new(0.5, 0.0, 1.0),   // purple
    Color::new(0.0, 0.6, 0.3),   // sea green
    Color::new(1.0, 0.7, 0.8),   // pink
    Color::new(0.6, 0.4, 0.2),   // brown
    Color::new(0.5, 0.5, 0.5),   // gray
];

/// Cycling color picker.
///
/// Hands out colors from a fixed table, wrapping around when exhausted.
/// Shared between threads without external locking.
pub struct Palette {
    next_index: AtomicUsize,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// Creates a palette starting at the beginning of the cycle.
    pub fn new() -> Self {
        Self {
            next_index: AtomicUsize::new(0),
        }
    }

    /// Returns the next color in the cycle.
    pub fn next(&self) -> Color {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        CYCLE[index % CYCLE.len()]
    }

    /// Restarts the cycle from the first color.
    pub fn reset(&self) {
        self.next_index.store(0, Ordering::Relaxed);
    }
}
