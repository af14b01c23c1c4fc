//! Enumeration of the sweep: axis, slice position, prephasing step and
//! repeat, in that fixed nesting order (axis outermost, repeat innermost).
//!
//! The order is load-bearing: downstream analysis identifies which timeline
//! segment belongs to which combination purely by index-order
//! reconstruction, there is no metadata in the emitted blocks.

use crate::types::GradientChannel;

/// One combination of the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub axis: GradientChannel,
    /// Unit: `m`
    pub slice_pos: f64,
    /// Index into the prephasing area table
    pub step: usize,
    pub repeat: usize,
}

/// Lazy, restartable cartesian-product iterator over the sweep.
#[derive(Debug, Clone)]
pub struct Sweep {
    axes: Vec<GradientChannel>,
    slice_positions: Vec<f64>,
    steps: usize,
    repeats: usize,
    cursor: usize,
}

impl Sweep {
    pub fn new(
        axes: Vec<GradientChannel>,
        slice_positions: Vec<f64>,
        steps: usize,
        repeats: usize,
    ) -> Self {
        Self {
            axes,
            slice_positions,
            steps,
            repeats,
            cursor: 0,
        }
    }

    /// Total number of combinations.
    pub fn len(&self) -> usize {
        self.axes.len() * self.slice_positions.len() * self.steps * self.repeats
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl Iterator for Sweep {
    type Item = SweepPoint;

    fn next(&mut self) -> Option<SweepPoint> {
        if self.cursor >= Sweep::len(self) {
            return None;
        }

        // Decompose the flat cursor, innermost level first
        let mut idx = self.cursor;
        self.cursor += 1;
        let repeat = idx % self.repeats;
        idx /= self.repeats;
        let step = idx % self.steps;
        idx /= self.steps;
        let slice = idx % self.slice_positions.len();
        idx /= self.slice_positions.len();

        Some(SweepPoint {
            axis: self.axes[idx],
            slice_pos: self.slice_positions[slice],
            step,
            repeat,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = Sweep::len(self) - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Sweep {}
