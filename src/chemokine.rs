//! Rolling min/max window over chemokine readings.
//!
//! Each new reading is written into a fixed-size circular buffer and then scaled against
//! the smallest and largest value currently held, giving a level in `[0, 100]`. Whether
//! one window is shared by all cells or each cell keeps its own is decided by
//! [`WindowScope`](immune_common::WindowScope).

use immune_common::clamp;

// Spreads smaller than this are treated as a flat window.
const FLAT_SPREAD: f32 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct ChemokineWindow {
    values: Vec<f32>,
    ptr: usize,
    min: f32,
    max: f32,
}

impl ChemokineWindow {
    /// A window of `len` zero samples. `len` is raised to at least 1.
    pub fn new(len: usize) -> Self {
        Self { values: vec![0.0; len.max(1)], ptr: 0, min: 0.0, max: 0.0 }
    }

    /// Window length to allocate for `cell_count` cells, or `None` when there are not
    /// more cells than `threshold`.
    pub fn allocation_for(cell_count: usize, threshold: u32) -> Option<usize> {
        (cell_count > threshold as usize).then_some(cell_count)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Writes `value` at the write pointer, refreshes min/max over the whole buffer and
    /// returns the normalized level of `value` in `[0, 100]`.
    pub fn record(&mut self, value: f32) -> f32 {
        self.values[self.ptr] = value;
        self.ptr = (self.ptr + 1) % self.values.len();

        let (min, max) = self
            .values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        self.min = min;
        self.max = max;

        inverse_lerp(self.min, self.max, value) * 100.0
    }
}

/// Position of `value` between `min` and `max`, clamped to `[0, 1]`. A flat range yields 0.
pub fn inverse_lerp(min: f32, max: f32, value: f32) -> f32 {
    let spread = max - min;
    if spread.abs() < FLAT_SPREAD {
        return 0.0;
    }
    clamp((value - min) / spread, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_only_above_threshold() {
        assert_eq!(ChemokineWindow::allocation_for(5, 5), None);
        assert_eq!(ChemokineWindow::allocation_for(6, 5), Some(6));
    }

    #[test]
    fn flat_window_normalizes_to_zero() {
        let mut window = ChemokineWindow::new(3);
        assert_eq!(window.record(0.0), 0.0);
        for _ in 0..3 {
            window.record(4.0);
        }
        assert_eq!(window.min(), 4.0);
        assert_eq!(window.max(), 4.0);
        assert_eq!(window.record(4.0), 0.0);
    }

    #[test]
    fn levels_track_position_in_window() {
        let mut window = ChemokineWindow::new(4);
        // Buffer starts at zeros, so the first positive reading is the maximum.
        assert_eq!(window.record(2.0), 100.0);
        assert_eq!(window.record(1.0), 50.0);
        assert_eq!(window.record(0.0), 0.0);
    }

    #[test]
    fn old_samples_fall_out_of_the_window() {
        let mut window = ChemokineWindow::new(2);
        window.record(10.0);
        window.record(5.0);
        // Overwrites 10.0
        let level = window.record(6.0);
        assert_eq!(window.max(), 6.0);
        assert_eq!(window.min(), 5.0);
        assert_eq!(level, 100.0);
    }
}
