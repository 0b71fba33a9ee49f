// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `peak` module implements local-maximum detection over a streamed series.

/// Streaming local-maximum detector with increase/decrease hysteresis.
///
/// A candidate peak is recorded when the series stops rising after at least
/// `min_increase_count` strictly rising steps. It is committed once `min_decrease_count`
/// non-rising steps follow; if the series rises again earlier the candidate is discarded.
/// With `min_decrease_count <= 1` candidates commit immediately.
pub struct PeakFinder {
    increase: bool,
    old_val: f64,
    old_index: i64,
    added: bool,
    last_peak_value: f64,
    last_peak_index: i64,
    increase_count: u32,
    decrease_count: u32,
    min_increase_count: u32,
    min_decrease_count: u32,
}

impl PeakFinder {
    pub fn new(min_increase_count: u32, min_decrease_count: u32) -> PeakFinder {
        PeakFinder {
            increase: true,
            old_val: f64::MIN,
            old_index: 0,
            added: false,
            last_peak_value: 0.0,
            last_peak_index: 0,
            increase_count: 0,
            decrease_count: 0,
            min_increase_count,
            min_decrease_count,
        }
    }

    /// Discard all series state, keeping the configured thresholds.
    pub fn reset(&mut self) {
        *self = PeakFinder::new(self.min_increase_count, self.min_decrease_count);
    }

    /// Index of the most recently recorded peak.
    pub fn last_peak_index(&self) -> i64 {
        self.last_peak_index
    }

    /// Value of the most recently recorded peak.
    pub fn last_peak_value(&self) -> f64 {
        self.last_peak_value
    }

    /// Feed one observation. Returns true when a peak is committed.
    pub fn add(&mut self, index: i64, value: f64) -> bool {
        let mut committed = false;
        let diff = value - self.old_val;

        if diff <= 0.0 && self.increase {
            // Switch from rising to falling or stalled.
            if self.increase_count >= self.min_increase_count {
                self.last_peak_index = self.old_index;
                self.last_peak_value = self.old_val;
                self.added = true;
                if self.min_decrease_count <= 1 {
                    committed = true;
                }
            }
        }
        else if diff > 0.0 && !self.increase {
            // Rising again: a candidate that has not fallen long enough is discarded.
            if self.added && self.decrease_count < self.min_decrease_count {
                self.last_peak_index = 0;
                self.added = false;
            }
        }

        self.increase = diff > 0.0;
        if self.increase {
            self.increase_count += 1;
            self.decrease_count = 0;
        }
        else {
            self.decrease_count += 1;
            if self.decrease_count >= self.min_decrease_count && self.added {
                self.added = false;
                committed = true;
            }
            self.increase_count = 0;
        }

        self.old_val = value;
        self.old_index = index;
        committed
    }
}

/// Quadratic interpolation of three adjacent, equally spaced samples.
///
/// Returns the abscissa of the fitted parabola's extremum in `[-1, 1]` relative to the centre
/// point.
///
/// <https://www.dsprelated.com/freebooks/sasp/Sinusoidal_Peak_Interpolation.html>
pub fn quadratic_interpolation(p0: f64, p1: f64, p2: f64) -> f64 {
    (p2 - p0) / (2.0 * (2.0 * p1 - p2 - p0))
}

/// Refine the location of a peak from its value `p1` at `p1_location` and the neighbouring
/// values `p0` and `p2` sampled `window_length` apart.
pub fn refine_peak_location(
    p0: f64,
    p1: f64,
    p2: f64,
    p1_location: i64,
    window_length: usize,
) -> i64 {
    let location = quadratic_interpolation(p0, p1, p2);
    p1_location + (location * window_length as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::{refine_peak_location, PeakFinder};

    #[test]
    fn verify_peak_committed() {
        let mut finder = PeakFinder::new(2, 2);

        let series = [0.0, 1.0, 2.0, 5.0, 4.0, 3.0, 2.0];
        let mut commits = Vec::new();
        for (i, &value) in series.iter().enumerate() {
            if finder.add(i as i64, value) {
                commits.push(i);
            }
        }

        // Committed after two falling steps past the maximum at index 3.
        assert_eq!(commits, [5]);
        assert_eq!(finder.last_peak_index(), 3);
        assert_eq!(finder.last_peak_value(), 5.0);
    }

    #[test]
    fn verify_short_dip_discarded() {
        let mut finder = PeakFinder::new(2, 3);

        // The dip after the first maximum is too short, so only the second, higher rise commits
        // a peak.
        let series = [0.0, 1.0, 2.0, 3.0, 2.5, 4.0, 5.0, 4.0, 3.0, 2.0];
        let mut commits = Vec::new();
        for (i, &value) in series.iter().enumerate() {
            if finder.add(i as i64, value) {
                commits.push(i);
            }
        }

        assert_eq!(commits, [9]);
        assert_eq!(finder.last_peak_index(), 6);
    }

    #[test]
    fn verify_commit_on_detection() {
        let mut finder = PeakFinder::new(1, 1);

        assert!(!finder.add(0, 0.0));
        assert!(!finder.add(1, 2.0));
        assert!(finder.add(2, 1.0));
        assert_eq!(finder.last_peak_index(), 1);
    }

    #[test]
    fn verify_peak_refinement() {
        // A symmetric parabola peaks exactly at the centre sample.
        assert_eq!(refine_peak_location(1.0, 4.0, 1.0, 100, 10), 100);
        // A rightward skew moves the estimate towards the right neighbour.
        assert!(refine_peak_location(1.0, 4.0, 3.0, 100, 10) > 100);
    }
}
