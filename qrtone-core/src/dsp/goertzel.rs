// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `goertzel` module implements single-bin spectral analysis.

use std::f64;

use num_complex::Complex64;

/// Generalized Goertzel filter.
///
/// Measures the RMS amplitude of a single frequency over a fixed-length window of samples fed in
/// arbitrarily sized chunks. The generalized form supports frequencies that are not an integer
/// multiple of the bin spacing by correcting the phase of the final state, per \[1\].
///
/// \[1\] P. Sysel and P. Rajmic, "Goertzel algorithm generalized to non-integer multiples of
///       fundamental frequency", EURASIP Journal on Advances in Signal Processing, 2012.
///
/// <https://doi.org/10.1186/1687-6180-2012-56>
pub struct Goertzel {
    s0: f64,
    s1: f64,
    s2: f64,
    cos_pik_term2: f64,
    pik_term: f64,
    last_sample: f64,
    window_size: usize,
    processed_samples: usize,
}

impl Goertzel {
    /// Instantiate a filter for `frequency` over windows of `window_size` samples.
    pub fn new(sample_rate: f64, frequency: f64, window_size: usize) -> Goertzel {
        // Bin the frequency against the actual sample rate of the signal.
        let sampling_rate_factor = window_size as f64 / sample_rate;
        let pik_term = 2.0 * f64::consts::PI * (frequency * sampling_rate_factor) / window_size as f64;

        Goertzel {
            s0: 0.0,
            s1: 0.0,
            s2: 0.0,
            cos_pik_term2: pik_term.cos() * 2.0,
            pik_term,
            last_sample: 0.0,
            window_size,
            processed_samples: 0,
        }
    }

    /// Clear the filter state and begin a new window.
    pub fn reset(&mut self) {
        self.s0 = 0.0;
        self.s1 = 0.0;
        self.s2 = 0.0;
        self.last_sample = 0.0;
        self.processed_samples = 0;
    }

    /// The configured window length in samples.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Samples of the current window consumed so far.
    pub fn processed_samples(&self) -> usize {
        self.processed_samples
    }

    /// Feed a chunk of the current window.
    ///
    /// A chunk that would overrun the window is ignored wholesale. The final sample of the window
    /// is held back and folded in by [`Goertzel::compute_rms`].
    pub fn process_samples(&mut self, samples: &[f32]) {
        if self.processed_samples + samples.len() > self.window_size {
            return;
        }

        let mut size = samples.len();
        if self.processed_samples + samples.len() == self.window_size {
            size -= 1;
            self.last_sample = f64::from(samples[size]);
        }

        for &sample in &samples[..size] {
            self.s0 = f64::from(sample) + self.cos_pik_term2 * self.s1 - self.s2;
            self.s2 = self.s1;
            self.s1 = self.s0;
        }

        self.processed_samples += samples.len();
    }

    /// Close the window: compute the RMS amplitude at the target frequency, then reset.
    pub fn compute_rms(&mut self) -> f64 {
        let s0 = self.last_sample + self.cos_pik_term2 * self.s1 - self.s2;

        // Substitute the final recurrence iteration with a complex multiplication, correcting the
        // phase for (potentially) non-integer valued frequencies at the same time.
        let cc = Complex64::from_polar(1.0, -self.pik_term);
        let part_a = Complex64::new(s0, 0.0) - Complex64::new(self.s1, 0.0) * cc;
        let part_b = Complex64::from_polar(1.0, -self.pik_term * (self.window_size as f64 - 1.0));
        let y = part_a * part_b;

        let rms = (y.norm_sqr() * 2.0).sqrt() / self.window_size as f64;
        self.reset();
        rms
    }
}
