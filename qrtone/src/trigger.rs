// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `trigger` module locates the start of a frame in a continuous sample stream.
//!
//! Two reference gate tones open every frame. The analyzer watches both gate frequencies with
//! 50%-overlapped, Hann-windowed Goertzel windows: an `alpha` stream of windows starting at
//! sample 0 and a `beta` stream starting `window_offset` samples later. Both streams push their
//! sound pressure levels into a single history per frequency, so consecutive history slots are
//! `window_offset` samples apart. A peak of the second gate frequency that clears the background
//! noise estimate, while the first gate frequency has already ceased at that instant but was
//! active one gate earlier, marks a frame start. The peak is then refined by parabolic
//! interpolation to within about one sample.

use std::collections::VecDeque;

use log::debug;

use qrtone_core::dsp::goertzel::Goertzel;
use qrtone_core::dsp::peak::{refine_peak_location, PeakFinder};
use qrtone_core::dsp::percentile::Percentile;
use qrtone_core::dsp::window::hann_window;

use crate::BACKGROUND_PERCENTILE;

/// Observer invoked with `(total samples processed, SPL at gate 1, SPL at gate 2)` each time an
/// analysis window closes while waiting for a trigger.
pub type LevelCallback = Box<dyn FnMut(u64, f64, f64)>;

/// Sound pressure level of an RMS amplitude.
///
/// Floored so that digitally silent windows stay finite; an unbounded `log10(0)` would feed
/// `-inf` into the noise estimator and stall it with NaN arithmetic.
fn spl(rms: f64) -> f64 {
    20.0 * rms.max(1e-12).log10()
}

/// Ring buffer of recent sound pressure levels, oldest first.
struct SplHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SplHistory {
    fn new(capacity: usize) -> SplHistory {
        SplHistory { values: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn get(&self, index: usize) -> f64 {
        self.values[index]
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

pub(crate) struct TriggerAnalyzer {
    /// Samples consumed of the in-progress window, per stream.
    window_processed: [usize; 2],
    /// Goertzel filters indexed by `[stream][gate frequency]`.
    analyzers: [[Goertzel; 2]; 2],
    background_noise: Percentile,
    spl_history: [SplHistory; 2],
    peak_finder: PeakFinder,
    window_analyze: usize,
    window_offset: usize,
    gate_length: usize,
    total_processed: u64,
    trigger_snr: f64,
    first_tone_location: Option<i64>,
    level_callback: Option<LevelCallback>,
    scratch: Vec<f32>,
}

impl TriggerAnalyzer {
    pub fn new(
        sample_rate: f64,
        gate_length: usize,
        gate_frequencies: [f64; 2],
        trigger_snr: f64,
    ) -> TriggerAnalyzer {
        let window_analyze = gate_length / 3;
        // 50% overlap between the alpha and beta window streams.
        let window_offset = window_analyze / 2;

        let make = |frequency: f64| Goertzel::new(sample_rate, frequency, window_analyze);
        let slope_windows = (gate_length / window_offset / 2).saturating_sub(1).max(1) as u32;

        TriggerAnalyzer {
            window_processed: [0; 2],
            analyzers: [
                [make(gate_frequencies[0]), make(gate_frequencies[1])],
                [make(gate_frequencies[0]), make(gate_frequencies[1])],
            ],
            background_noise: Percentile::new(BACKGROUND_PERCENTILE),
            spl_history: [
                SplHistory::new(gate_length * 3 / window_offset),
                SplHistory::new(gate_length * 3 / window_offset),
            ],
            peak_finder: PeakFinder::new(slope_windows, slope_windows),
            window_analyze,
            window_offset,
            gate_length,
            total_processed: 0,
            trigger_snr,
            first_tone_location: None,
            level_callback: None,
            scratch: Vec::new(),
        }
    }

    /// Sample index, in the analyzer's own coordinates, of the first symbol region. Set once a
    /// trigger has been recognised.
    pub fn first_tone_location(&self) -> Option<i64> {
        self.first_tone_location
    }

    /// Total samples consumed since creation or the last reset.
    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    /// Largest chunk that fits entirely within both in-progress windows.
    pub fn maximum_window_length(&self) -> usize {
        (self.window_analyze - self.window_processed[0])
            .min(self.window_analyze - self.window_processed[1])
    }

    pub fn set_level_callback(&mut self, callback: Option<LevelCallback>) {
        self.level_callback = callback;
    }

    /// Drop all per-frame state. The background noise estimate survives across frames.
    pub fn reset(&mut self) {
        self.first_tone_location = None;
        self.peak_finder.reset();
        self.window_processed = [0; 2];
        self.total_processed = 0;
        for stream in self.analyzers.iter_mut() {
            for analyzer in stream.iter_mut() {
                analyzer.reset();
            }
        }
        for history in self.spl_history.iter_mut() {
            history.clear();
        }
    }

    /// Feed a chunk of samples to both window streams.
    pub fn process_samples(&mut self, samples: &[f32]) {
        self.process_stream(samples, 0);
        if self.total_processed > self.window_offset as u64 {
            self.process_stream(samples, 1);
        }
        else if self.window_offset as u64 - self.total_processed < samples.len() as u64 {
            // The beta stream starts part-way through this chunk.
            let from = (self.window_offset as u64 - self.total_processed) as usize;
            self.process_stream(&samples[from..], 1);
        }
        self.total_processed += samples.len() as u64;
    }

    fn process_stream(&mut self, samples: &[f32], stream: usize) {
        let mut processed = 0;
        while self.first_tone_location.is_none() && processed < samples.len() {
            let to_process = (samples.len() - processed)
                .min(self.window_analyze - self.window_processed[stream]);

            self.scratch.clear();
            self.scratch.extend_from_slice(&samples[processed..processed + to_process]);
            hann_window(&mut self.scratch, self.window_analyze, self.window_processed[stream]);
            for analyzer in self.analyzers[stream].iter_mut() {
                analyzer.process_samples(&self.scratch);
            }

            processed += to_process;
            self.window_processed[stream] += to_process;

            if self.window_processed[stream] == self.window_analyze {
                self.window_processed[stream] = 0;

                let mut spl_levels = [0.0f64; 2];
                for (id_freq, level) in spl_levels.iter_mut().enumerate() {
                    *level = spl(self.analyzers[stream][id_freq].compute_rms());
                    self.spl_history[id_freq].push(*level);
                }
                if let Some(callback) = self.level_callback.as_mut() {
                    callback(self.total_processed + processed as u64, spl_levels[0], spl_levels[1]);
                }
                self.background_noise.add(spl_levels[1]);

                let location =
                    self.total_processed as i64 + processed as i64 - self.window_analyze as i64;
                if self.peak_finder.add(location, spl_levels[1]) {
                    self.check_trigger(location);
                }
            }
        }
    }

    /// A second-gate peak was committed; verify the full two-tone gate pattern around it.
    fn check_trigger(&mut self, location: i64) {
        let element_index = self.peak_finder.last_peak_index();
        let element_value = self.peak_finder.last_peak_value();

        if element_value <= self.background_noise.result() + self.trigger_snr {
            return;
        }
        let threshold = element_value - self.trigger_snr;

        let wo = self.window_offset as i64;
        let history_len = self.spl_history[1].len() as i64;
        let peak_index = history_len - 1 - (location / wo - element_index / wo);
        if peak_index <= 0 || peak_index + 1 >= history_len {
            return;
        }
        let peak_index = peak_index as usize;

        // At the peak the first tone must have ceased.
        if self.spl_history[0].get(peak_index) >= threshold {
            return;
        }

        // One gate earlier the first tone must have been active, and the second not yet.
        let first_peak_index = peak_index as i64 - (self.gate_length as i64 / wo);
        if first_peak_index < 0 || first_peak_index >= self.spl_history[0].len() as i64 {
            return;
        }
        let first_peak_index = first_peak_index as usize;
        if self.spl_history[0].get(first_peak_index) <= threshold {
            return;
        }
        if self.spl_history[1].get(first_peak_index) >= threshold {
            return;
        }

        // All gate conditions hold: refine the second-gate peak position.
        let peak_location = refine_peak_location(
            self.spl_history[1].get(peak_index - 1),
            self.spl_history[1].get(peak_index),
            self.spl_history[1].get(peak_index + 1),
            element_index,
            self.window_offset,
        );
        let first_tone_location = peak_location + self.gate_length as i64 / 2 + wo;
        debug!("gate tones recognised, symbols start at analyzer sample {}", first_tone_location);
        self.first_tone_location = Some(first_tone_location);
    }
}
