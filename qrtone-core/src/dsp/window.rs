// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `window` module implements offset-aware window functions.
//!
//! Tone windows are processed in chunks as samples stream in, so each function takes the chunk's
//! offset into the logical window rather than requiring the whole window at once.

use std::f64::consts::PI;

/// Apply a Hann envelope to `signal`, a chunk starting `offset` samples into a window of
/// `window_length` samples.
pub fn hann_window(signal: &mut [f32], window_length: usize, offset: usize) {
    for (i, sample) in signal.iter_mut().enumerate() {
        let n = offset + i;
        if n >= window_length {
            break;
        }
        let value = 0.5 - 0.5 * ((2.0 * PI * n as f64) / (window_length as f64 - 1.0)).cos();
        *sample = (f64::from(*sample) * value) as f32;
    }
}

/// Apply a Tukey (tapered cosine) envelope to `signal`, a chunk starting `offset` samples into a
/// window of `window_length` samples. `alpha` in `[0, 1]` is the fraction of the window inside
/// the cosine tapers.
pub fn tukey_window(signal: &mut [f32], alpha: f64, window_length: usize, offset: usize) {
    let index_begin_flat = ((alpha * (window_length as f64 - 1.0)) / 2.0).floor() as usize;
    let index_end_flat = window_length - index_begin_flat;

    // Rising taper.
    for i in offset..(index_begin_flat + 1).min(offset + signal.len()) {
        let value =
            0.5 * (1.0 + (PI * (-1.0 + 2.0 * i as f64 / alpha / (window_length as f64 - 1.0))).cos());
        signal[i - offset] = (f64::from(signal[i - offset]) * value) as f32;
    }

    // Falling taper.
    for i in offset.max(index_end_flat.saturating_sub(1))..window_length.min(offset + signal.len()) {
        let value = 0.5
            * (1.0
                + (PI * (-2.0 / alpha + 1.0 + 2.0 * i as f64 / alpha / (window_length as f64 - 1.0)))
                    .cos());
        signal[i - offset] = (f64::from(signal[i - offset]) * value) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::{hann_window, tukey_window};

    #[test]
    fn verify_hann_shape() {
        let mut signal = vec![1.0f32; 1024];
        hann_window(&mut signal, 1024, 0);

        // Endpoints vanish, the centre is close to unity, and the window is symmetric.
        assert!(signal[0].abs() < 1e-6);
        assert!(signal[1023].abs() < 1e-6);
        assert!((signal[511] - 1.0).abs() < 1e-4);
        for i in 0..512 {
            assert!((signal[i] - signal[1023 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn verify_hann_chunked_equals_whole() {
        let source: Vec<f32> = (0..500).map(|i| (i as f32 * 0.37).sin()).collect();

        let mut whole = source.clone();
        hann_window(&mut whole, 500, 0);

        let mut chunked = source;
        for offset in (0..500).step_by(97) {
            let end = (offset + 97).min(500);
            hann_window(&mut chunked[offset..end], 500, offset);
        }

        assert_eq!(whole, chunked);
    }

    #[test]
    fn verify_tukey_flat_top() {
        let mut signal = vec![1.0f32; 1000];
        tukey_window(&mut signal, 0.5, 1000, 0);

        // With alpha = 0.5 the middle half of the window is untouched.
        assert!(signal[0].abs() < 1e-6);
        for &value in &signal[300..700] {
            assert_eq!(value, 1.0);
        }
        assert!(signal[999].abs() < 1e-3);
    }

    #[test]
    fn verify_tukey_chunked_equals_whole() {
        let source: Vec<f32> = (0..640).map(|i| (i as f32 * 0.11).cos()).collect();

        let mut whole = source.clone();
        tukey_window(&mut whole, 0.5, 640, 0);

        let mut chunked = source;
        for offset in (0..640).step_by(128) {
            let end = (offset + 128).min(640);
            tukey_window(&mut chunked[offset..end], 0.5, 640, offset);
        }

        assert_eq!(whole, chunked);
    }
}
