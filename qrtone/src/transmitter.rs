// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `transmitter` module renders a payload into its acoustic waveform.

use std::f64::consts::PI;
use std::ops::Range;

use qrtone_core::dsp::window::{hann_window, tukey_window};
use qrtone_core::ecc::{GaloisField, ReedSolomonEncoder};
use qrtone_core::errors::{unsupported_error, Result};

use crate::header::{FrameHeader, HEADER_ECC_SYMBOLS, HEADER_SYMBOLS};
use crate::payload::{payload_to_symbols, Symbol};
use crate::{
    compute_frequencies, EccLevel, ToneTiming, DEFAULT_ECC_LEVEL, FREQUENCY_ROOT, NUM_FREQUENCIES,
    TUKEY_ALPHA,
};

/// Renders the waveform of a planned frame, in caller-sized chunks.
///
/// `set_payload` fixes the symbol plan and reports the exact sample count of the waveform;
/// `get_samples` may then be called for arbitrary, overlapping, or out-of-order sample ranges,
/// so the host can stream the signal out of any buffer size it likes.
pub struct Transmitter {
    timing: ToneTiming,
    frequencies: [f64; NUM_FREQUENCIES],
    gate1_frequency: f64,
    gate2_frequency: f64,
    symbols: Vec<Symbol>,
    encoder: ReedSolomonEncoder,
}

impl Transmitter {
    /// Create a transmitter rendering at `sample_rate` Hz.
    pub fn new(sample_rate: f64) -> Transmitter {
        let frequencies = compute_frequencies();

        Transmitter {
            timing: ToneTiming::new(sample_rate),
            frequencies,
            gate1_frequency: frequencies[FREQUENCY_ROOT],
            gate2_frequency: frequencies[FREQUENCY_ROOT + 2],
            symbols: Vec::new(),
            encoder: ReedSolomonEncoder::new(GaloisField::new(0x13, 16, 1)),
        }
    }

    /// Plan a frame with the default ECC level and a payload CRC trailer. Returns the total
    /// sample count of the waveform.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<usize> {
        self.set_payload_ext(payload, DEFAULT_ECC_LEVEL, true)
    }

    /// Plan a frame with an explicit ECC level and CRC choice. Returns the total sample count
    /// of the waveform.
    pub fn set_payload_ext(
        &mut self,
        payload: &[u8],
        ecc_level: EccLevel,
        add_crc: bool,
    ) -> Result<usize> {
        if payload.len() > usize::from(u8::MAX) {
            return unsupported_error("payload larger than 255 bytes");
        }
        if payload.is_empty() && !add_crc {
            // Without the trailer an empty payload would put nothing at all on the wire.
            return unsupported_error("empty payload requires the crc trailer");
        }

        let header = FrameHeader::new(payload.len() as u8, ecc_level, add_crc);

        let mut symbols = Vec::with_capacity(HEADER_SYMBOLS + header.number_of_symbols);
        symbols.extend(payload_to_symbols(
            &mut self.encoder,
            &header.encode(),
            HEADER_SYMBOLS,
            HEADER_ECC_SYMBOLS,
            false,
        )?);
        symbols.extend(payload_to_symbols(
            &mut self.encoder,
            payload,
            ecc_level.block_symbols(),
            ecc_level.ecc_symbols(),
            add_crc,
        )?);
        self.symbols = symbols;

        Ok(self.timing.frame_sample_count(self.symbols.len()))
    }

    /// Render waveform samples `[offset, offset + samples.len())` into `samples`, scaled to a
    /// peak amplitude of `power_peak`. The buffer is overwritten; regions outside any tone are
    /// silence.
    pub fn get_samples(&self, samples: &mut [f32], offset: usize, power_peak: f64) {
        for sample in samples.iter_mut() {
            *sample = 0.0;
        }

        let mut cursor = 0usize;

        self.render_gate(samples, offset, cursor, self.gate1_frequency, power_peak);
        cursor += self.timing.gate_length;
        if cursor > offset + samples.len() {
            return;
        }

        self.render_gate(samples, offset, cursor, self.gate2_frequency, power_peak);
        cursor += self.timing.gate_length;
        if cursor > offset + samples.len() {
            return;
        }

        for pair in self.symbols.chunks_exact(2) {
            cursor += self.timing.word_silence_length;

            let f1 = self.frequencies[usize::from(pair[0].0)];
            let f2 = self.frequencies[usize::from(pair[1].0) + FREQUENCY_ROOT];
            self.render_word(samples, offset, cursor, [f1, f2], power_peak);

            cursor += self.timing.word_length;
            if cursor > offset + samples.len() {
                return;
            }
        }
    }

    /// Intersection of a tone segment `[start, start + length)` with the requested chunk
    /// `[offset, offset + out_len)`, as a buffer range plus the offset into the segment.
    fn segment_window(
        out_len: usize,
        offset: usize,
        start: usize,
        length: usize,
    ) -> Option<(Range<usize>, usize)> {
        let begin = start.max(offset);
        let end = (start + length).min(offset + out_len);
        if begin >= end {
            return None;
        }
        Some((begin - offset..end - offset, begin - start))
    }

    fn render_gate(
        &self,
        samples: &mut [f32],
        offset: usize,
        start: usize,
        frequency: f64,
        power_peak: f64,
    ) {
        if let Some((range, tone_offset)) =
            Self::segment_window(samples.len(), offset, start, self.timing.gate_length)
        {
            let chunk = &mut samples[range];
            self.generate_pitch(chunk, tone_offset, frequency, power_peak);
            hann_window(chunk, self.timing.gate_length, tone_offset);
        }
    }

    fn render_word(
        &self,
        samples: &mut [f32],
        offset: usize,
        start: usize,
        frequencies: [f64; 2],
        power_peak: f64,
    ) {
        if let Some((range, tone_offset)) =
            Self::segment_window(samples.len(), offset, start, self.timing.word_length)
        {
            let chunk = &mut samples[range];
            for &frequency in &frequencies {
                // Two simultaneous tones at half amplitude each.
                self.generate_pitch(chunk, tone_offset, frequency, power_peak / 2.0);
            }
            tukey_window(chunk, TUKEY_ALPHA, self.timing.word_length, tone_offset);
        }
    }

    fn generate_pitch(&self, samples: &mut [f32], tone_offset: usize, frequency: f64, power_peak: f64) {
        let t_step = 1.0 / self.timing.sample_rate;
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample +=
                (((tone_offset + i) as f64 * t_step * 2.0 * PI * frequency).sin() * power_peak) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Transmitter;
    use crate::EccLevel;

    #[test]
    fn verify_sample_count() {
        let mut transmitter = Transmitter::new(44100.0);
        let total = transmitter.set_payload_ext(b"!0BSduvwxyz", EccLevel::Q, true).unwrap();

        // 11 payload bytes + 2 CRC bytes yield 5 level-Q blocks: 26 data + 30 parity symbols,
        // plus the 8-symbol header block; 32 words in all behind the two gates.
        let gate_length = (44100.0 * 0.12) as usize;
        let word_length = (44100.0 * 0.06) as usize;
        let silence_length = (44100.0 * 0.01) as usize;
        assert_eq!(total, 2 * gate_length + 32 * (word_length + silence_length));
    }

    #[test]
    fn verify_payload_length_limits() {
        let mut transmitter = Transmitter::new(44100.0);
        assert!(transmitter.set_payload(&[0u8; 256]).is_err());
        assert!(transmitter.set_payload(&[0u8; 255]).is_ok());

        // An empty payload is representable, but only with the CRC trailer carrying symbols.
        assert!(transmitter.set_payload(&[]).is_ok());
        assert!(transmitter.set_payload_ext(&[], EccLevel::Q, false).is_err());
    }

    #[test]
    fn verify_chunked_rendering_matches_whole() {
        let mut transmitter = Transmitter::new(16000.0);
        let total = transmitter.set_payload(b"chunked").unwrap();

        let mut whole = vec![0.0f32; total];
        transmitter.get_samples(&mut whole, 0, 0.5);

        // Odd-sized, restarted chunks must reproduce the exact same signal.
        let mut chunked = vec![0.0f32; total];
        let mut offset = 0;
        while offset < total {
            let len = 777.min(total - offset);
            transmitter.get_samples(&mut chunked[offset..offset + len], offset, 0.5);
            offset += len;
        }

        assert_eq!(whole, chunked);
    }

    #[test]
    fn verify_waveform_stays_within_peak() {
        let mut transmitter = Transmitter::new(44100.0);
        let total = transmitter.set_payload(b"peak").unwrap();

        let mut samples = vec![0.0f32; total];
        transmitter.get_samples(&mut samples, 0, 0.5);

        // Gates are a single full-scale tone; words sum two half-scale tones. Neither may
        // exceed the requested peak.
        let max = samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
        assert!(max <= 0.5 + 1e-6);
        assert!(max > 0.4);
    }

    #[test]
    fn verify_leading_samples_are_gate_tone() {
        let mut transmitter = Transmitter::new(44100.0);
        let total = transmitter.set_payload(b"gate").unwrap();

        let mut samples = vec![0.0f32; total];
        transmitter.get_samples(&mut samples, 0, 0.5);

        // The first gate is Hann windowed: silence at the exact edge, energy shortly after.
        assert!(samples[0].abs() < 1e-6);
        let gate_length = (44100.0 * 0.12) as usize;
        let mid_gate = &samples[gate_length / 2 - 100..gate_length / 2 + 100];
        assert!(mid_gate.iter().any(|&s| s.abs() > 0.2));
    }
}
