// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `receiver` module recovers payloads from a pushed stream of audio samples.

use log::{debug, warn};

use qrtone_core::dsp::goertzel::Goertzel;
use qrtone_core::dsp::window::hann_window;
use qrtone_core::ecc::{GaloisField, ReedSolomonEncoder};

use crate::header::{FrameHeader, HEADER_ECC_SYMBOLS, HEADER_SYMBOLS};
use crate::payload::{symbols_to_payload, Symbol};
use crate::trigger::{LevelCallback, TriggerAnalyzer};
use crate::{
    compute_frequencies, ToneTiming, DEFAULT_TRIGGER_SNR, FREQUENCY_ROOT, NUM_FREQUENCIES,
};

/// A payload recovered from the audio stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    data: Vec<u8>,
    fixed_errors: usize,
}

impl Payload {
    /// The recovered bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of symbol errors the error-correction code repaired across this frame.
    pub fn fixed_errors(&self) -> usize {
        self.fixed_errors
    }

    /// Consume the payload, yielding its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

enum State {
    WaitingTrigger,
    ParsingSymbols,
}

/// Recovers QRTone payloads from a continuous mono sample stream.
///
/// The host pushes samples; the receiver waits for the two-tone gate, then schedules one
/// analysis window per word and reads a symbol pair out of each. Once the header block is in,
/// the payload block count is known and the rest of the frame is collected and decoded. Every
/// failure path resets the receiver silently back to waiting for a gate: a frame is either
/// delivered intact or not at all.
pub struct Receiver {
    state: State,
    timing: ToneTiming,
    trigger: TriggerAnalyzer,
    /// One Goertzel per bank frequency, all sharing the word window.
    analyzers: Vec<Goertzel>,
    symbols_cache: Vec<Symbol>,
    header_cache: Option<FrameHeader>,
    /// Absolute sample index of the symbol region of the current frame.
    first_tone_sample_index: i64,
    pushed_samples: i64,
    symbol_index: usize,
    fixed_errors: usize,
    encoder: ReedSolomonEncoder,
    scratch: Vec<f32>,
}

impl Receiver {
    /// Create a receiver for a mono stream at `sample_rate` Hz.
    pub fn new(sample_rate: f64) -> Receiver {
        let timing = ToneTiming::new(sample_rate);
        let frequencies = compute_frequencies();
        let gate_frequencies = [frequencies[FREQUENCY_ROOT], frequencies[FREQUENCY_ROOT + 2]];

        let analyzers = frequencies
            .iter()
            .map(|&frequency| Goertzel::new(sample_rate, frequency, timing.word_length))
            .collect();

        Receiver {
            state: State::WaitingTrigger,
            timing,
            trigger: TriggerAnalyzer::new(
                sample_rate,
                timing.gate_length,
                gate_frequencies,
                DEFAULT_TRIGGER_SNR,
            ),
            analyzers,
            symbols_cache: Vec::new(),
            header_cache: None,
            first_tone_sample_index: -1,
            pushed_samples: 0,
            symbol_index: 0,
            fixed_errors: 0,
            encoder: ReedSolomonEncoder::new(GaloisField::new(0x13, 16, 1)),
            scratch: Vec::new(),
        }
    }

    /// Largest chunk the receiver will analyse without crossing a window boundary. Pushing
    /// smaller chunks is always accepted; pushing larger ones is too, they are simply windowed
    /// internally.
    pub fn maximum_length(&self) -> usize {
        match self.state {
            State::WaitingTrigger => self.trigger.maximum_window_length(),
            State::ParsingSymbols => {
                self.timing.word_length - self.analyzers[0].processed_samples()
            }
        }
    }

    /// Total symbol errors corrected across the most recently decoded frame, header block
    /// included.
    pub fn fixed_errors(&self) -> usize {
        self.fixed_errors
    }

    /// Install or remove an observer of the per-window gate levels.
    pub fn set_level_callback(&mut self, callback: Option<LevelCallback>) {
        self.trigger.set_level_callback(callback);
    }

    /// Release per-frame caches and return to waiting for a trigger.
    pub fn reset(&mut self) {
        self.symbols_cache = Vec::new();
        self.header_cache = None;
        self.trigger.reset();
        for analyzer in self.analyzers.iter_mut() {
            analyzer.reset();
        }
        self.state = State::WaitingTrigger;
        self.symbol_index = 0;
        self.first_tone_sample_index = -1;
    }

    /// Consume a chunk of the stream. Returns a payload exactly once per successfully decoded
    /// frame; header or payload failures silently reset the receiver.
    pub fn push_samples(&mut self, samples: &[f32]) -> Option<Payload> {
        self.pushed_samples += samples.len() as i64;

        if let State::WaitingTrigger = self.state {
            self.feed_trigger_analyzer(samples);
        }
        if let State::ParsingSymbols = self.state {
            if self.first_tone_sample_index + (self.timing.word_silence_length as i64)
                < self.pushed_samples
            {
                return self.analyze_tones(samples);
            }
        }
        None
    }

    fn feed_trigger_analyzer(&mut self, samples: &[f32]) {
        self.trigger.process_samples(samples);

        if let Some(first_tone_location) = self.trigger.first_tone_location() {
            self.state = State::ParsingSymbols;
            self.first_tone_sample_index =
                self.pushed_samples - (self.trigger.total_processed() as i64 - first_tone_location);
            debug!("trigger acquired, symbols begin at sample {}", self.first_tone_sample_index);

            for analyzer in self.analyzers.iter_mut() {
                analyzer.reset();
            }
            self.symbols_cache = vec![Symbol::default(); HEADER_SYMBOLS];
            self.header_cache = None;
            self.symbol_index = 0;
            self.fixed_errors = 0;
            self.trigger.reset();
        }
    }

    /// Absolute sample index where the current word's tone begins.
    fn tone_location(&self) -> i64 {
        self.first_tone_sample_index
            + self.symbol_index as i64
                * (self.timing.word_length + self.timing.word_silence_length) as i64
            + self.timing.word_silence_length as i64
    }

    /// Offset of the current word's tone within the chunk just pushed.
    fn tone_index(&self, samples_len: usize) -> i64 {
        samples_len as i64 - (self.pushed_samples - self.tone_location())
    }

    fn analyze_tones(&mut self, samples: &[f32]) -> Option<Payload> {
        let mut cursor = self.tone_index(samples.len()).max(0) as usize;

        while cursor < samples.len() {
            let window_length = (samples.len() - cursor)
                .min(self.timing.word_length - self.analyzers[0].processed_samples());
            if window_length == 0 {
                break;
            }

            let window_offset = self.analyzers[0].processed_samples();
            self.scratch.clear();
            self.scratch.extend_from_slice(&samples[cursor..cursor + window_length]);
            hann_window(&mut self.scratch, self.timing.word_length, window_offset);
            for analyzer in self.analyzers.iter_mut() {
                analyzer.process_samples(&self.scratch);
            }

            if self.analyzers[0].processed_samples() == self.timing.word_length {
                self.store_symbol_pair();

                if self.symbol_index * 2 == self.symbols_cache.len() {
                    if self.header_cache.is_none() {
                        if !self.cached_symbols_to_header() {
                            // The header is unrecoverable; drop the frame.
                            self.reset();
                            break;
                        }
                    }
                    else {
                        let payload = self.cached_symbols_to_payload();
                        self.reset();
                        return payload;
                    }
                }
            }

            cursor += window_length;
        }
        None
    }

    /// Close the word window: the strongest bin of each half-bank is the symbol pair.
    fn store_symbol_pair(&mut self) {
        let mut spl = [0.0f64; NUM_FREQUENCIES];
        for (level, analyzer) in spl.iter_mut().zip(self.analyzers.iter_mut()) {
            *level = 20.0 * analyzer.compute_rms().log10();
        }

        for half in 0..2 {
            let bins = &spl[half * FREQUENCY_ROOT..(half + 1) * FREQUENCY_ROOT];
            let mut best = 0;
            let mut best_gain = f64::MIN;
            for (id, &gain) in bins.iter().enumerate() {
                if gain > best_gain {
                    best_gain = gain;
                    best = id;
                }
            }
            self.symbols_cache[self.symbol_index * 2 + half] = Symbol(best as u8);
        }
        self.symbol_index += 1;
    }

    fn cached_symbols_to_header(&mut self) -> bool {
        let mut cache = std::mem::take(&mut self.symbols_cache);
        let decoded = symbols_to_payload(
            self.encoder.field(),
            &mut cache,
            HEADER_SYMBOLS,
            HEADER_ECC_SYMBOLS,
            false,
        );

        let header_bytes = match decoded {
            Ok((bytes, fixed)) => {
                self.fixed_errors += fixed;
                bytes
            }
            Err(err) => {
                warn!("header block rejected: {}", err);
                return false;
            }
        };

        let header = match FrameHeader::decode(&[header_bytes[0], header_bytes[1], header_bytes[2]]) {
            Ok(header) => header,
            Err(err) => {
                warn!("header rejected: {}", err);
                return false;
            }
        };
        if header.number_of_symbols == 0 {
            warn!("header rejected: empty frame");
            return false;
        }
        debug!(
            "header: length={} ecc={:?} crc={}, {} payload symbols follow",
            header.length, header.ecc_level, header.crc, header.number_of_symbols
        );

        // Collect the payload blocks next: the symbol clock restarts after the header words.
        self.symbols_cache = vec![Symbol::default(); header.number_of_symbols];
        self.symbol_index = 0;
        self.first_tone_sample_index += (HEADER_SYMBOLS as i64 / 2)
            * (self.timing.word_length + self.timing.word_silence_length) as i64;
        self.header_cache = Some(header);
        true
    }

    fn cached_symbols_to_payload(&mut self) -> Option<Payload> {
        let (block_symbols, block_ecc, with_crc) = {
            let header = self.header_cache.as_ref().expect("header is decoded");
            (header.ecc_level.block_symbols(), header.ecc_level.ecc_symbols(), header.crc)
        };

        let mut cache = std::mem::take(&mut self.symbols_cache);
        match symbols_to_payload(self.encoder.field(), &mut cache, block_symbols, block_ecc, with_crc)
        {
            Ok((data, fixed)) => {
                self.fixed_errors += fixed;
                debug!(
                    "frame decoded: {} bytes, {} symbols repaired",
                    data.len(),
                    self.fixed_errors
                );
                Some(Payload { data, fixed_errors: self.fixed_errors })
            }
            Err(err) => {
                warn!("frame rejected: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Receiver;

    #[test]
    fn verify_initial_state() {
        let receiver = Receiver::new(44100.0);

        // While waiting for a trigger the capacity is the gate analysis window.
        let gate_length = (44100.0 * 0.12) as usize;
        assert_eq!(receiver.maximum_length(), gate_length / 3);
        assert_eq!(receiver.fixed_errors(), 0);
    }

    #[test]
    fn verify_silence_never_triggers() {
        let mut receiver = Receiver::new(16000.0);

        let silence = vec![0.0f32; 1024];
        for _ in 0..64 {
            assert!(receiver.push_samples(&silence).is_none());
        }
    }
}
