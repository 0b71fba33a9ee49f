// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `header` module implements the 3-byte frame preamble.

use qrtone_core::checksum::{Crc8Maxim, Monitor};
use qrtone_core::errors::{decode_error, Result};

/// Bytes in the encoded header.
pub(crate) const HEADER_SIZE: usize = 3;

/// Parity symbols protecting the header block.
pub(crate) const HEADER_ECC_SYMBOLS: usize = 2;

/// Symbols in the header block: two per header byte plus parity.
pub(crate) const HEADER_SYMBOLS: usize = HEADER_SIZE * 2 + HEADER_ECC_SYMBOLS;

/// Bytes in the optional payload CRC trailer.
pub(crate) const CRC_BYTE_LENGTH: usize = 2;

/// Error-correction level of a frame, selecting the symbol-block geometry.
///
/// Levels trade payload capacity per block for correction capacity, from `L`ow to `H`igh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl EccLevel {
    /// Total symbols per block, data and parity.
    pub fn block_symbols(&self) -> usize {
        match *self {
            EccLevel::L => 14,
            EccLevel::M => 14,
            EccLevel::Q => 12,
            EccLevel::H => 10,
        }
    }

    /// Parity symbols per block.
    pub fn ecc_symbols(&self) -> usize {
        match *self {
            EccLevel::L => 2,
            EccLevel::M => 4,
            EccLevel::Q => 6,
            EccLevel::H => 6,
        }
    }

    fn code(&self) -> u8 {
        match *self {
            EccLevel::L => 0,
            EccLevel::M => 1,
            EccLevel::Q => 2,
            EccLevel::H => 3,
        }
    }

    fn from_code(code: u8) -> EccLevel {
        match code & 0x3 {
            0 => EccLevel::L,
            1 => EccLevel::M,
            2 => EccLevel::Q,
            _ => EccLevel::H,
        }
    }
}

/// The frame preamble: payload length, ECC level, and CRC presence flag, protected by a CRC-8.
///
/// Block counts for the payload that follows are derived once here and read by the receiver and
/// transmitter.
#[derive(Clone, Debug)]
pub(crate) struct FrameHeader {
    pub length: u8,
    pub ecc_level: EccLevel,
    pub crc: bool,
    pub payload_symbols_size: usize,
    pub payload_byte_size: usize,
    pub number_of_blocks: usize,
    pub number_of_symbols: usize,
}

impl FrameHeader {
    pub fn new(length: u8, ecc_level: EccLevel, crc: bool) -> FrameHeader {
        let block_symbols = ecc_level.block_symbols();
        let block_ecc = ecc_level.ecc_symbols();

        let crc_length = if crc { CRC_BYTE_LENGTH } else { 0 };
        let payload_symbols_size = block_symbols - block_ecc;
        let payload_byte_size = payload_symbols_size / 2;
        let total_symbols = (usize::from(length) + crc_length) * 2;
        let number_of_blocks = (total_symbols + payload_symbols_size - 1) / payload_symbols_size;
        let number_of_symbols = number_of_blocks * block_ecc + total_symbols;

        FrameHeader {
            length,
            ecc_level,
            crc,
            payload_symbols_size,
            payload_byte_size,
            number_of_blocks,
            number_of_symbols,
        }
    }

    /// Serialise to the 3-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut data = [0u8; HEADER_SIZE];
        data[0] = self.length;
        data[1] = self.ecc_level.code() & 0x3;
        if self.crc {
            data[1] |= 1 << 3;
        }

        let mut crc8 = Crc8Maxim::new();
        crc8.process_byte(data[0]);
        crc8.process_byte(data[1]);
        data[2] = crc8.crc();

        data
    }

    /// Parse the 3-byte wire form, verifying its CRC.
    pub fn decode(data: &[u8; HEADER_SIZE]) -> Result<FrameHeader> {
        let mut crc8 = Crc8Maxim::new();
        crc8.process_byte(data[0]);
        crc8.process_byte(data[1]);
        if crc8.crc() != data[2] {
            return decode_error("header crc mismatch");
        }

        Ok(FrameHeader::new(data[0], EccLevel::from_code(data[1]), data[1] >> 3 != 0))
    }
}
