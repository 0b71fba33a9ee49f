// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Monitor;

/// Dallas/Maxim (1-Wire) CRC-8: reflected polynomial 0x8C, initial value 0, no final xor.
///
/// Computed bitwise rather than with a lookup table; it only ever protects the 2-byte frame
/// header.
#[derive(Default)]
pub struct Crc8Maxim {
    crc: u8,
}

impl Crc8Maxim {
    pub fn new() -> Self {
        Crc8Maxim { crc: 0 }
    }

    /// Reset the CRC to its initial value.
    pub fn reset(&mut self) {
        self.crc = 0;
    }

    /// Get the current CRC value.
    pub fn crc(&self) -> u8 {
        self.crc
    }
}

impl Monitor for Crc8Maxim {
    fn process_byte(&mut self, byte: u8) {
        let mut accumulator = self.crc ^ byte;
        let mut crc = 0u8;
        for _ in 0..8 {
            // The shift form ((crc ^ 0x18) >> 1) | 0x80 is (crc >> 1) ^ 0x8c.
            if (accumulator ^ crc) & 0x01 == 0x01 {
                crc = ((crc ^ 0x18) >> 1) | 0x80;
            }
            else {
                crc >>= 1;
            }
            accumulator >>= 1;
        }
        self.crc = crc;
    }
}

#[cfg(test)]
mod tests {
    use super::Crc8Maxim;
    use crate::checksum::Monitor;

    #[test]
    fn verify_crc8_check_value() {
        // The canonical CRC-8/MAXIM check value.
        let mut crc8 = Crc8Maxim::new();
        crc8.process_buf_bytes(b"123456789");
        assert_eq!(crc8.crc(), 0xa1);
    }

    #[test]
    fn verify_crc8_reset() {
        let mut crc8 = Crc8Maxim::new();
        crc8.process_buf_bytes(b"data");
        crc8.reset();
        assert_eq!(crc8.crc(), 0);
        crc8.process_buf_bytes(b"123456789");
        assert_eq!(crc8.crc(), 0xa1);
    }
}
