// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `payload` module converts between payload bytes and interleaved tone-symbol streams.
//!
//! On the encode side each payload byte is split into two 4-bit symbols, the symbols are grouped
//! into fixed-size blocks padded with zeros, Reed-Solomon parity fills the tail of each block,
//! and the concatenated blocks are interleaved so a burst of corrupted words lands in different
//! blocks. The zero padding of the final block is never transmitted. Decoding is the exact
//! inverse, correcting errors per block and checking the optional CRC-16 trailer.

use qrtone_core::checksum::{Crc16Arc, Monitor};
use qrtone_core::ecc;
use qrtone_core::ecc::{GaloisField, ReedSolomonEncoder};
use qrtone_core::errors::{decode_error, Result};

use crate::header::CRC_BYTE_LENGTH;

/// A 4-bit tone symbol. Two symbols form one payload byte, high nibble first.
///
/// Symbols are deliberately a distinct type from payload bytes so nibble streams and byte
/// streams cannot be mixed up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Symbol(pub u8);

/// Permute `symbols` so that consecutive wire symbols come from different blocks.
pub(crate) fn interleave_symbols(symbols: &mut [Symbol], block_size: usize) {
    let mut output = vec![Symbol::default(); symbols.len()];
    let mut insertion_cursor = 0;
    for j in 0..block_size {
        let mut cursor = j;
        while cursor < symbols.len() {
            output[insertion_cursor] = symbols[cursor];
            insertion_cursor += 1;
            cursor += block_size;
        }
    }
    symbols.copy_from_slice(&output);
}

/// Cancel the permutation applied by [`interleave_symbols`].
pub(crate) fn deinterleave_symbols(symbols: &mut [Symbol], block_size: usize) {
    let mut output = vec![Symbol::default(); symbols.len()];
    let mut insertion_cursor = 0;
    for j in 0..block_size {
        let mut cursor = j;
        while cursor < symbols.len() {
            output[cursor] = symbols[insertion_cursor];
            insertion_cursor += 1;
            cursor += block_size;
        }
    }
    symbols.copy_from_slice(&output);
}

/// Encode `payload` into an interleaved symbol stream over `(block_symbols, block_ecc)` blocks,
/// appending a big-endian CRC-16 of the payload first when `with_crc` is set.
pub(crate) fn payload_to_symbols(
    encoder: &mut ReedSolomonEncoder,
    payload: &[u8],
    block_symbols: usize,
    block_ecc: usize,
    with_crc: bool,
) -> Result<Vec<Symbol>> {
    let mut payload_bytes = payload.to_vec();
    if with_crc {
        let mut crc16 = Crc16Arc::new();
        crc16.process_buf_bytes(payload);
        payload_bytes.extend_from_slice(&crc16.crc().to_be_bytes());
    }

    let payload_symbols_size = block_symbols - block_ecc;
    let payload_byte_size = payload_symbols_size / 2;
    let number_of_blocks =
        (payload_bytes.len() * 2 + payload_symbols_size - 1) / payload_symbols_size;
    let number_of_symbols = number_of_blocks * block_ecc + payload_bytes.len() * 2;

    let mut symbols = vec![Symbol::default(); number_of_symbols];
    let mut block = vec![0u32; block_symbols];
    for block_id in 0..number_of_blocks {
        block.iter_mut().for_each(|symbol| *symbol = 0);

        let byte_offset = block_id * payload_byte_size;
        let payload_size = payload_byte_size.min(payload_bytes.len() - byte_offset);
        for (i, &byte) in payload_bytes[byte_offset..byte_offset + payload_size].iter().enumerate() {
            block[i * 2] = u32::from(byte >> 4);
            block[i * 2 + 1] = u32::from(byte & 0x0f);
        }

        encoder.encode(&mut block, block_ecc)?;

        // Transmit only the occupied data region and the parity; padding stays implicit.
        let out = &mut symbols[block_id * block_symbols..];
        for (slot, &symbol) in out.iter_mut().zip(block[..payload_size * 2].iter()) {
            *slot = Symbol(symbol as u8);
        }
        for (slot, &symbol) in out[payload_size * 2..]
            .iter_mut()
            .zip(block[payload_symbols_size..payload_symbols_size + block_ecc].iter())
        {
            *slot = Symbol(symbol as u8);
        }
    }

    interleave_symbols(&mut symbols, block_symbols);
    Ok(symbols)
}

/// Decode an interleaved symbol stream back into payload bytes, correcting errors per block and
/// verifying the CRC-16 trailer when `with_crc` is set. Returns the payload and the number of
/// symbols repaired by the error-correction code.
pub(crate) fn symbols_to_payload(
    field: &GaloisField,
    symbols: &mut [Symbol],
    block_symbols: usize,
    block_ecc: usize,
    with_crc: bool,
) -> Result<(Vec<u8>, usize)> {
    let payload_symbols_size = block_symbols - block_ecc;
    let payload_byte_size = payload_symbols_size / 2;
    let full_blocks = symbols.len() / block_symbols;
    let tail_symbols = symbols.len() % block_symbols;
    let payload_length =
        (full_blocks * payload_symbols_size + tail_symbols.saturating_sub(block_ecc)) / 2;
    let number_of_blocks = (symbols.len() + block_symbols - 1) / block_symbols;

    let crc_length = if with_crc { CRC_BYTE_LENGTH } else { 0 };
    if payload_length < crc_length {
        return decode_error("payload too short for its crc trailer");
    }
    let data_length = payload_length - crc_length;

    deinterleave_symbols(symbols, block_symbols);

    let mut payload = vec![0u8; data_length];
    let mut crc_bytes = [0u8; CRC_BYTE_LENGTH];
    let mut crc_index = 0;
    let mut fixed_errors = 0;

    let mut block = vec![0u32; block_symbols];
    for block_id in 0..number_of_blocks {
        block.iter_mut().for_each(|symbol| *symbol = 0);

        let base = block_id * block_symbols;
        let data_symbols =
            payload_symbols_size.min(symbols.len().saturating_sub(block_ecc + base));

        // Rebuild the full codeword: data, implicit zero padding, then parity.
        for (slot, &symbol) in block.iter_mut().zip(symbols[base..base + data_symbols].iter()) {
            *slot = u32::from(symbol.0);
        }
        for (slot, &symbol) in block[payload_symbols_size..]
            .iter_mut()
            .zip(symbols[base + data_symbols..base + data_symbols + block_ecc].iter())
        {
            *slot = u32::from(symbol.0);
        }

        fixed_errors += ecc::decode(field, &mut block, block_ecc)?;

        let byte_at = |i: usize| ((block[i * 2] << 4) | (block[i * 2 + 1] & 0x0f)) as u8;

        let byte_offset = block_id * payload_byte_size;
        let data_bytes = payload_byte_size.min(data_length.saturating_sub(byte_offset));
        for i in 0..data_bytes {
            payload[byte_offset + i] = byte_at(i);
        }
        if with_crc {
            // CRC trailer bytes sit past the payload end, in the final block(s).
            let trailer_end = payload_byte_size.min(payload_length.saturating_sub(byte_offset));
            for i in data_bytes..trailer_end {
                crc_bytes[crc_index] = byte_at(i);
                crc_index += 1;
            }
        }
    }

    if with_crc {
        let stored_crc = u16::from_be_bytes(crc_bytes);
        let mut crc16 = Crc16Arc::new();
        crc16.process_buf_bytes(&payload);
        if crc16.crc() != stored_crc {
            return decode_error("payload crc16 mismatch");
        }
    }

    Ok((payload, fixed_errors))
}

#[cfg(test)]
mod tests {
    use qrtone_core::ecc::{GaloisField, ReedSolomonEncoder};

    use super::{
        deinterleave_symbols, interleave_symbols, payload_to_symbols, symbols_to_payload, Symbol,
    };
    use crate::header::{HEADER_ECC_SYMBOLS, HEADER_SYMBOLS};
    use crate::EccLevel;

    fn new_encoder() -> ReedSolomonEncoder {
        ReedSolomonEncoder::new(GaloisField::new(0x13, 16, 1))
    }

    #[test]
    fn verify_interleave_identity() {
        for &(len, block) in &[(56usize, 12usize), (46, 14), (8, 8), (30, 10), (13, 12)] {
            let source: Vec<Symbol> = (0..len).map(|i| Symbol((i % 16) as u8)).collect();
            let mut symbols = source.clone();

            interleave_symbols(&mut symbols, block);
            deinterleave_symbols(&mut symbols, block);

            assert_eq!(symbols, source);
        }
    }

    #[test]
    fn verify_interleave_spreads_bursts() {
        let source: Vec<Symbol> = (0..48).map(|i| Symbol((i % 16) as u8)).collect();
        let mut symbols = source.clone();
        interleave_symbols(&mut symbols, 12);

        // Symbols adjacent on the wire come from consecutive blocks, so the first four wire
        // symbols are the leading symbol of each of the four blocks.
        assert_eq!(symbols[0], source[0]);
        assert_eq!(symbols[1], source[12]);
        assert_eq!(symbols[2], source[24]);
        assert_eq!(symbols[3], source[36]);
    }

    #[test]
    fn verify_round_trip_every_level() {
        let payload: Vec<u8> = (0u8..48).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();

        for &level in &[EccLevel::L, EccLevel::M, EccLevel::Q, EccLevel::H] {
            for &with_crc in &[false, true] {
                for len in 1..payload.len() {
                    let mut encoder = new_encoder();
                    let mut symbols = payload_to_symbols(
                        &mut encoder,
                        &payload[..len],
                        level.block_symbols(),
                        level.ecc_symbols(),
                        with_crc,
                    )
                    .unwrap();

                    let (decoded, fixed) = symbols_to_payload(
                        encoder.field(),
                        &mut symbols,
                        level.block_symbols(),
                        level.ecc_symbols(),
                        with_crc,
                    )
                    .unwrap();

                    assert_eq!(decoded, &payload[..len]);
                    assert_eq!(fixed, 0);
                }
            }
        }
    }

    #[test]
    fn verify_single_symbol_corruption_recovered() {
        let payload = b"!0BSduvwxyz";

        for &level in &[EccLevel::L, EccLevel::M, EccLevel::Q, EccLevel::H] {
            let mut encoder = new_encoder();
            let reference = payload_to_symbols(
                &mut encoder,
                payload,
                level.block_symbols(),
                level.ecc_symbols(),
                true,
            )
            .unwrap();

            for position in 0..reference.len() {
                let mut symbols = reference.clone();
                symbols[position] = Symbol((symbols[position].0 + 1) % 16);

                let (decoded, fixed) = symbols_to_payload(
                    encoder.field(),
                    &mut symbols,
                    level.block_symbols(),
                    level.ecc_symbols(),
                    true,
                )
                .unwrap();

                assert_eq!(decoded, payload);
                assert_eq!(fixed, 1);
            }
        }
    }

    #[test]
    fn verify_burst_corruption_recovered() {
        // A contiguous run of ecc/2-per-block wire errors is spread across blocks by the
        // interleaver and must still decode.
        let payload = b"!0BSduvwxyz";
        let level = EccLevel::Q;

        let mut encoder = new_encoder();
        let mut symbols = payload_to_symbols(
            &mut encoder,
            payload,
            level.block_symbols(),
            level.ecc_symbols(),
            true,
        )
        .unwrap();

        for symbol in symbols.iter_mut().take(4) {
            *symbol = Symbol((symbol.0 + 7) % 16);
        }

        let (decoded, fixed) = symbols_to_payload(
            encoder.field(),
            &mut symbols,
            level.block_symbols(),
            level.ecc_symbols(),
            true,
        )
        .unwrap();

        assert_eq!(decoded, payload);
        assert_eq!(fixed, 4);
    }

    #[test]
    fn verify_header_block_geometry() {
        // The 3-byte header travels as a single (8, 2) block: 6 data symbols plus 2 parity.
        let mut encoder = new_encoder();
        let symbols =
            payload_to_symbols(&mut encoder, &[0x2a, 0x0a, 0x91], HEADER_SYMBOLS, HEADER_ECC_SYMBOLS, false)
                .unwrap();
        assert_eq!(symbols.len(), HEADER_SYMBOLS);
    }
}
