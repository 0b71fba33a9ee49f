// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::errors::{unsupported_error, Result};

use super::galois::{GaloisField, GfPoly};

/// Systematic Reed-Solomon encoder over a [`GaloisField`].
///
/// The message polynomial is divided by a generator whose roots are consecutive powers of alpha;
/// the division remainder becomes the parity symbols. Generator polynomials are memoised per
/// parity length for the lifetime of the encoder.
pub struct ReedSolomonEncoder {
    field: GaloisField,
    cached_generators: Vec<GfPoly>,
}

impl ReedSolomonEncoder {
    pub fn new(field: GaloisField) -> ReedSolomonEncoder {
        ReedSolomonEncoder { field, cached_generators: vec![GfPoly::one()] }
    }

    /// The field this encoder operates over.
    pub fn field(&self) -> &GaloisField {
        &self.field
    }

    fn build_generator(&mut self, degree: usize) -> GfPoly {
        if degree >= self.cached_generators.len() {
            for d in self.cached_generators.len()..=degree {
                let root = self.field.exp(d as u32 - 1 + self.field.generator_base());
                let next = self.cached_generators[d - 1].multiply(&self.field, &GfPoly::new(&[1, root]));
                self.cached_generators.push(next);
            }
        }
        self.cached_generators[degree].clone()
    }

    /// Fill the trailing `ec_count` slots of `message` with parity computed over the leading
    /// data slots.
    pub fn encode(&mut self, message: &mut [u32], ec_count: usize) -> Result<()> {
        if ec_count == 0 || ec_count >= message.len() {
            return unsupported_error("ecc: invalid parity symbol count");
        }

        let data_len = message.len() - ec_count;
        let generator = self.build_generator(ec_count);

        let info = GfPoly::new(&message[..data_len]).multiply_by_monomial(&self.field, ec_count, 1);
        let (_, remainder) = info.divide(&self.field, &generator)?;

        // The remainder may have fewer than ec_count coefficients; the gap is leading zeros.
        let coefficients = remainder.coefficients();
        let leading_zeros = ec_count - if remainder.is_zero() { 0 } else { coefficients.len() };
        for slot in &mut message[data_len..data_len + leading_zeros] {
            *slot = 0;
        }
        if !remainder.is_zero() {
            message[data_len + leading_zeros..].copy_from_slice(coefficients);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::galois::GaloisField;
    use super::ReedSolomonEncoder;

    fn check_encoder(encoder: &mut ReedSolomonEncoder, data: &[u32], expected_ec: &[u32]) {
        let mut message = vec![0u32; data.len() + expected_ec.len()];
        message[..data.len()].copy_from_slice(data);

        encoder.encode(&mut message, expected_ec.len()).unwrap();

        assert_eq!(&message[..data.len()], data);
        assert_eq!(&message[data.len()..], expected_ec);
    }

    #[test]
    fn verify_aztec_param_vectors() {
        let mut encoder = ReedSolomonEncoder::new(GaloisField::new(0x13, 16, 1));

        check_encoder(&mut encoder, &[0x5, 0x6], &[0x3, 0x2, 0xb, 0xb, 0x7]);
        check_encoder(&mut encoder, &[0x0, 0x0, 0x0, 0x9], &[0xa, 0xd, 0x8, 0x6, 0x5, 0x6]);
        check_encoder(&mut encoder, &[0x2, 0x8, 0x8, 0x7], &[0xe, 0xc, 0xa, 0x9, 0x6, 0x8]);
    }

    #[test]
    fn verify_aztec_word_vector() {
        let mut encoder = ReedSolomonEncoder::new(GaloisField::new(0x43, 64, 1));

        check_encoder(
            &mut encoder,
            &[0x9, 0x32, 0x1, 0x29, 0x2f, 0x2, 0x27, 0x25, 0x1, 0x1b],
            &[0x2c, 0x2, 0xd, 0xd, 0xa, 0x16, 0x28, 0x9, 0x22, 0xa, 0x14],
        );
    }

    #[test]
    fn verify_qr_code_vector() {
        let mut encoder = ReedSolomonEncoder::new(GaloisField::new(0x011d, 256, 0));

        #[rustfmt::skip]
        const DATA: [u32; 16] = [
            0x10, 0x20, 0x0c, 0x56, 0x61, 0x80, 0xec, 0x11,
            0xec, 0x11, 0xec, 0x11, 0xec, 0x11, 0xec, 0x11,
        ];
        #[rustfmt::skip]
        const EC: [u32; 10] = [
            0xa5, 0x24, 0xd4, 0xc1, 0xed, 0x36, 0xc7, 0x87,
            0x2c, 0x55,
        ];

        check_encoder(&mut encoder, &DATA, &EC);
    }

    #[test]
    fn verify_data_matrix_vector() {
        let mut encoder = ReedSolomonEncoder::new(GaloisField::new(0x012d, 256, 1));

        check_encoder(&mut encoder, &[142, 164, 186], &[114, 25, 5, 88, 102]);
    }

    #[test]
    fn verify_generator_cache_reuse() {
        let mut encoder = ReedSolomonEncoder::new(GaloisField::new(0x13, 16, 1));

        // Repeating a parity length after interleaving other lengths must reuse the memoised
        // generator and produce identical parity.
        check_encoder(&mut encoder, &[0x5, 0x6], &[0x3, 0x2, 0xb, 0xb, 0x7]);
        check_encoder(&mut encoder, &[0x0, 0x0, 0x0, 0x9], &[0xa, 0xd, 0x8, 0x6, 0x5, 0x6]);
        check_encoder(&mut encoder, &[0x5, 0x6], &[0x3, 0x2, 0xb, 0xb, 0x7]);
    }
}
