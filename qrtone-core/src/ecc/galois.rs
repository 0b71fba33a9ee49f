// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `galois` module implements arithmetic over GF(2^m) and polynomials over such fields.

use smallvec::SmallVec;

use crate::errors::{decode_error, Result};

/// Coefficient storage. Tone blocks are at most 16 symbols, so polynomials stay inline.
type Coeffs = SmallVec<[u32; 16]>;

/// A finite field GF(2^m) with logarithm and antilogarithm tables for fast multiplication.
pub struct GaloisField {
    exp_table: Vec<u32>,
    log_table: Vec<u32>,
    size: u32,
    generator_base: u32,
}

impl GaloisField {
    /// Create a field of `size` = 2^m elements reduced by `primitive`, the field's primitive
    /// polynomial with the most significant bit set.
    ///
    /// `generator_base` is the power of alpha at which generator-polynomial roots begin; the
    /// barcode-derived parameter sets this codec uses have it at 0 or 1.
    pub fn new(primitive: u32, size: u32, generator_base: u32) -> GaloisField {
        let mut exp_table = vec![0u32; size as usize];
        let mut log_table = vec![0u32; size as usize];

        let mut x = 1u32;
        for entry in exp_table.iter_mut() {
            *entry = x;
            x <<= 1;
            if x >= size {
                x ^= primitive;
                x &= size - 1;
            }
        }
        // log(exp(size - 1)) = log(1) = 0 is already in place.
        for i in 0..(size - 1) as usize {
            log_table[exp_table[i] as usize] = i as u32;
        }

        GaloisField { exp_table, log_table, size, generator_base }
    }

    /// Number of elements in the field.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn generator_base(&self) -> u32 {
        self.generator_base
    }

    /// alpha^`power`.
    pub fn exp(&self, power: u32) -> u32 {
        self.exp_table[power as usize]
    }

    /// The discrete logarithm of a non-zero element.
    pub fn log(&self, x: u32) -> u32 {
        debug_assert!(x != 0, "zero has no logarithm");
        self.log_table[x as usize]
    }

    /// The multiplicative inverse of a non-zero element.
    pub fn inverse(&self, x: u32) -> Result<u32> {
        if x == 0 {
            return decode_error("ecc: zero has no multiplicative inverse");
        }
        Ok(self.exp_table[(self.size - 1 - self.log_table[x as usize]) as usize])
    }

    /// The product of two field elements.
    pub fn multiply(&self, a: u32, b: u32) -> u32 {
        if a == 0 || b == 0 {
            return 0;
        }
        let log_sum = self.log_table[a as usize] + self.log_table[b as usize];
        self.exp_table[(log_sum % (self.size - 1)) as usize]
    }

    /// Addition and subtraction are both carry-less xor in GF(2^m).
    pub fn add_or_subtract(a: u32, b: u32) -> u32 {
        a ^ b
    }
}

/// A polynomial over a [`GaloisField`], owning its coefficients, most significant first.
///
/// The canonical zero polynomial is a single zero coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfPoly {
    coefficients: Coeffs,
}

impl GfPoly {
    /// Build a polynomial from most-significant-first coefficients, normalising away leading
    /// zeros.
    pub fn new(coefficients: &[u32]) -> GfPoly {
        match coefficients.iter().position(|&c| c != 0) {
            Some(at) => GfPoly { coefficients: SmallVec::from_slice(&coefficients[at..]) },
            None => GfPoly::zero(),
        }
    }

    /// The canonical zero polynomial.
    pub fn zero() -> GfPoly {
        GfPoly { coefficients: SmallVec::from_slice(&[0]) }
    }

    /// The constant polynomial 1.
    pub fn one() -> GfPoly {
        GfPoly { coefficients: SmallVec::from_slice(&[1]) }
    }

    /// Build the monomial `coefficient * x^degree`. A zero coefficient yields the zero
    /// polynomial regardless of degree.
    pub fn monomial(degree: usize, coefficient: u32) -> GfPoly {
        if coefficient == 0 {
            return GfPoly::zero();
        }
        let mut coefficients = Coeffs::from_elem(0, degree + 1);
        coefficients[0] = coefficient;
        GfPoly { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients[0] == 0
    }

    /// The coefficient of x^`degree`.
    pub fn coefficient(&self, degree: usize) -> u32 {
        self.coefficients[self.coefficients.len() - 1 - degree]
    }

    pub fn coefficients(&self) -> &[u32] {
        &self.coefficients
    }

    /// Evaluate the polynomial at `x` via Horner's method.
    pub fn evaluate_at(&self, field: &GaloisField, x: u32) -> u32 {
        if x == 0 {
            // Only the constant term remains.
            return self.coefficient(0);
        }
        if x == 1 {
            return self.coefficients.iter().fold(0, |sum, &c| GaloisField::add_or_subtract(sum, c));
        }
        let mut result = self.coefficients[0];
        for &coefficient in &self.coefficients[1..] {
            result = GaloisField::add_or_subtract(field.multiply(x, result), coefficient);
        }
        result
    }

    /// The sum (equivalently, difference) of two polynomials.
    pub fn add_or_subtract(&self, other: &GfPoly) -> GfPoly {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        let (smaller, larger) = if self.coefficients.len() <= other.coefficients.len() {
            (&self.coefficients, &other.coefficients)
        }
        else {
            (&other.coefficients, &self.coefficients)
        };

        let diff = larger.len() - smaller.len();
        let mut sum = Coeffs::with_capacity(larger.len());
        sum.extend_from_slice(&larger[..diff]);
        for (&l, &s) in larger[diff..].iter().zip(smaller.iter()) {
            sum.push(l ^ s);
        }

        GfPoly::new(&sum)
    }

    /// The product of two polynomials.
    pub fn multiply(&self, field: &GaloisField, other: &GfPoly) -> GfPoly {
        if self.is_zero() || other.is_zero() {
            return GfPoly::zero();
        }

        let a = &self.coefficients;
        let b = &other.coefficients;
        let mut product = Coeffs::from_elem(0, a.len() + b.len() - 1);
        for (i, &ac) in a.iter().enumerate() {
            for (j, &bc) in b.iter().enumerate() {
                product[i + j] ^= field.multiply(ac, bc);
            }
        }

        GfPoly::new(&product)
    }

    /// The product with a scalar.
    pub fn multiply_scalar(&self, field: &GaloisField, scalar: u32) -> GfPoly {
        if scalar == 0 {
            return GfPoly::zero();
        }
        if scalar == 1 {
            return self.clone();
        }
        let product: Coeffs = self.coefficients.iter().map(|&c| field.multiply(c, scalar)).collect();
        GfPoly::new(&product)
    }

    /// The product with the monomial `coefficient * x^degree`.
    pub fn multiply_by_monomial(&self, field: &GaloisField, degree: usize, coefficient: u32) -> GfPoly {
        if coefficient == 0 {
            return GfPoly::zero();
        }
        let mut product = Coeffs::from_elem(0, self.coefficients.len() + degree);
        for (p, &c) in product.iter_mut().zip(self.coefficients.iter()) {
            *p = field.multiply(c, coefficient);
        }
        GfPoly::new(&product)
    }

    /// Polynomial long division: returns `(quotient, remainder)`.
    pub fn divide(&self, field: &GaloisField, other: &GfPoly) -> Result<(GfPoly, GfPoly)> {
        if other.is_zero() {
            return decode_error("ecc: division by the zero polynomial");
        }

        let mut quotient = GfPoly::zero();
        let mut remainder = self.clone();

        let denominator_leading_term = other.coefficient(other.degree());
        let inverse_denominator_leading_term = field.inverse(denominator_leading_term)?;

        while remainder.degree() >= other.degree() && !remainder.is_zero() {
            let degree_difference = remainder.degree() - other.degree();
            let scale = field
                .multiply(remainder.coefficient(remainder.degree()), inverse_denominator_leading_term);
            let term = other.multiply_by_monomial(field, degree_difference, scale);
            quotient = quotient.add_or_subtract(&GfPoly::monomial(degree_difference, scale));
            remainder = remainder.add_or_subtract(&term);
        }

        Ok((quotient, remainder))
    }
}

#[cfg(test)]
mod tests {
    use super::{GaloisField, GfPoly};

    #[test]
    fn verify_table_invariants() {
        for &(primitive, size, base) in &[(0x13, 16, 1), (0x011d, 256, 0), (0x012d, 256, 1)] {
            let field = GaloisField::new(primitive, size, base);
            assert_eq!(field.exp(0), 1);
            assert_eq!(field.exp(size - 1), 1);
            for x in 1..size {
                assert_eq!(field.exp(field.log(x)), x);
            }
        }
    }

    #[test]
    fn verify_multiplicative_inverse() {
        for &(primitive, size, base) in &[(0x13, 16, 1), (0x011d, 256, 0)] {
            let field = GaloisField::new(primitive, size, base);
            for x in 1..size {
                let inverse = field.inverse(x).unwrap();
                assert_eq!(field.multiply(x, inverse), 1);
            }
        }
    }

    #[test]
    fn verify_zero_monomial() {
        let field = GaloisField::new(0x011d, 256, 0);

        // A zero coefficient always produces the canonical zero polynomial.
        let poly = GfPoly::monomial(2, 0);
        assert!(poly.is_zero());
        assert_eq!(poly.degree(), 0);

        // Multiplying by a zero scalar collapses to the zero polynomial too.
        let poly = GfPoly::monomial(2, 1).multiply_scalar(&field, 0);
        assert!(poly.is_zero());
    }

    #[test]
    fn verify_evaluate() {
        let field = GaloisField::new(0x011d, 256, 0);

        // A constant polynomial evaluates to itself everywhere.
        let poly = GfPoly::monomial(0, 3);
        assert_eq!(poly.evaluate_at(&field, 0), 3);
        assert_eq!(poly.evaluate_at(&field, 187), 3);

        // x^2 + 1 at x = 2: 4 ^ 1 = 5.
        let poly = GfPoly::new(&[1, 0, 1]);
        assert_eq!(poly.evaluate_at(&field, 2), 5);
    }

    #[test]
    fn verify_evaluate_matches_naive_power_sum() {
        let field = GaloisField::new(0x13, 16, 1);
        let poly = GfPoly::new(&[7, 0, 3, 1, 12]);
        let degree = poly.degree();

        for x in 0..16 {
            let naive = poly.coefficients().iter().enumerate().fold(0, |sum, (i, &c)| {
                let mut term = c;
                for _ in 0..degree - i {
                    term = field.multiply(term, x);
                }
                GaloisField::add_or_subtract(sum, term)
            });
            assert_eq!(poly.evaluate_at(&field, x), naive);
        }
    }

    #[test]
    fn verify_divide() {
        let field = GaloisField::new(0x13, 16, 1);

        // (x^2 + alpha) / x: quotient x, remainder alpha.
        let dividend = GfPoly::new(&[1, 0, 2]);
        let divisor = GfPoly::monomial(1, 1);
        let (quotient, remainder) = dividend.divide(&field, &divisor).unwrap();
        assert_eq!(quotient, GfPoly::monomial(1, 1));
        assert_eq!(remainder, GfPoly::monomial(0, 2));

        // Dividing a polynomial by itself leaves no remainder.
        let (quotient, remainder) = dividend.divide(&field, &dividend).unwrap();
        assert_eq!(quotient, GfPoly::one());
        assert!(remainder.is_zero());
    }
}
