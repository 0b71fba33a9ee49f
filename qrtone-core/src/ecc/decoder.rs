// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;

use crate::errors::{decode_error, Result};

use super::galois::{GaloisField, GfPoly};

/// Correct up to `ec_count / 2` symbol errors in `message`, a codeword whose trailing
/// `ec_count` symbols are Reed-Solomon parity. Returns the number of symbols repaired.
///
/// Syndromes are evaluated at consecutive powers of alpha; the error locator and evaluator are
/// derived with the Euclidean algorithm, error positions found by Chien search, and magnitudes
/// by the Forney formula. Any inconsistency (locator degree mismatch, roots outside the
/// codeword) means the codeword is unrecoverable.
pub fn decode(field: &GaloisField, message: &mut [u32], ec_count: usize) -> Result<usize> {
    let poly = GfPoly::new(message);

    let mut syndrome_coefficients = vec![0u32; ec_count];
    let mut no_error = true;
    for i in 0..ec_count {
        let eval = poly.evaluate_at(field, field.exp(i as u32 + field.generator_base()));
        syndrome_coefficients[ec_count - 1 - i] = eval;
        if eval != 0 {
            no_error = false;
        }
    }
    if no_error {
        return Ok(0);
    }

    let syndrome = GfPoly::new(&syndrome_coefficients);
    let (sigma, omega) =
        run_euclidean_algorithm(field, &GfPoly::monomial(ec_count, 1), &syndrome, ec_count)?;

    let error_locations = find_error_locations(field, &sigma)?;
    let error_magnitudes = find_error_magnitudes(field, &omega, &error_locations)?;

    for (&location, &magnitude) in error_locations.iter().zip(error_magnitudes.iter()) {
        let log = field.log(location) as usize;
        if log >= message.len() {
            return decode_error("ecc: error location outside the codeword");
        }
        let position = message.len() - 1 - log;
        message[position] = GaloisField::add_or_subtract(message[position], magnitude);
    }

    debug!("repaired {} symbol(s) in a {}-symbol codeword", error_locations.len(), message.len());
    Ok(error_locations.len())
}

/// Run Euclid's algorithm on x^`ec_count` and the syndrome polynomial until the remainder
/// degree falls below `ec_count / 2`, yielding the error locator and error evaluator.
fn run_euclidean_algorithm(
    field: &GaloisField,
    a: &GfPoly,
    b: &GfPoly,
    ec_count: usize,
) -> Result<(GfPoly, GfPoly)> {
    // Divide the larger-degree polynomial by the smaller.
    let (mut r_last, mut r) =
        if a.degree() < b.degree() { (b.clone(), a.clone()) } else { (a.clone(), b.clone()) };
    let mut t_last = GfPoly::zero();
    let mut t = GfPoly::one();

    while 2 * r.degree() >= ec_count {
        let r_last_last = r_last;
        let t_last_last = t_last;
        r_last = r;
        t_last = t;

        if r_last.is_zero() {
            return decode_error("ecc: syndrome remainder vanished early");
        }

        r = r_last_last;
        let mut q = GfPoly::zero();
        let denominator_leading_term = r_last.coefficient(r_last.degree());
        let dlt_inverse = field.inverse(denominator_leading_term)?;
        while r.degree() >= r_last.degree() && !r.is_zero() {
            let degree_diff = r.degree() - r_last.degree();
            let scale = field.multiply(r.coefficient(r.degree()), dlt_inverse);
            q = q.add_or_subtract(&GfPoly::monomial(degree_diff, scale));
            r = r.add_or_subtract(&r_last.multiply_by_monomial(field, degree_diff, scale));
        }
        t = q.multiply(field, &t_last).add_or_subtract(&t_last_last);

        if r.degree() >= r_last.degree() {
            return decode_error("ecc: division failed to reduce the remainder");
        }
    }

    let sigma_tilde_at_zero = t.coefficient(0);
    if sigma_tilde_at_zero == 0 {
        return decode_error("ecc: error locator has no constant term");
    }

    let inverse = field.inverse(sigma_tilde_at_zero)?;
    let sigma = t.multiply_scalar(field, inverse);
    let omega = r.multiply_scalar(field, inverse);
    Ok((sigma, omega))
}

/// Chien search: trial-evaluate the error locator over the whole field to find its roots.
fn find_error_locations(field: &GaloisField, error_locator: &GfPoly) -> Result<Vec<u32>> {
    let num_errors = error_locator.degree();
    if num_errors == 1 {
        return Ok(vec![error_locator.coefficient(1)]);
    }

    let mut locations = Vec::with_capacity(num_errors);
    for i in 1..field.size() {
        if locations.len() >= num_errors {
            break;
        }
        if error_locator.evaluate_at(field, i) == 0 {
            locations.push(field.inverse(i)?);
        }
    }
    if locations.len() != num_errors {
        return decode_error("ecc: error locator degree does not match its root count");
    }
    Ok(locations)
}

/// Forney: compute the error magnitude at each located position.
fn find_error_magnitudes(
    field: &GaloisField,
    error_evaluator: &GfPoly,
    error_locations: &[u32],
) -> Result<Vec<u32>> {
    let mut magnitudes = Vec::with_capacity(error_locations.len());
    for (i, &location) in error_locations.iter().enumerate() {
        let xi_inverse = field.inverse(location)?;

        // The formal derivative of the error locator, evaluated via its product form.
        let mut denominator = 1;
        for (j, &other) in error_locations.iter().enumerate() {
            if i == j {
                continue;
            }
            let term = field.multiply(other, xi_inverse);
            let term_plus_one = if term & 0x1 == 0 { term | 1 } else { term & !1 };
            denominator = field.multiply(denominator, term_plus_one);
        }

        let mut magnitude =
            field.multiply(error_evaluator.evaluate_at(field, xi_inverse), field.inverse(denominator)?);
        if field.generator_base() != 0 {
            magnitude = field.multiply(magnitude, xi_inverse);
        }
        magnitudes.push(magnitude);
    }
    Ok(magnitudes)
}
