// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `percentile` module implements the P² streaming quantile estimator.

/// Streaming quantile estimator.
///
/// Maintains five markers tracking a single target quantile without storing observations, per
/// \[1\]. The trigger analyzer uses it to estimate the background noise floor from sound
/// pressure levels.
///
/// \[1\] R. Jain and I. Chlamtac, "The P² Algorithm for Dynamic Calculation of Quantiles and
///       Histograms Without Storing Observations", Communications of the ACM, October 1985.
///
/// <https://dl.acm.org/doi/10.1145/4372.4378>
pub struct Percentile {
    q: Vec<f64>,
    dn: Vec<f64>,
    np: Vec<f64>,
    n: Vec<i64>,
    count: usize,
}

impl Percentile {
    /// Create an estimator for `quantile` in `[0, 1]`.
    pub fn new(quantile: f64) -> Percentile {
        assert!((0.0..=1.0).contains(&quantile), "quantile must be in [0, 1]");

        // End markers at the extrema, plus three markers bracketing the target quantile.
        let mut dn = vec![0.0, 1.0, quantile / 2.0, quantile, (1.0 + quantile) / 2.0];
        dn.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let markers = dn.len();
        let np = dn.iter().map(|d| (markers as f64 - 1.0) * d + 1.0).collect();

        Percentile { q: vec![0.0; markers], dn, np, n: vec![0; markers], count: 0 }
    }

    /// Feed one observation.
    pub fn add(&mut self, data: f64) {
        let markers = self.q.len();

        if self.count >= markers {
            self.count += 1;

            // B1: find the cell containing the observation, updating an extremum if exceeded.
            let mut k = 0;
            if data < self.q[0] {
                self.q[0] = data;
                k = 1;
            }
            else if data >= self.q[markers - 1] {
                self.q[markers - 1] = data;
                k = markers - 1;
            }
            else {
                for i in 1..markers {
                    if data < self.q[i] {
                        k = i;
                        break;
                    }
                }
            }

            // B2: shift marker positions above the cell, and advance all desired positions.
            for i in k..markers {
                self.n[i] += 1;
                self.np[i] += self.dn[i];
            }
            for i in 0..k {
                self.np[i] += self.dn[i];
            }

            // B3: move any inner marker displaced by one or more slots from its desired
            // position, by parabolic interpolation when the result stays bracketed, linearly
            // otherwise.
            for i in 1..markers - 1 {
                let d = self.np[i] - self.n[i] as f64;
                if (d >= 1.0 && self.n[i + 1] - self.n[i] > 1)
                    || (d <= -1.0 && self.n[i - 1] - self.n[i] < -1)
                {
                    let sign = if d >= 0.0 { 1 } else { -1 };
                    let parabolic = self.parabolic(i, sign);
                    self.q[i] = if self.q[i - 1] < parabolic && parabolic < self.q[i + 1] {
                        parabolic
                    }
                    else {
                        self.linear(i, sign)
                    };
                    self.n[i] += sign;
                }
            }
        }
        else {
            self.q[self.count] = data;
            self.count += 1;

            if self.count == markers {
                // Enough observations to start the algorithm.
                self.q.sort_by(|a, b| a.partial_cmp(b).unwrap());
                for (i, n) in self.n.iter_mut().enumerate() {
                    *n = i as i64 + 1;
                }
            }
        }
    }

    /// The current estimate of the target quantile.
    pub fn result(&mut self) -> f64 {
        let markers = self.q.len();
        self.result_quantile(self.dn[(markers - 1) / 2])
    }

    fn result_quantile(&mut self, quantile: f64) -> f64 {
        let markers = self.q.len();
        if self.count < markers {
            // Not yet saturated: answer with the buffered observation nearest the quantile by
            // rank.
            let mut closest = 1;
            self.q[..self.count].sort_by(|a, b| a.partial_cmp(b).unwrap());
            for i in 2..self.count {
                if (i as f64 / self.count as f64 - quantile).abs()
                    < (closest as f64 / markers as f64 - quantile).abs()
                {
                    closest = i;
                }
            }
            self.q[closest]
        }
        else {
            let mut closest = 1;
            for i in 2..markers - 1 {
                if (self.dn[i] - quantile).abs() < (self.dn[closest] - quantile).abs() {
                    closest = i;
                }
            }
            self.q[closest]
        }
    }

    fn parabolic(&self, i: usize, d: i64) -> f64 {
        let n = &self.n;
        let q = &self.q;
        q[i] + d as f64 / (n[i + 1] - n[i - 1]) as f64
            * ((n[i] - n[i - 1] + d) as f64 * (q[i + 1] - q[i]) / (n[i + 1] - n[i]) as f64
                + (n[i + 1] - n[i] - d) as f64 * (q[i] - q[i - 1]) / (n[i] - n[i - 1]) as f64)
    }

    fn linear(&self, i: usize, d: i64) -> f64 {
        let at = (i as i64 + d) as usize;
        self.q[i] + d as f64 * (self.q[at] - self.q[i]) / (self.n[at] - self.n[i]) as f64
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::Percentile;

    #[test]
    fn verify_median_of_uniform_noise() {
        let mut rng = SmallRng::seed_from_u64(0xdecade);
        let mut percentile = Percentile::new(0.5);

        for _ in 0..10_000 {
            percentile.add(rng.random_range(0.0..100.0));
        }

        let median = percentile.result();
        assert!((median - 50.0).abs() < 2.0, "median estimate {} too far off", median);
    }

    #[test]
    fn verify_median_ignores_outliers() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut percentile = Percentile::new(0.5);

        // Nine in ten observations sit near zero; sparse large outliers must not drag the
        // median.
        for i in 0..5_000u32 {
            let value =
                if i % 10 == 9 { 1000.0 } else { rng.random_range(0.0..1.0) };
            percentile.add(value);
        }

        let median = percentile.result();
        assert!(median < 10.0, "median estimate {} dragged by outliers", median);
    }

    #[test]
    fn verify_quantile_of_uniform_noise() {
        let mut rng = SmallRng::seed_from_u64(0xfeed);
        let mut percentile = Percentile::new(0.9);

        for _ in 0..10_000 {
            percentile.add(rng.random_range(0.0..1.0));
        }

        let estimate = percentile.result();
        assert!((estimate - 0.9).abs() < 0.05, "p90 estimate {} too far off", estimate);
    }
}
