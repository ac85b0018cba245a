//! Complex spherical harmonics up to a configurable maximum order.
//!
//! Moments are flattened as `j = l^2 + l + m` with `m` in `-l..=l`, giving
//! `(l_max + 1)^2` coefficients. Values follow the physics convention with
//! the Condon-Shortley phase carried by the associated Legendre functions.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

/// Evaluator for all `Y_lm` with `l <= l_max`.
///
/// Normalization factors are precomputed at construction; evaluation does
/// not allocate.
#[derive(Debug, Clone)]
pub struct SphericalHarmonics {
    l_max: usize,
    /// `sqrt((2l+1)/(4 pi) * (l-m)!/(l+m)!)` in triangular (l, m >= 0) layout.
    norm: Vec<f64>,
}

/// Flat moment index of the (l, m) harmonic.
#[inline]
#[must_use]
pub fn flat_index(l: usize, m: i64) -> usize {
    debug_assert!(m.unsigned_abs() as usize <= l);
    ((l * l + l) as i64 + m) as usize
}

#[inline]
fn triangular(l: usize, m: usize) -> usize {
    l * (l + 1) / 2 + m
}

impl SphericalHarmonics {
    /// Creates the evaluator for orders `0..=l_max`.
    #[must_use]
    pub fn new(l_max: usize) -> Self {
        let mut norm = vec![0.0; triangular(l_max, l_max) + 1];
        for l in 0..=l_max {
            for m in 0..=l {
                let mut ratio = 1.0;
                for k in (l - m + 1)..=(l + m) {
                    ratio /= k as f64;
                }
                let factor = (2 * l + 1) as f64 / (4.0 * std::f64::consts::PI);
                norm[triangular(l, m)] = (factor * ratio).sqrt();
            }
        }
        Self { l_max, norm }
    }

    /// Maximum order.
    #[must_use]
    pub fn l_max(&self) -> usize {
        self.l_max
    }

    /// Number of moments, `(l_max + 1)^2`.
    #[must_use]
    pub fn n_moments(&self) -> usize {
        (self.l_max + 1) * (self.l_max + 1)
    }

    /// Evaluates every harmonic at the given direction into `re`/`im`,
    /// both of length [`Self::n_moments`].
    ///
    /// # Panics
    /// Panics if the output slices are shorter than the moment count.
    pub fn eval(&self, cos_theta: f64, phi: f64, re: &mut [f64], im: &mut [f64]) {
        let n = self.n_moments();
        assert!(re.len() >= n && im.len() >= n, "output buffers too short");

        let x = cos_theta.clamp(-1.0, 1.0);
        let sin_theta = (1.0 - x * x).max(0.0).sqrt();

        // Climb l for each fixed m, so only two previous Legendre values
        // are live at a time.
        let mut pmm = 1.0;
        for m in 0..=self.l_max {
            if m > 0 {
                pmm *= -((2 * m - 1) as f64) * sin_theta;
            }
            let (cos_mphi, sin_mphi) = if m == 0 {
                (1.0, 0.0)
            } else {
                let mphi = (m as f64) * phi;
                (mphi.cos(), mphi.sin())
            };

            let mut p_prev = 0.0;
            let mut p_curr = pmm;
            for l in m..=self.l_max {
                if l > m {
                    let lf = l as f64;
                    let mf = m as f64;
                    let p_next = ((2.0 * lf - 1.0) * x * p_curr - (lf + mf - 1.0) * p_prev)
                        / (lf - mf);
                    p_prev = p_curr;
                    p_curr = p_next;
                }
                let value = self.norm[triangular(l, m)] * p_curr;
                let j_pos = flat_index(l, m as i64);
                re[j_pos] = value * cos_mphi;
                im[j_pos] = value * sin_mphi;
                if m > 0 {
                    // Y(l, -m) = (-1)^m conj(Y(l, m))
                    let parity = if m % 2 == 0 { 1.0 } else { -1.0 };
                    let j_neg = flat_index(l, -(m as i64));
                    re[j_neg] = parity * value * cos_mphi;
                    im[j_neg] = -parity * value * sin_mphi;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn eval(l_max: usize, cos_theta: f64, phi: f64) -> (Vec<f64>, Vec<f64>) {
        let ylm = SphericalHarmonics::new(l_max);
        let mut re = vec![0.0; ylm.n_moments()];
        let mut im = vec![0.0; ylm.n_moments()];
        ylm.eval(cos_theta, phi, &mut re, &mut im);
        (re, im)
    }

    #[test]
    fn test_flat_index() {
        assert_eq!(flat_index(0, 0), 0);
        assert_eq!(flat_index(1, -1), 1);
        assert_eq!(flat_index(1, 0), 2);
        assert_eq!(flat_index(1, 1), 3);
        assert_eq!(flat_index(2, -2), 4);
        assert_eq!(flat_index(2, 2), 8);
    }

    #[test]
    fn test_y00() {
        let (re, im) = eval(0, 0.3, 1.2);
        assert_relative_eq!(re[0], 0.5 / PI.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(im[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_l1_closed_forms() {
        let cos_theta: f64 = 0.4;
        let phi = 0.9;
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let (re, im) = eval(1, cos_theta, phi);

        // Y10 = sqrt(3/4pi) cos(theta)
        assert_relative_eq!(
            re[flat_index(1, 0)],
            (3.0 / (4.0 * PI)).sqrt() * cos_theta,
            epsilon = 1e-12
        );
        // Y11 = -sqrt(3/8pi) sin(theta) e^{i phi}
        let mag = -(3.0 / (8.0 * PI)).sqrt() * sin_theta;
        assert_relative_eq!(re[flat_index(1, 1)], mag * phi.cos(), epsilon = 1e-12);
        assert_relative_eq!(im[flat_index(1, 1)], mag * phi.sin(), epsilon = 1e-12);
        // Y1-1 = -conj(Y11)
        assert_relative_eq!(
            re[flat_index(1, -1)],
            -re[flat_index(1, 1)],
            epsilon = 1e-12
        );
        assert_relative_eq!(im[flat_index(1, -1)], im[flat_index(1, 1)], epsilon = 1e-12);
    }

    #[test]
    fn test_l2_closed_forms() {
        let cos_theta: f64 = -0.25;
        let phi = 2.1;
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let (re, im) = eval(2, cos_theta, phi);

        // Y20 = sqrt(5/16pi) (3 cos^2 - 1)
        assert_relative_eq!(
            re[flat_index(2, 0)],
            (5.0 / (16.0 * PI)).sqrt() * (3.0 * cos_theta * cos_theta - 1.0),
            epsilon = 1e-12
        );
        // Y22 = sqrt(15/32pi) sin^2(theta) e^{2i phi}
        let mag = (15.0 / (32.0 * PI)).sqrt() * sin_theta * sin_theta;
        assert_relative_eq!(
            re[flat_index(2, 2)],
            mag * (2.0 * phi).cos(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            im[flat_index(2, 2)],
            mag * (2.0 * phi).sin(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unsold_sum_rule() {
        // sum_m |Y_lm|^2 = (2l+1)/(4 pi) at any direction
        let (re, im) = eval(4, 0.37, -1.8);
        for l in 0..=4_usize {
            let mut sum = 0.0;
            for m in -(l as i64)..=(l as i64) {
                let j = flat_index(l, m);
                sum += re[j] * re[j] + im[j] * im[j];
            }
            assert_relative_eq!(
                sum,
                (2 * l + 1) as f64 / (4.0 * PI),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_poles_are_finite() {
        let (re, im) = eval(3, 1.0, 0.5);
        assert!(re.iter().chain(im.iter()).all(|v| v.is_finite()));
        // Only m = 0 survives at the pole
        assert_relative_eq!(re[flat_index(2, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(im[flat_index(3, 2)], 0.0, epsilon = 1e-12);
    }
}
