//! Differential spherical-harmonic pair accumulation.
//!
//! One [`CorrelationContainer`] owns the numerator (same-event) and
//! denominator (mixed-event) moment arrays of a single correlation channel.
//! Cells are addressed by (multiplicity-bin, kT-bin); within a cell each
//! kstar bin carries a raw count, the first moments of every harmonic up to
//! `l_max`, and the second-moment products needed to derive a covariance
//! matrix once the pass is complete. All sums are double precision and no
//! event-count normalization happens here; that is left to post-processing.

use ndarray::{Array1, Array2, Array3};

use femtoscope_core::PairKinematics;

use crate::binning::BinAxis;
use crate::spherical::SphericalHarmonics;

/// Which side of the correlation ratio a fill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Same-event (signal) pairs: numerator.
    Same,
    /// Mixed-event (background) pairs: denominator.
    Mixed,
}

/// Moment sums of one cell for one event kind.
///
/// First moments follow the conjugate convention: the imaginary part is
/// accumulated with its sign flipped, as required when projecting a real
/// correlation function onto complex harmonics. The second-moment matrix
/// runs over the interleaved vector `[Re y0, Im y0, Re y1, ...]`.
#[derive(Debug, Clone)]
pub struct ShCell {
    counts: Array1<f64>,
    re: Array2<f64>,
    im: Array2<f64>,
    second: Array3<f64>,
}

impl ShCell {
    fn new(n_kstar: usize, n_moments: usize) -> Self {
        Self {
            counts: Array1::zeros(n_kstar),
            re: Array2::zeros((n_moments, n_kstar)),
            im: Array2::zeros((n_moments, n_kstar)),
            second: Array3::zeros((n_kstar, 2 * n_moments, 2 * n_moments)),
        }
    }

    fn fill(&mut self, k_bin: usize, weight: f64, ylm_re: &[f64], ylm_im: &[f64]) {
        self.counts[k_bin] += weight;
        for (j, (&re, &im)) in ylm_re.iter().zip(ylm_im.iter()).enumerate() {
            self.re[[j, k_bin]] += weight * re;
            self.im[[j, k_bin]] -= weight * im;
        }
        let n = ylm_re.len();
        for a in 0..2 * n {
            let va = interleaved(ylm_re, ylm_im, a);
            for b in a..2 * n {
                let vb = interleaved(ylm_re, ylm_im, b);
                let product = weight * va * vb;
                self.second[[k_bin, a, b]] += product;
                if a != b {
                    self.second[[k_bin, b, a]] += product;
                }
            }
        }
    }

    /// Raw pair counts per kstar bin.
    #[must_use]
    pub fn counts(&self) -> &Array1<f64> {
        &self.counts
    }

    /// Real first moments, indexed (moment, kstar bin).
    #[must_use]
    pub fn re(&self) -> &Array2<f64> {
        &self.re
    }

    /// Imaginary first moments, indexed (moment, kstar bin).
    #[must_use]
    pub fn im(&self) -> &Array2<f64> {
        &self.im
    }

    /// Total filled weight across all kstar bins.
    #[must_use]
    pub fn n_entries(&self) -> f64 {
        self.counts.sum()
    }

    /// Covariance over the first `n_moments` harmonics, derived from the
    /// accumulated first and second moments.
    ///
    /// Indexed (kstar bin, a, b) over the interleaved real/imaginary
    /// vector; bins without entries stay zero. Valid only once the pass is
    /// complete, since it depends on the final totals.
    #[must_use]
    pub fn covariance(&self, n_moments: usize) -> Array3<f64> {
        let n_kstar = self.counts.len();
        let dim = (2 * n_moments).min(self.second.shape()[1]);
        let mut cov = Array3::zeros((n_kstar, dim, dim));
        for k in 0..n_kstar {
            let n = self.counts[k];
            if n <= 0.0 {
                continue;
            }
            for a in 0..dim {
                let ma = self.first_moment(a, k);
                for b in 0..dim {
                    let mb = self.first_moment(b, k);
                    cov[[k, a, b]] = self.second[[k, a, b]] / n - ma * mb / (n * n);
                }
            }
        }
        cov
    }

    /// First moment of the interleaved component `a` in bin `k`, undoing
    /// the conjugate sign flip so it matches the second-moment products.
    fn first_moment(&self, a: usize, k: usize) -> f64 {
        let j = a / 2;
        if a % 2 == 0 {
            self.re[[j, k]]
        } else {
            -self.im[[j, k]]
        }
    }
}

#[inline]
fn interleaved(re: &[f64], im: &[f64], a: usize) -> f64 {
    if a % 2 == 0 {
        re[a / 2]
    } else {
        im[a / 2]
    }
}

/// Numerator/denominator moment arrays of one correlation channel.
#[derive(Debug, Clone)]
pub struct CorrelationContainer {
    kstar_axis: BinAxis,
    mult_axis: Option<BinAxis>,
    kt_axis: Option<BinAxis>,
    harmonics: SphericalHarmonics,
    same: Vec<ShCell>,
    mixed: Vec<ShCell>,
    scratch_re: Vec<f64>,
    scratch_im: Vec<f64>,
}

impl CorrelationContainer {
    /// Single-cell container binned in kstar only.
    #[must_use]
    pub fn kstar_only(kstar_axis: BinAxis, l_max: usize) -> Self {
        Self::build(kstar_axis, None, None, l_max)
    }

    /// Differential container binned in kstar, kT and multiplicity.
    #[must_use]
    pub fn differential(
        kstar_axis: BinAxis,
        mult_axis: BinAxis,
        kt_axis: BinAxis,
        l_max: usize,
    ) -> Self {
        Self::build(kstar_axis, Some(mult_axis), Some(kt_axis), l_max)
    }

    fn build(
        kstar_axis: BinAxis,
        mult_axis: Option<BinAxis>,
        kt_axis: Option<BinAxis>,
        l_max: usize,
    ) -> Self {
        let harmonics = SphericalHarmonics::new(l_max);
        let n_moments = harmonics.n_moments();
        let n_kstar = kstar_axis.n_bins();
        let n_cells = mult_axis.as_ref().map_or(1, BinAxis::n_bins)
            * kt_axis.as_ref().map_or(1, BinAxis::n_bins);
        Self {
            kstar_axis,
            mult_axis,
            kt_axis,
            same: (0..n_cells).map(|_| ShCell::new(n_kstar, n_moments)).collect(),
            mixed: (0..n_cells)
                .map(|_| ShCell::new(n_kstar, n_moments))
                .collect(),
            scratch_re: vec![0.0; n_moments],
            scratch_im: vec![0.0; n_moments],
            harmonics,
        }
    }

    /// kstar axis.
    #[must_use]
    pub fn kstar_axis(&self) -> &BinAxis {
        &self.kstar_axis
    }

    /// Multiplicity cell axis, if differential.
    #[must_use]
    pub fn mult_axis(&self) -> Option<&BinAxis> {
        self.mult_axis.as_ref()
    }

    /// kT cell axis, if differential.
    #[must_use]
    pub fn kt_axis(&self) -> Option<&BinAxis> {
        self.kt_axis.as_ref()
    }

    /// Number of (multiplicity, kT) cells.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.same.len()
    }

    /// Number of harmonic moments per kstar bin.
    #[must_use]
    pub fn n_moments(&self) -> usize {
        self.harmonics.n_moments()
    }

    /// Maximum harmonic order.
    #[must_use]
    pub fn l_max(&self) -> usize {
        self.harmonics.l_max()
    }

    /// Cells of the given kind, row-major over (multiplicity, kT).
    #[must_use]
    pub fn cells(&self, kind: EventKind) -> &[ShCell] {
        match kind {
            EventKind::Same => &self.same,
            EventKind::Mixed => &self.mixed,
        }
    }

    /// Row-major cell index, or `None` when the pair falls outside the
    /// differential axes.
    fn cell_index(&self, multiplicity: f64, kt: f64) -> Option<usize> {
        match (&self.mult_axis, &self.kt_axis) {
            (None, None) => Some(0),
            (Some(mult_axis), Some(kt_axis)) => {
                let im = mult_axis.index_of(multiplicity)?;
                let ik = kt_axis.index_of(kt)?;
                Some(im * kt_axis.n_bins() + ik)
            }
            // differential containers always carry both axes
            _ => unreachable!("container with a single differential axis"),
        }
    }

    /// Accumulates one pair into the numerator or denominator.
    ///
    /// Returns false when the pair lies outside the kstar axis or the
    /// differential cell axes, or when the pair is at rest and carries no
    /// angular information; nothing is recorded in that case.
    pub fn fill(
        &mut self,
        kind: EventKind,
        kinematics: &PairKinematics,
        multiplicity: f64,
        weight: f64,
    ) -> bool {
        let Some(cos_theta) = kinematics.cos_theta() else {
            return false;
        };
        let Some(k_bin) = self.kstar_axis.index_of(kinematics.kstar) else {
            return false;
        };
        let Some(cell) = self.cell_index(multiplicity, kinematics.kt) else {
            return false;
        };
        self.harmonics.eval(
            cos_theta,
            kinematics.phi(),
            &mut self.scratch_re,
            &mut self.scratch_im,
        );
        let target = match kind {
            EventKind::Same => &mut self.same[cell],
            EventKind::Mixed => &mut self.mixed[cell],
        };
        target.fill(k_bin, weight, &self.scratch_re, &self.scratch_im);
        true
    }

    /// Covariance matrices of every cell, truncated to orders `0..=l_up_to`.
    ///
    /// To be invoked once per processing pass, after all fills of that kind
    /// are complete.
    #[must_use]
    pub fn covariance(&self, kind: EventKind, l_up_to: usize) -> Vec<Array3<f64>> {
        let orders = l_up_to.min(self.harmonics.l_max()) + 1;
        let n_moments = orders * orders;
        self.cells(kind)
            .iter()
            .map(|cell| cell.covariance(n_moments))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::PI;

    fn kin(kstar: f64, k_long: f64, kt: f64) -> PairKinematics {
        // keep |k| consistent: put the remainder into k_out
        let k_out = (kstar * kstar - k_long * k_long).max(0.0).sqrt();
        PairKinematics {
            kstar,
            k_out,
            k_side: 0.0,
            k_long,
            kt,
            mt: (kt * kt + 0.02).sqrt(),
        }
    }

    fn axis(n: usize, max: f64) -> BinAxis {
        BinAxis::uniform(n, 0.0, max).unwrap()
    }

    #[test]
    fn test_kstar_only_fill() {
        let mut container = CorrelationContainer::kstar_only(axis(10, 0.5), 2);
        assert_eq!(container.n_cells(), 1);
        assert_eq!(container.n_moments(), 9);

        assert!(container.fill(EventKind::Same, &kin(0.12, 0.1, 0.3), 5.0, 1.0));
        let cell = &container.cells(EventKind::Same)[0];
        // kstar 0.12 lands in bin 2 of width 0.05
        assert_relative_eq!(cell.counts()[2], 1.0);
        assert_relative_eq!(cell.n_entries(), 1.0);
        // moment 0 is Y00 = 1/sqrt(4 pi), imaginary part zero
        assert_relative_eq!(cell.re()[[0, 2]], 0.5 / PI.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(cell.im()[[0, 2]], 0.0, epsilon = 1e-12);
        // nothing leaked into the denominator
        assert_relative_eq!(container.cells(EventKind::Mixed)[0].n_entries(), 0.0);
    }

    #[test]
    fn test_out_of_range_kstar_dropped() {
        let mut container = CorrelationContainer::kstar_only(axis(10, 0.5), 1);
        assert!(!container.fill(EventKind::Same, &kin(0.6, 0.0, 0.3), 5.0, 1.0));
        assert_relative_eq!(container.cells(EventKind::Same)[0].n_entries(), 0.0);
    }

    #[test]
    fn test_pair_at_rest_dropped() {
        let mut container = CorrelationContainer::kstar_only(axis(10, 0.5), 1);
        assert!(!container.fill(EventKind::Same, &kin(0.0, 0.0, 0.3), 5.0, 1.0));
    }

    #[test]
    fn test_denominator_weight() {
        let mut container = CorrelationContainer::kstar_only(axis(5, 0.5), 0);
        assert!(container.fill(EventKind::Mixed, &kin(0.12, 0.1, 0.3), 5.0, 0.25));
        let cell = &container.cells(EventKind::Mixed)[0];
        assert_relative_eq!(cell.counts()[1], 0.25);
        assert_relative_eq!(
            cell.re()[[0, 1]],
            0.25 * 0.5 / PI.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_differential_cell_addressing() {
        let mut container = CorrelationContainer::differential(
            axis(5, 0.5),
            BinAxis::from_edges(vec![0.0, 20.0, 50.0]).unwrap(),
            BinAxis::from_edges(vec![0.1, 0.5, 1.0]).unwrap(),
            1,
        );
        assert_eq!(container.n_cells(), 4);

        // multiplicity 30 -> mult bin 1; kt 0.3 -> kt bin 0 -> cell 2
        assert!(container.fill(EventKind::Same, &kin(0.2, 0.1, 0.3), 30.0, 1.0));
        for (idx, cell) in container.cells(EventKind::Same).iter().enumerate() {
            let expected = if idx == 2 { 1.0 } else { 0.0 };
            assert_relative_eq!(cell.n_entries(), expected);
        }

        // multiplicity outside the cell axes is dropped
        assert!(!container.fill(EventKind::Same, &kin(0.2, 0.1, 0.3), 80.0, 1.0));
        // kt outside the cell axes is dropped
        assert!(!container.fill(EventKind::Same, &kin(0.2, 0.1, 0.05), 30.0, 1.0));
    }

    #[test]
    fn test_covariance_single_fill_vanishes() {
        let mut container = CorrelationContainer::kstar_only(axis(4, 0.4), 2);
        container.fill(EventKind::Same, &kin(0.15, 0.12, 0.3), 5.0, 1.0);
        let cov = container.covariance(EventKind::Same, 2);
        assert_eq!(cov.len(), 1);
        // With one entry, S/n - m m / n^2 = v v - v v = 0 exactly
        for value in &cov[0] {
            assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_covariance_spread_is_positive() {
        let mut container = CorrelationContainer::kstar_only(axis(1, 1.0), 1);
        // Two fills in the same kstar bin with opposite k_long: Y10 differs
        container.fill(EventKind::Same, &kin(0.5, 0.5, 0.3), 5.0, 1.0);
        container.fill(EventKind::Same, &kin(0.5, -0.5, 0.3), 5.0, 1.0);
        let cov = container.covariance(EventKind::Same, 1);
        // Re Y10 is interleaved index 2 * flat_index(1, 0) = 4
        let var = cov[0][[0, 4, 4]];
        assert!(var > 1e-6, "variance of Y10 should be positive, got {var}");
        // Y00 is constant, so its variance vanishes
        assert_abs_diff_eq!(cov[0][[0, 0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_covariance_truncation() {
        let mut container = CorrelationContainer::kstar_only(axis(2, 0.5), 3);
        container.fill(EventKind::Mixed, &kin(0.1, 0.05, 0.3), 5.0, 1.0);
        let cov = container.covariance(EventKind::Mixed, 1);
        // truncated to (1+1)^2 = 4 moments -> 8 x 8 interleaved
        assert_eq!(cov[0].shape(), &[2, 8, 8]);
    }
}
