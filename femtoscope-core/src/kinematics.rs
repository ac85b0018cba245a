//! Two-body pair kinematics.
//!
//! Builds the femtoscopic pair observables from two tracks and two mass
//! hypotheses: the relative-momentum vector in the Bertsch-Pratt
//! out-side-long decomposition (half of it being the k* vector), the pair
//! transverse momentum kT and the transverse mass mT.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::particle::Particle;

/// Reference frame for the relative-momentum decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Frame {
    /// Longitudinally co-moving system (pair pz boosted away).
    Lcms,
    /// Pair rest frame (additional boost along the outward direction).
    Prf,
}

/// Observables of one particle pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairKinematics {
    /// Half the relative-momentum magnitude in the chosen frame (GeV/c).
    pub kstar: f64,
    /// Outward component of the k* vector (along the pair pT).
    pub k_out: f64,
    /// Sideward component (transverse, perpendicular to out).
    pub k_side: f64,
    /// Longitudinal component (along the beam).
    pub k_long: f64,
    /// Pair transverse momentum, half of |pT1 + pT2| (GeV/c).
    pub kt: f64,
    /// Pair transverse mass sqrt(kT^2 + mbar^2) with the average mass (GeV).
    pub mt: f64,
}

impl PairKinematics {
    /// Polar angle cosine of the k* vector, if the pair is not at rest.
    #[inline]
    pub fn cos_theta(&self) -> Option<f64> {
        (self.kstar > 0.0).then(|| self.k_long / self.kstar)
    }

    /// Azimuth of the k* vector in the out-side plane.
    #[inline]
    pub fn phi(&self) -> f64 {
        self.k_side.atan2(self.k_out)
    }

    /// The same pair with the two particles exchanged: the vector part
    /// flips sign, the scalars are untouched.
    #[inline]
    #[must_use]
    pub fn exchanged(self) -> Self {
        Self {
            k_out: -self.k_out,
            k_side: -self.k_side,
            k_long: -self.k_long,
            ..self
        }
    }
}

/// Pair transverse momentum without the full decomposition.
#[must_use]
pub fn pair_kt(p1: &Particle, p2: &Particle) -> f64 {
    0.5 * (p1.px() + p2.px()).hypot(p1.py() + p2.py())
}

/// Computes the pair observables under two mass hypotheses.
///
/// Returns `None` for degenerate four-momenta (pair mass not timelike),
/// which callers skip rather than treat as an error. The result is
/// antisymmetric in its vector part under argument exchange, while `kstar`,
/// `kt` and `mt` are exchange invariant.
#[must_use]
pub fn pair_kinematics(
    p1: &Particle,
    m1: f64,
    p2: &Particle,
    m2: f64,
    frame: Frame,
) -> Option<PairKinematics> {
    let e1 = p1.energy(m1);
    let e2 = p2.energy(m2);

    let px = p1.px() + p2.px();
    let py = p1.py() + p2.py();
    let pz = p1.pz() + p2.pz();
    let e = e1 + e2;

    let dpx = p1.px() - p2.px();
    let dpy = p1.py() - p2.py();
    let dpz = p1.pz() - p2.pz();
    let de = e1 - e2;

    let pt_sq = px * px + py * py;
    let mt_sq = e * e - pz * pz;
    let minv_sq = mt_sq - pt_sq;
    if mt_sq <= 0.0 || minv_sq <= 0.0 {
        return None;
    }
    let pair_mt = mt_sq.sqrt();
    let minv = minv_sq.sqrt();
    let pt = pt_sq.sqrt();

    // Transverse decomposition: out along the pair pT, side perpendicular.
    // For a pair at rest in the transverse plane the axes are arbitrary;
    // fall back to the lab x/y axes.
    let (q_out_lcms, q_side) = if pt > 0.0 {
        ((dpx * px + dpy * py) / pt, (dpy * px - dpx * py) / pt)
    } else {
        (dpx, dpy)
    };

    // Longitudinal boost into the LCMS.
    let q_long = (e * dpz - pz * de) / pair_mt;
    let de_lcms = (e * de - pz * dpz) / pair_mt;

    // Optional outward boost into the pair rest frame.
    let q_out = match frame {
        Frame::Lcms => q_out_lcms,
        Frame::Prf => (pair_mt * q_out_lcms - pt * de_lcms) / minv,
    };

    let k_out = 0.5 * q_out;
    let k_side = 0.5 * q_side;
    let k_long = 0.5 * q_long;
    let kstar = (k_out * k_out + k_side * k_side + k_long * k_long).sqrt();

    let kt = 0.5 * pt;
    let mbar = 0.5 * (m1 + m2);
    let mt = (kt * kt + mbar * mbar).sqrt();

    Some(PairKinematics {
        kstar,
        k_out,
        k_side,
        k_long,
        kt,
        mt,
    })
}
