//! Particle types consumed by the pairing engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pid::Species;

/// Detector-response deviation for one species hypothesis.
///
/// TPC is always measured; TOF is only available once the track has been
/// matched to a time-of-flight signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NsigmaPair {
    /// nsigma from the TPC energy-loss response.
    pub tpc: f64,
    /// nsigma from the TOF response, if the track was matched.
    pub tof: Option<f64>,
}

impl NsigmaPair {
    /// Creates a pair with both detector responses.
    #[inline]
    pub fn new(tpc: f64, tof: f64) -> Self {
        Self {
            tpc,
            tof: Some(tof),
        }
    }

    /// Creates a TPC-only pair (no TOF match).
    #[inline]
    pub fn tpc_only(tpc: f64) -> Self {
        Self { tpc, tof: None }
    }
}

/// Per-species identification inputs for one track.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidSignals {
    /// nsigma values under the pion hypothesis.
    pub pion: NsigmaPair,
    /// nsigma values under the kaon hypothesis.
    pub kaon: NsigmaPair,
    /// nsigma values under the proton hypothesis.
    pub proton: NsigmaPair,
}

impl PidSignals {
    /// Returns the nsigma pair for the given species hypothesis.
    #[inline]
    pub fn for_species(&self, species: Species) -> NsigmaPair {
        match species {
            Species::Pion => self.pion,
            Species::Kaon => self.kaon,
            Species::Proton => self.proton,
        }
    }
}

/// A reconstructed track entering the pairing.
///
/// Kinematics are stored in the detector-native (pT, eta, phi)
/// parameterization; Cartesian components are derived on demand.
/// `track_id` is an opaque key identifying the underlying detector track,
/// used to veto pairs built twice from the same track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Transverse momentum (GeV/c).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle (radians).
    pub phi: f64,
    /// Charge sign (+1 or -1).
    pub sign: i8,
    /// Opaque key of the underlying detector track.
    pub track_id: u64,
    /// Identification inputs for all supported species hypotheses.
    pub pid: PidSignals,
}

impl Particle {
    /// x momentum component (GeV/c).
    #[inline]
    pub fn px(&self) -> f64 {
        self.pt * self.phi.cos()
    }

    /// y momentum component (GeV/c).
    #[inline]
    pub fn py(&self) -> f64 {
        self.pt * self.phi.sin()
    }

    /// z momentum component (GeV/c).
    #[inline]
    pub fn pz(&self) -> f64 {
        self.pt * self.eta.sinh()
    }

    /// Total momentum magnitude (GeV/c).
    #[inline]
    pub fn p(&self) -> f64 {
        self.pt * self.eta.cosh()
    }

    /// Energy under the given mass hypothesis (GeV).
    #[inline]
    pub fn energy(&self, mass: f64) -> f64 {
        let p = self.p();
        (mass * mass + p * p).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn signals() -> PidSignals {
        PidSignals {
            pion: NsigmaPair::new(0.1, 0.2),
            kaon: NsigmaPair::tpc_only(1.0),
            proton: NsigmaPair::new(5.0, 4.0),
        }
    }

    #[test]
    fn test_momentum_components() {
        let part = Particle {
            pt: 1.0,
            eta: 0.0,
            phi: std::f64::consts::FRAC_PI_2,
            sign: 1,
            track_id: 7,
            pid: signals(),
        };
        assert_relative_eq!(part.px(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(part.py(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(part.pz(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(part.p(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_at_finite_eta() {
        let part = Particle {
            pt: 0.5,
            eta: 1.0,
            phi: 0.0,
            sign: -1,
            track_id: 0,
            pid: signals(),
        };
        // p = pt cosh(eta), pz = pt sinh(eta)
        assert_relative_eq!(part.pz(), 0.5 * 1.0_f64.sinh(), epsilon = 1e-12);
        assert_relative_eq!(part.p(), 0.5 * 1.0_f64.cosh(), epsilon = 1e-12);
        // p^2 = pt^2 + pz^2
        assert_relative_eq!(
            part.p() * part.p(),
            part.pt * part.pt + part.pz() * part.pz(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_energy() {
        let part = Particle {
            pt: 3.0,
            eta: 0.0,
            phi: 0.0,
            sign: 1,
            track_id: 0,
            pid: signals(),
        };
        // E^2 = m^2 + p^2 with m = 4, p = 3 -> E = 5
        assert_relative_eq!(part.energy(4.0), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_signals_by_species() {
        let pid = signals();
        assert_eq!(pid.for_species(Species::Kaon).tof, None);
        assert_relative_eq!(pid.for_species(Species::Proton).tpc, 5.0);
    }
}
