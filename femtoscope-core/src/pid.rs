//! Momentum-dependent particle-identification gates.
//!
//! Admission into the pairing is decided per species hypothesis from the
//! track's nsigma values. Pions and protons use a two-region rule: a
//! TPC-only cut below `p_tof_min` and a combined TPC+TOF cut above it.
//! Kaons use momentum-banded cuts with fixed thresholds.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::particle::{NsigmaPair, Particle};

/// Charged-pion mass (GeV/c^2).
pub const PION_MASS: f64 = 0.139_570_39;
/// Charged-kaon mass (GeV/c^2).
pub const KAON_MASS: f64 = 0.493_677;
/// Proton mass (GeV/c^2).
pub const PROTON_MASS: f64 = 0.938_272_088_16;

/// Supported species hypotheses.
///
/// The set is closed: a PDG code outside it is a configuration error, not a
/// silent rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Species {
    /// Charged pion (PDG +-211).
    Pion,
    /// Charged kaon (PDG +-321).
    Kaon,
    /// Proton or antiproton (PDG +-2212).
    Proton,
}

impl Species {
    /// Resolves a PDG code to a supported species.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSpecies`] for any code without an
    /// admission strategy.
    pub fn from_pdg(pdg: i32) -> Result<Self> {
        match pdg.abs() {
            211 => Ok(Self::Pion),
            321 => Ok(Self::Kaon),
            2212 => Ok(Self::Proton),
            _ => Err(Error::UnsupportedSpecies(pdg)),
        }
    }

    /// Mass of the species (GeV/c^2).
    #[inline]
    pub fn mass(self) -> f64 {
        match self {
            Self::Pion => PION_MASS,
            Self::Kaon => KAON_MASS,
            Self::Proton => PROTON_MASS,
        }
    }
}

/// Thresholds for the generic two-region admission rule.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TwoRegionThresholds {
    /// Momentum at which TOF starts being required (GeV/c).
    pub p_tof_min: f64,
    /// |nsigma TPC| cut below `p_tof_min`.
    pub nsigma_tpc_max: f64,
    /// Euclidean TPC+TOF cut at and above `p_tof_min`.
    pub nsigma_combined_max: f64,
}

impl Default for TwoRegionThresholds {
    fn default() -> Self {
        Self {
            p_tof_min: 0.5,
            nsigma_tpc_max: 3.0,
            nsigma_combined_max: 3.0,
        }
    }
}

/// Admission gate for one species hypothesis.
///
/// One strategy per supported species; construction from a PDG code fails
/// fast on anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeciesGate {
    /// Two-region rule with configurable thresholds.
    Pion(TwoRegionThresholds),
    /// Fixed momentum-banded cuts.
    Kaon,
    /// Two-region rule with configurable thresholds.
    Proton(TwoRegionThresholds),
}

impl SpeciesGate {
    /// Builds the gate for a species with the given two-region thresholds.
    ///
    /// The thresholds only apply to pions and protons; kaon bands are fixed.
    #[must_use]
    pub fn for_species(species: Species, thresholds: TwoRegionThresholds) -> Self {
        match species {
            Species::Pion => Self::Pion(thresholds),
            Species::Kaon => Self::Kaon,
            Species::Proton => Self::Proton(thresholds),
        }
    }

    /// Builds the gate from a PDG code.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSpecies`] for unknown codes.
    pub fn from_pdg(pdg: i32, thresholds: TwoRegionThresholds) -> Result<Self> {
        Ok(Self::for_species(Species::from_pdg(pdg)?, thresholds))
    }

    /// Species this gate selects for.
    #[inline]
    pub fn species(&self) -> Species {
        match self {
            Self::Pion(_) => Species::Pion,
            Self::Kaon => Species::Kaon,
            Self::Proton(_) => Species::Proton,
        }
    }

    /// Decides whether a particle is usable under this gate's hypothesis.
    ///
    /// Deterministic and side-effect free. A missing TOF signal falls back
    /// to the TPC-only comparison instead of rejecting outright.
    #[must_use]
    pub fn admit(&self, particle: &Particle) -> bool {
        let mom = particle.p();
        let nsigma = particle.pid.for_species(self.species());
        match self {
            Self::Pion(thresholds) | Self::Proton(thresholds) => {
                two_region(mom, nsigma, *thresholds)
            }
            Self::Kaon => kaon_bands(mom, nsigma),
        }
    }
}

/// Generic two-region rule: TPC-only below the TOF threshold, combined
/// TPC+TOF above it.
fn two_region(mom: f64, nsigma: NsigmaPair, thresholds: TwoRegionThresholds) -> bool {
    if mom < thresholds.p_tof_min {
        nsigma.tpc.abs() < thresholds.nsigma_tpc_max
    } else {
        match nsigma.tof {
            Some(tof) => nsigma.tpc.hypot(tof) < thresholds.nsigma_combined_max,
            None => nsigma.tpc.abs() < thresholds.nsigma_tpc_max,
        }
    }
}

/// Kaon momentum bands with fixed cuts.
fn kaon_bands(mom: f64, nsigma: NsigmaPair) -> bool {
    let tpc = nsigma.tpc.abs();
    if mom < 0.3 {
        tpc < 3.0
    } else if mom < 0.45 {
        tpc < 2.0
    } else if mom < 0.55 {
        tpc < 1.0
    } else if mom < 1.5 {
        // TPC and TOF both required from here on
        tpc < 3.0 && nsigma.tof.is_none_or(|tof| tof.abs() < 3.0)
    } else {
        tpc < 3.0 && nsigma.tof.is_none_or(|tof| tof.abs() < 2.0)
    }
}
