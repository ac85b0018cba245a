//! Geometric close-pair veto and pair cleaning.
//!
//! Two tracks reconstructed from shared or merged detector signals show up
//! as a pair with tiny angular separation. The veto propagates both tracks
//! as helices in the event's magnetic field and rejects the pair when the
//! separation at a reference radius falls inside the configured
//! delta-phi* / delta-eta window.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use femtoscope_core::Particle;

/// Radial positions (meters) of the reference surfaces used in per-radius
/// mode, spanning the active tracking volume.
const RADII_M: [f64; 9] = [0.8, 1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.2, 2.4];

/// Magnetic rigidity conversion: pT (GeV/c) = 0.3 * B (T) * R (m) * q.
const CURVATURE_CONST: f64 = 0.3;

/// Close-pair rejection window and geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClosePairConfig {
    /// Reference radius for the separation (meters).
    pub radius_m: f64,
    /// Lower edge of the delta-phi* rejection window.
    pub delta_phi_star_min: f64,
    /// Upper edge of the delta-phi* rejection window.
    pub delta_phi_star_max: f64,
    /// Lower edge of the delta-eta rejection window.
    pub delta_eta_min: f64,
    /// Upper edge of the delta-eta rejection window.
    pub delta_eta_max: f64,
    /// Check the full radius ladder instead of the single reference radius.
    pub per_radius: bool,
}

impl Default for ClosePairConfig {
    fn default() -> Self {
        Self {
            radius_m: 0.8,
            delta_phi_star_min: -0.01,
            delta_phi_star_max: 0.01,
            delta_eta_min: -0.01,
            delta_eta_max: 0.01,
            per_radius: false,
        }
    }
}

/// Shared-track-segment veto for particle pairs.
#[derive(Debug, Clone)]
pub struct ClosePairRejection {
    config: ClosePairConfig,
}

impl ClosePairRejection {
    /// Creates the veto with the given window.
    #[must_use]
    pub fn new(config: ClosePairConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ClosePairConfig {
        &self.config
    }

    /// Returns true when the pair is too close and must be rejected.
    ///
    /// `mag_field` is the signed field of the host event in Tesla; its sign
    /// flips the azimuthal bending direction of both helices.
    #[must_use]
    pub fn is_close_pair(&self, p1: &Particle, p2: &Particle, mag_field: f64) -> bool {
        let delta_eta = p1.eta - p2.eta;
        if delta_eta <= self.config.delta_eta_min || delta_eta >= self.config.delta_eta_max {
            return false;
        }
        if self.config.per_radius {
            RADII_M
                .iter()
                .any(|&radius| self.inside_phi_window(p1, p2, mag_field, radius))
        } else {
            self.inside_phi_window(p1, p2, mag_field, self.config.radius_m)
        }
    }

    fn inside_phi_window(&self, p1: &Particle, p2: &Particle, mag_field: f64, radius: f64) -> bool {
        match (
            phi_star(p1, mag_field, radius),
            phi_star(p2, mag_field, radius),
        ) {
            (Some(phi1), Some(phi2)) => {
                let delta = wrap_to_pi(phi1 - phi2);
                delta > self.config.delta_phi_star_min && delta < self.config.delta_phi_star_max
            }
            // a track curling up before the reference radius cannot overlap
            // with anything there
            _ => false,
        }
    }
}

/// Azimuth of a track helix at the given radius, or `None` when the track's
/// bending radius is too small to reach it.
fn phi_star(particle: &Particle, mag_field: f64, radius_m: f64) -> Option<f64> {
    let arg =
        -CURVATURE_CONST * f64::from(particle.sign) * mag_field * radius_m / (2.0 * particle.pt);
    if arg.abs() > 1.0 {
        return None;
    }
    Some(particle.phi + arg.asin())
}

/// Wraps an angle difference into (-pi, pi].
fn wrap_to_pi(angle: f64) -> f64 {
    let mut a = angle % std::f64::consts::TAU;
    if a > std::f64::consts::PI {
        a -= std::f64::consts::TAU;
    } else if a <= -std::f64::consts::PI {
        a += std::f64::consts::TAU;
    }
    a
}

/// Returns true when the two particles come from distinct detector tracks.
///
/// A pair sharing the underlying track is unclean and must be dropped.
#[must_use]
pub fn is_clean_pair(p1: &Particle, p2: &Particle) -> bool {
    p1.track_id != p2.track_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use femtoscope_core::{NsigmaPair, PidSignals};

    fn track(pt: f64, eta: f64, phi: f64, sign: i8, track_id: u64) -> Particle {
        let pair = NsigmaPair::tpc_only(0.0);
        Particle {
            pt,
            eta,
            phi,
            sign,
            track_id,
            pid: PidSignals {
                pion: pair,
                kaon: pair,
                proton: pair,
            },
        }
    }

    fn veto(window: f64) -> ClosePairRejection {
        ClosePairRejection::new(ClosePairConfig {
            radius_m: 1.0,
            delta_phi_star_min: -window,
            delta_phi_star_max: window,
            delta_eta_min: -window,
            delta_eta_max: window,
            per_radius: false,
        })
    }

    #[test]
    fn test_phi_star_bends_with_field_sign() {
        let part = track(1.0, 0.0, 0.0, 1, 0);
        let plus = phi_star(&part, 0.5, 1.0).unwrap();
        let minus = phi_star(&part, -0.5, 1.0).unwrap();
        assert_relative_eq!(plus, -minus, epsilon = 1e-12);
        // -0.3 * 0.5 * 1.0 / (2 * 1.0) = -0.075
        assert_relative_eq!(plus, (-0.075_f64).asin(), epsilon = 1e-12);
    }

    #[test]
    fn test_low_pt_track_never_reaches_radius() {
        // pT so small the helix curls before r = 1 m
        let part = track(0.05, 0.0, 0.0, 1, 0);
        assert!(phi_star(&part, 0.5, 1.0).is_none());
    }

    #[test]
    fn test_identical_kinematics_rejected() {
        let p1 = track(1.0, 0.1, 1.0, 1, 1);
        let p2 = track(1.0, 0.1, 1.0, 1, 2);
        assert!(veto(0.02).is_close_pair(&p1, &p2, 0.5));
    }

    #[test]
    fn test_distant_pair_kept() {
        let p1 = track(1.0, 0.1, 0.0, 1, 1);
        let p2 = track(1.0, -0.5, 2.0, 1, 2);
        assert!(!veto(0.02).is_close_pair(&p1, &p2, 0.5));
    }

    #[test]
    fn test_eta_separation_escapes_window() {
        let p1 = track(1.0, 0.3, 1.0, 1, 1);
        let p2 = track(1.0, 0.1, 1.0, 1, 2);
        assert!(!veto(0.02).is_close_pair(&p1, &p2, 0.5));
    }

    #[test]
    fn test_opposite_charges_separate_at_radius() {
        // Same momentum, opposite bending: delta-phi* grows with radius.
        let p1 = track(0.5, 0.0, 1.0, 1, 1);
        let p2 = track(0.5, 0.0, 1.0, -1, 2);
        let delta =
            phi_star(&p1, 0.5, 1.0).unwrap() - phi_star(&p2, 0.5, 1.0).unwrap();
        assert!(delta.abs() > 0.2);
        assert!(!veto(0.02).is_close_pair(&p1, &p2, 0.5));
    }

    #[test]
    fn test_per_radius_mode_catches_crossing_tracks() {
        // These helices cross near r = 1.4 m: at the outermost reference
        // radius they are already separated, but the ladder still flags the
        // crossing point.
        let p1 = track(0.4, 0.0, 1.0, 1, 1);
        let p2 = track(0.42, 0.0, 0.985, 1, 2);
        let mut config = ClosePairConfig {
            radius_m: 2.4,
            delta_phi_star_min: -0.005,
            delta_phi_star_max: 0.005,
            delta_eta_min: -0.02,
            delta_eta_max: 0.02,
            per_radius: false,
        };
        let single = ClosePairRejection::new(config.clone());
        config.per_radius = true;
        let ladder = ClosePairRejection::new(config);
        assert!(!single.is_close_pair(&p1, &p2, 0.5));
        assert!(ladder.is_close_pair(&p1, &p2, 0.5));
    }

    #[test]
    fn test_clean_pair() {
        let p1 = track(1.0, 0.0, 0.0, 1, 42);
        let p2 = track(1.0, 0.5, 1.0, 1, 42);
        let p3 = track(1.0, 0.5, 1.0, 1, 43);
        assert!(!is_clean_pair(&p1, &p2));
        assert!(is_clean_pair(&p1, &p3));
    }

    #[test]
    fn test_wrap_to_pi() {
        assert_relative_eq!(wrap_to_pi(0.1), 0.1, epsilon = 1e-12);
        assert_relative_eq!(
            wrap_to_pi(std::f64::consts::TAU - 0.1),
            -0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            wrap_to_pi(-std::f64::consts::TAU + 0.1),
            0.1,
            epsilon = 1e-12
        );
    }
}
