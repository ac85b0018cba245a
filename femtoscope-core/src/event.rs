//! Collision-event types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::particle::Particle;

/// One processed collision event.
///
/// Read-only after creation; the pairing engine never mutates events, it
/// only buffers selections drawn from them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// z coordinate of the primary vertex (cm).
    pub vertex_z: f64,
    /// Multiplicity / centrality estimator.
    pub multiplicity: f64,
    /// Magnetic field (Tesla, signed).
    pub mag_field: f64,
    /// Reconstructed particles of this event.
    pub particles: Vec<Particle>,
}

impl Event {
    /// Sign of the magnetic field: -1, 0 or +1.
    #[inline]
    pub fn field_sign(&self) -> i8 {
        if self.mag_field > 0.0 {
            1
        } else if self.mag_field < 0.0 {
            -1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_sign() {
        let mut event = Event {
            vertex_z: 0.0,
            multiplicity: 10.0,
            mag_field: 0.5,
            particles: Vec::new(),
        };
        assert_eq!(event.field_sign(), 1);
        event.mag_field = -0.5;
        assert_eq!(event.field_sign(), -1);
        event.mag_field = 0.0;
        assert_eq!(event.field_sign(), 0);
    }
}
