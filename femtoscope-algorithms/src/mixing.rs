//! Bounded event-mixing pool.
//!
//! The pool keeps, per similarity bin, the most recent `depth` admitted
//! events in arrival order. Mixing pairs a new event against the buffered
//! contents of its bin *before* the event itself is inserted, so an event
//! never mixes with itself. Eviction is strictly FIFO.

use std::collections::VecDeque;

use femtoscope_core::Particle;

/// Per-role particle selections of one buffered event.
///
/// Only what mixing needs survives from the original event: the admitted
/// role lists, the field needed for the sign match, and the multiplicity.
#[derive(Debug, Clone)]
pub struct PooledEvent {
    /// Signed magnetic field of the event (Tesla).
    pub mag_field: f64,
    /// Multiplicity estimator of the event.
    pub multiplicity: f64,
    /// Particles admitted for the first role.
    pub role_one: Vec<Particle>,
    /// Particles admitted for the second role.
    pub role_two: Vec<Particle>,
}

impl PooledEvent {
    fn field_sign(&self) -> i8 {
        if self.mag_field > 0.0 {
            1
        } else if self.mag_field < 0.0 {
            -1
        } else {
            0
        }
    }
}

/// Bounded FIFO buffers of recent events, one per similarity bin.
#[derive(Debug)]
pub struct MixingPool {
    depth: usize,
    bins: Vec<VecDeque<PooledEvent>>,
}

impl MixingPool {
    /// Creates a pool with `n_bins` empty buffers bounded by `depth`.
    #[must_use]
    pub fn new(n_bins: usize, depth: usize) -> Self {
        Self {
            depth,
            bins: (0..n_bins).map(|_| VecDeque::with_capacity(depth)).collect(),
        }
    }

    /// Configured mixing depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of similarity bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    /// Number of events currently buffered in `bin`.
    #[must_use]
    pub fn occupancy(&self, bin: usize) -> usize {
        self.bins[bin].len()
    }

    /// Prior events of `bin` eligible for mixing against an event with the
    /// given field, in insertion order.
    ///
    /// Pairings across opposite field polarities are skipped; with fewer
    /// than `depth` buffered events mixing proceeds with what is there.
    pub fn windowed_partners(
        &self,
        bin: usize,
        mag_field: f64,
    ) -> impl Iterator<Item = &PooledEvent> {
        let sign = if mag_field > 0.0 {
            1
        } else if mag_field < 0.0 {
            -1
        } else {
            0
        };
        self.bins[bin]
            .iter()
            .filter(move |event| event.field_sign() == sign)
    }

    /// Appends an event to its bin, evicting the oldest entry when the bin
    /// is full.
    pub fn insert(&mut self, bin: usize, event: PooledEvent) {
        let buffer = &mut self.bins[bin];
        if buffer.len() == self.depth {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }
}
