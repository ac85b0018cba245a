//! Bin axes and event similarity binning.
//!
//! Axes are half-open: a value equal to an inner edge belongs to the higher
//! bin, and the upper boundary is exclusive. Event binning combines the
//! vertex-z and multiplicity axes row-major; out-of-range events clamp to
//! the nearest edge bin so that every event maps to exactly one bin.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A one-dimensional binning, either uniform or with explicit edges.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinAxis {
    /// `n` equal-width bins covering `[min, max)`.
    Uniform {
        /// Number of bins.
        n: usize,
        /// Lower edge of the first bin.
        min: f64,
        /// Upper edge of the last bin (exclusive).
        max: f64,
    },
    /// Variable-width bins given by their edges (length = bins + 1).
    Edges(Vec<f64>),
}

impl BinAxis {
    /// Creates a uniform axis.
    ///
    /// # Errors
    /// Rejects zero bins, non-finite bounds and `max <= min`.
    pub fn uniform(n: usize, min: f64, max: f64) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidAxis("number of bins must be positive".into()));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidAxis("axis bounds must be finite".into()));
        }
        if max <= min {
            return Err(Error::InvalidAxis(format!(
                "upper bound {max} must exceed lower bound {min}"
            )));
        }
        Ok(Self::Uniform { n, min, max })
    }

    /// Creates a variable-width axis from explicit edges.
    ///
    /// # Errors
    /// Rejects fewer than two edges, non-finite edges, and edges not in
    /// strictly increasing order.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidAxis("at least two edges required".into()));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::InvalidAxis("edges must be finite".into()));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidAxis(
                "edges must be strictly increasing".into(),
            ));
        }
        Ok(Self::Edges(edges))
    }

    /// Number of bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        match self {
            Self::Uniform { n, .. } => *n,
            Self::Edges(edges) => edges.len() - 1,
        }
    }

    /// Lower edge of the first bin.
    #[must_use]
    pub fn low(&self) -> f64 {
        match self {
            Self::Uniform { min, .. } => *min,
            Self::Edges(edges) => edges[0],
        }
    }

    /// Upper edge of the last bin.
    #[must_use]
    pub fn high(&self) -> f64 {
        match self {
            Self::Uniform { max, .. } => *max,
            Self::Edges(edges) => edges[edges.len() - 1],
        }
    }

    /// Bin index of `value`, or `None` if it falls outside the axis.
    #[must_use]
    pub fn index_of(&self, value: f64) -> Option<usize> {
        match self {
            Self::Uniform { n, min, max } => {
                if value < *min || value >= *max {
                    return None;
                }
                let width = (max - min) / (*n as f64);
                // the cast truncates toward the lower bin
                let idx = ((value - min) / width) as usize;
                Some(idx.min(n - 1))
            }
            Self::Edges(edges) => {
                if value < edges[0] || value >= edges[edges.len() - 1] {
                    return None;
                }
                let idx = edges
                    .binary_search_by(|probe| probe.total_cmp(&value))
                    .unwrap_or_else(|i| i - 1);
                Some(idx)
            }
        }
    }

    /// Bin index of `value` with out-of-range values clamped to the edge
    /// bins.
    #[must_use]
    pub fn index_clamped(&self, value: f64) -> usize {
        if value < self.low() {
            0
        } else if value >= self.high() {
            self.n_bins() - 1
        } else {
            // in range, so index_of cannot fail
            self.index_of(value).unwrap_or(0)
        }
    }

    /// Edges of the axis, materialized.
    #[must_use]
    pub fn edges(&self) -> Vec<f64> {
        match self {
            Self::Uniform { n, min, max } => {
                let width = (max - min) / (*n as f64);
                (0..=*n).map(|i| min + width * (i as f64)).collect()
            }
            Self::Edges(edges) => edges.clone(),
        }
    }
}

/// Maps an event's (vertex-z, multiplicity) to a discrete similarity bin.
#[derive(Debug, Clone)]
pub struct EventBinning {
    vertex: BinAxis,
    multiplicity: BinAxis,
}

impl EventBinning {
    /// Creates the combined binning from the two axes.
    #[must_use]
    pub fn new(vertex: BinAxis, multiplicity: BinAxis) -> Self {
        Self {
            vertex,
            multiplicity,
        }
    }

    /// Total number of combined bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.vertex.n_bins() * self.multiplicity.n_bins()
    }

    /// Row-major combined bin index; every event maps to exactly one bin.
    #[must_use]
    pub fn bin_of(&self, vertex_z: f64, multiplicity: f64) -> usize {
        let iv = self.vertex.index_clamped(vertex_z);
        let im = self.multiplicity.index_clamped(multiplicity);
        iv * self.multiplicity.n_bins() + im
    }
}
