//! femtoscope-algorithms: event mixing and pair-correlation accumulation.
//!
//! This crate contains the algorithmic core of the analysis: candidate-pair
//! combinatorics, the geometric close-pair veto, event similarity binning,
//! the bounded event-mixing pool, and the differential spherical-harmonic
//! accumulator, wired together by [`CorrelationEngine`].

pub mod accumulator;
pub mod binning;
pub mod close_pair;
pub mod combinatorics;
pub mod engine;
pub mod error;
pub mod mixing;
pub mod spherical;

pub use accumulator::{CorrelationContainer, EventKind, ShCell};
pub use binning::{BinAxis, EventBinning};
pub use close_pair::{is_clean_pair, ClosePairConfig, ClosePairRejection};
pub use combinatorics::{pair_indices, PairIndices, PairPolicy};
pub use engine::{
    AnalysisConfig, AnalysisResults, ChannelKind, ChannelResults, ChannelSelection,
    CorrelationEngine, EngineStatistics, OutputMode, PidThresholds, RoleConfig,
};
pub use error::{Error, Result};
pub use mixing::{MixingPool, PooledEvent};
pub use spherical::SphericalHarmonics;
