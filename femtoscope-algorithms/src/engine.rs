//! Pass engine: channel wiring, event processing and mixing control.
//!
//! Events arrive as a single ordered stream. For every accepted event the
//! engine admits particles into the two configured roles, accumulates
//! same-event pairs into the numerators of the enabled channels, mixes the
//! event against the buffered contents of its similarity bin, and finally
//! inserts it into the pool. Candidate-pair evaluation inside one event is
//! spread over a rayon pool and reduced in deterministic order, so results
//! are reproducible given a fixed seed.
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use ndarray::Array3;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use femtoscope_core::{
    pair_kinematics, Event, Frame, PairKinematics, Particle, Species, SpeciesGate,
    TwoRegionThresholds,
};

use crate::accumulator::{CorrelationContainer, EventKind};
use crate::binning::{BinAxis, EventBinning};
use crate::close_pair::{is_clean_pair, ClosePairConfig, ClosePairRejection};
use crate::combinatorics::{pair_indices, PairPolicy};
use crate::error::{Error, Result};
use crate::mixing::{MixingPool, PooledEvent};

/// Thresholds of the two-region PID rule, re-exported for configuration.
pub type PidThresholds = TwoRegionThresholds;

/// Selection of one particle role.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RoleConfig {
    /// PDG code of the species hypothesis.
    pub pdg: i32,
    /// Required charge sign.
    pub sign: i8,
    /// Lower pT acceptance (GeV/c).
    pub pt_min: f64,
    /// Upper pT acceptance (GeV/c).
    pub pt_max: f64,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            pdg: 211,
            sign: 1,
            pt_min: 0.14,
            pt_max: 1.5,
        }
    }
}

/// Which correlation channels are accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelSelection {
    /// Role one against role two.
    pub opposite_sign: bool,
    /// Role one against itself.
    pub same_sign_positive: bool,
    /// Role two against itself.
    pub same_sign_negative: bool,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            opposite_sign: false,
            same_sign_positive: true,
            same_sign_negative: true,
        }
    }
}

/// Shape of the accumulated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputMode {
    /// A single cell binned in kstar only.
    KstarOnly,
    /// Cells differential in kstar, kT and multiplicity.
    Differential,
}

/// Identity of one correlation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelKind {
    /// Unlike-charge pairs (role one x role two).
    OppositeSign,
    /// Like-charge pairs from role one.
    SameSignPositive,
    /// Like-charge pairs from role two.
    SameSignNegative,
}

impl ChannelKind {
    /// Stable label used in reports and output files.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::OppositeSign => "opposite_sign",
            Self::SameSignPositive => "same_sign_positive",
            Self::SameSignNegative => "same_sign_negative",
        }
    }

    /// Whether the channel pairs a role with itself.
    #[must_use]
    fn is_identical(self) -> bool {
        !matches!(self, Self::OppositeSign)
    }
}

/// Full configuration surface of one analysis pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    /// First particle role.
    pub role_one: RoleConfig,
    /// Second particle role.
    pub role_two: RoleConfig,
    /// Two-region PID thresholds shared by both roles.
    pub pid: PidThresholds,
    /// |eta| acceptance for both roles.
    pub eta_max: f64,
    /// Lower multiplicity acceptance for events.
    pub multiplicity_min: f64,
    /// Upper multiplicity acceptance for events.
    pub multiplicity_max: f64,
    /// Events buffered per similarity bin.
    pub mixing_depth: usize,
    /// Maximum spherical-harmonic order.
    pub l_max: usize,
    /// Seed of the pair-slot sampling stream.
    pub seed: u64,
    /// Frame of the relative-momentum decomposition.
    pub frame: Frame,
    /// Close-pair veto; `None` disables it.
    pub close_pair: Option<ClosePairConfig>,
    /// Weight applied to denominator fills.
    pub mixed_weight: f64,
    /// Vertex-z axis of the event similarity binning.
    pub vertex_axis: BinAxis,
    /// Multiplicity axis of the event similarity binning.
    pub mixing_mult_axis: BinAxis,
    /// kstar axis of the accumulators.
    pub kstar_axis: BinAxis,
    /// Multiplicity cell axis (differential mode).
    pub cell_mult_axis: BinAxis,
    /// kT cell axis (differential mode).
    pub cell_kt_axis: BinAxis,
    /// Output shape.
    pub output: OutputMode,
    /// Enabled channels.
    pub channels: ChannelSelection,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            role_one: RoleConfig::default(),
            role_two: RoleConfig {
                sign: -1,
                ..RoleConfig::default()
            },
            pid: PidThresholds::default(),
            eta_max: 0.8,
            multiplicity_min: 0.0,
            multiplicity_max: 25_000.0,
            mixing_depth: 5,
            l_max: 2,
            seed: 0,
            frame: Frame::Lcms,
            close_pair: Some(ClosePairConfig::default()),
            mixed_weight: 1.0,
            vertex_axis: BinAxis::Uniform {
                n: 10,
                min: -10.0,
                max: 10.0,
            },
            mixing_mult_axis: BinAxis::Edges(vec![
                0.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 28.0, 32.0, 36.0, 40.0, 44.0, 48.0, 52.0,
                56.0, 60.0, 64.0, 68.0, 72.0, 76.0, 80.0, 84.0, 88.0, 92.0, 96.0, 100.0, 200.0,
                99_999.0,
            ]),
            kstar_axis: BinAxis::Uniform {
                n: 60,
                min: 0.0,
                max: 0.3,
            },
            cell_mult_axis: BinAxis::Edges(vec![0.0, 200.0]),
            cell_kt_axis: BinAxis::Edges(vec![0.1, 0.2, 0.3, 0.4]),
            output: OutputMode::Differential,
            channels: ChannelSelection::default(),
        }
    }
}

impl AnalysisConfig {
    /// Checks the configuration before any processing happens.
    ///
    /// # Errors
    /// Returns a configuration error for unsupported species codes, invalid
    /// acceptance windows or degenerate axes; nothing is processed with an
    /// invalid configuration.
    pub fn validate(&self) -> Result<()> {
        Species::from_pdg(self.role_one.pdg)?;
        Species::from_pdg(self.role_two.pdg)?;
        for (name, role) in [("role one", &self.role_one), ("role two", &self.role_two)] {
            if role.sign != 1 && role.sign != -1 {
                return Err(Error::Config(format!(
                    "{name}: charge sign must be +1 or -1, got {}",
                    role.sign
                )));
            }
            if !(role.pt_min >= 0.0 && role.pt_max > role.pt_min) {
                return Err(Error::Config(format!("{name}: invalid pT window")));
            }
        }
        if self.eta_max <= 0.0 {
            return Err(Error::Config("eta acceptance must be positive".into()));
        }
        if self.multiplicity_max <= self.multiplicity_min {
            return Err(Error::Config("invalid multiplicity window".into()));
        }
        if self.mixing_depth == 0 {
            return Err(Error::Config("mixing depth must be at least 1".into()));
        }
        if self.mixed_weight <= 0.0 {
            return Err(Error::Config("mixed-event weight must be positive".into()));
        }
        if self.l_max > 10 {
            return Err(Error::Config(format!(
                "harmonic order {} is beyond anything physical",
                self.l_max
            )));
        }
        if !self.channels.opposite_sign
            && !self.channels.same_sign_positive
            && !self.channels.same_sign_negative
        {
            return Err(Error::Config("no correlation channel enabled".into()));
        }
        check_axis("vertex", &self.vertex_axis)?;
        check_axis("mixing multiplicity", &self.mixing_mult_axis)?;
        check_axis("kstar", &self.kstar_axis)?;
        if self.output == OutputMode::Differential {
            check_axis("cell multiplicity", &self.cell_mult_axis)?;
            check_axis("cell kT", &self.cell_kt_axis)?;
        }
        Ok(())
    }
}

/// The axis variants are public, so validation re-runs the constructors.
fn check_axis(name: &str, axis: &BinAxis) -> Result<()> {
    match axis {
        BinAxis::Uniform { n, min, max } => BinAxis::uniform(*n, *min, *max),
        BinAxis::Edges(edges) => BinAxis::from_edges(edges.clone()),
    }
    .map(|_| ())
    .map_err(|err| Error::Config(format!("{name} axis: {err}")))
}

/// Counters accumulated over one pass.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineStatistics {
    /// Events offered to the engine.
    pub events_seen: u64,
    /// Events outside the multiplicity acceptance.
    pub events_rejected_multiplicity: u64,
    /// Particles admitted into role one.
    pub particles_role_one: u64,
    /// Particles admitted into role two.
    pub particles_role_two: u64,
    /// Same-event pairs accumulated.
    pub same_pairs_filled: u64,
    /// Mixed-event pairs accumulated.
    pub mixed_pairs_filled: u64,
    /// Pairs vetoed by close-pair rejection.
    pub pairs_rejected_close: u64,
    /// Pairs sharing an underlying track.
    pub pairs_rejected_unclean: u64,
    /// Pairs with degenerate four-momenta.
    pub pairs_degenerate: u64,
    /// Pairs outside the accumulator axes.
    pub pairs_out_of_acceptance: u64,
    /// Buffered events actually mixed against.
    pub mixed_partners: u64,
    /// Buffered events skipped for field-sign mismatch.
    pub field_sign_skips: u64,
    /// Same-event occupancy per similarity bin.
    pub same_bin_fills: Vec<u64>,
    /// Mixed-event pairings per similarity bin.
    pub mixed_bin_fills: Vec<u64>,
}

/// Outcome of evaluating one candidate pair.
enum PairOutcome {
    Fill(PairKinematics),
    Close,
    Unclean,
    Degenerate,
}

/// Accumulated output of one channel after a pass.
#[derive(Debug, Clone)]
pub struct ChannelResults {
    /// Channel identity.
    pub kind: ChannelKind,
    /// Numerator/denominator moment arrays.
    pub container: CorrelationContainer,
    /// Per-cell covariance of the numerator moments.
    pub covariance_same: Vec<Array3<f64>>,
    /// Per-cell covariance of the denominator moments.
    pub covariance_mixed: Vec<Array3<f64>>,
}

/// Everything a pass produces.
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    /// One result set per enabled channel.
    pub channels: Vec<ChannelResults>,
    /// Pass counters.
    pub statistics: EngineStatistics,
}

struct Channel {
    kind: ChannelKind,
    container: CorrelationContainer,
}

/// The pass driver.
pub struct CorrelationEngine {
    config: AnalysisConfig,
    gate_one: SpeciesGate,
    gate_two: SpeciesGate,
    mass_one: f64,
    mass_two: f64,
    binning: EventBinning,
    pool: MixingPool,
    veto: Option<ClosePairRejection>,
    channels: Vec<Channel>,
    rng: Xoshiro256PlusPlus,
    stats: EngineStatistics,
}

impl CorrelationEngine {
    /// Builds the engine, failing fast on an invalid configuration.
    ///
    /// # Errors
    /// Propagates everything [`AnalysisConfig::validate`] rejects.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let species_one = Species::from_pdg(config.role_one.pdg)?;
        let species_two = Species::from_pdg(config.role_two.pdg)?;
        let gate_one = SpeciesGate::for_species(species_one, config.pid);
        let gate_two = SpeciesGate::for_species(species_two, config.pid);

        let binning = EventBinning::new(
            config.vertex_axis.clone(),
            config.mixing_mult_axis.clone(),
        );
        let pool = MixingPool::new(binning.n_bins(), config.mixing_depth);

        let make_container = || match config.output {
            OutputMode::KstarOnly => {
                CorrelationContainer::kstar_only(config.kstar_axis.clone(), config.l_max)
            }
            OutputMode::Differential => CorrelationContainer::differential(
                config.kstar_axis.clone(),
                config.cell_mult_axis.clone(),
                config.cell_kt_axis.clone(),
                config.l_max,
            ),
        };
        let mut channels = Vec::new();
        if config.channels.opposite_sign {
            channels.push(Channel {
                kind: ChannelKind::OppositeSign,
                container: make_container(),
            });
        }
        if config.channels.same_sign_positive {
            channels.push(Channel {
                kind: ChannelKind::SameSignPositive,
                container: make_container(),
            });
        }
        if config.channels.same_sign_negative {
            channels.push(Channel {
                kind: ChannelKind::SameSignNegative,
                container: make_container(),
            });
        }

        let stats = EngineStatistics {
            same_bin_fills: vec![0; binning.n_bins()],
            mixed_bin_fills: vec![0; binning.n_bins()],
            ..EngineStatistics::default()
        };

        Ok(Self {
            veto: config.close_pair.clone().map(ClosePairRejection::new),
            rng: Xoshiro256PlusPlus::seed_from_u64(config.seed),
            mass_one: species_one.mass(),
            mass_two: species_two.mass(),
            gate_one,
            gate_two,
            binning,
            pool,
            channels,
            stats,
            config,
        })
    }

    /// Pass configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn statistics(&self) -> &EngineStatistics {
        &self.stats
    }

    /// Accumulated containers, one per enabled channel.
    #[must_use]
    pub fn containers(&self) -> impl Iterator<Item = (ChannelKind, &CorrelationContainer)> {
        self.channels
            .iter()
            .map(|channel| (channel.kind, &channel.container))
    }

    /// Processes one event: same-event accumulation, mixing against the
    /// pool, then insertion into the pool.
    pub fn process_event(&mut self, event: &Event) {
        self.stats.events_seen += 1;
        if event.multiplicity < self.config.multiplicity_min
            || event.multiplicity >= self.config.multiplicity_max
        {
            self.stats.events_rejected_multiplicity += 1;
            return;
        }

        let role_one = self.select_role(event, true);
        let role_two = self.select_role(event, false);
        self.stats.particles_role_one += role_one.len() as u64;
        self.stats.particles_role_two += role_two.len() as u64;

        let bin = self.binning.bin_of(event.vertex_z, event.multiplicity);
        self.stats.same_bin_fills[bin] += 1;

        self.accumulate_same_event(event, &role_one, &role_two);
        self.accumulate_mixed_event(event, bin, &role_one, &role_two);

        self.pool.insert(
            bin,
            PooledEvent {
                mag_field: event.mag_field,
                multiplicity: event.multiplicity,
                role_one,
                role_two,
            },
        );
    }

    /// Finishes the pass: derives the covariances and hands out the
    /// containers.
    #[must_use]
    pub fn finalize(self) -> AnalysisResults {
        let l_max = self.config.l_max;
        let channels = self
            .channels
            .into_iter()
            .map(|channel| ChannelResults {
                kind: channel.kind,
                covariance_same: channel.container.covariance(EventKind::Same, l_max),
                covariance_mixed: channel.container.covariance(EventKind::Mixed, l_max),
                container: channel.container,
            })
            .collect();
        AnalysisResults {
            channels,
            statistics: self.stats,
        }
    }

    fn select_role(&self, event: &Event, first: bool) -> Vec<Particle> {
        let (role, gate) = if first {
            (&self.config.role_one, &self.gate_one)
        } else {
            (&self.config.role_two, &self.gate_two)
        };
        event
            .particles
            .iter()
            .filter(|p| p.sign == role.sign)
            .filter(|p| p.pt > role.pt_min && p.pt < role.pt_max)
            .filter(|p| p.eta.abs() < self.config.eta_max)
            .filter(|p| gate.admit(p))
            .cloned()
            .collect()
    }

    fn accumulate_same_event(&mut self, event: &Event, role_one: &[Particle], role_two: &[Particle]) {
        for idx in 0..self.channels.len() {
            let kind = self.channels[idx].kind;
            let (list_a, list_b, policy) = match kind {
                ChannelKind::OppositeSign => (role_one, role_two, PairPolicy::FullCross),
                ChannelKind::SameSignPositive => (role_one, role_one, PairPolicy::StrictUpper),
                ChannelKind::SameSignNegative => (role_two, role_two, PairPolicy::StrictUpper),
            };
            let outcomes = evaluate_pairs(
                list_a,
                list_b,
                policy,
                self.masses_for(kind),
                self.config.frame,
                self.veto.as_ref(),
                event.mag_field,
                true,
            );
            self.apply_outcomes(
                idx,
                EventKind::Same,
                outcomes,
                event.multiplicity,
                kind.is_identical(),
                1.0,
            );
        }
    }

    fn accumulate_mixed_event(
        &mut self,
        event: &Event,
        bin: usize,
        role_one: &[Particle],
        role_two: &[Particle],
    ) {
        let mixed_weight = self.config.mixed_weight;

        // Evaluation borrows the pool, so all outcomes are gathered before
        // any container is touched.
        let per_channel: Vec<Vec<Vec<PairOutcome>>> = {
            let buffered = self.pool.occupancy(bin);
            let partners: Vec<&PooledEvent> =
                self.pool.windowed_partners(bin, event.mag_field).collect();
            self.stats.field_sign_skips += (buffered - partners.len()) as u64;
            self.stats.mixed_partners += partners.len() as u64;
            self.stats.mixed_bin_fills[bin] += partners.len() as u64;
            if partners.is_empty() {
                return;
            }

            let frame = self.config.frame;
            let veto = self.veto.as_ref();
            let mag_field = event.mag_field;

            self.channels
                .iter()
                .map(|channel| {
                    let kind = channel.kind;
                    let masses = self.masses_for(kind);
                    // Mixed pairs cross the new event with each buffered
                    // partner; cleaning does not apply across events.
                    partners
                        .par_iter()
                        .map(|partner| {
                            let (list_a, list_b) = match kind {
                                ChannelKind::OppositeSign => {
                                    (role_one, partner.role_two.as_slice())
                                }
                                ChannelKind::SameSignPositive => {
                                    (role_one, partner.role_one.as_slice())
                                }
                                ChannelKind::SameSignNegative => {
                                    (role_two, partner.role_two.as_slice())
                                }
                            };
                            evaluate_pairs(
                                list_a,
                                list_b,
                                PairPolicy::FullCross,
                                masses,
                                frame,
                                veto,
                                mag_field,
                                false,
                            )
                        })
                        .collect()
                })
                .collect()
        };

        for (idx, channel_outcomes) in per_channel.into_iter().enumerate() {
            for partner_outcomes in channel_outcomes {
                self.apply_outcomes(
                    idx,
                    EventKind::Mixed,
                    partner_outcomes,
                    event.multiplicity,
                    false,
                    mixed_weight,
                );
            }
        }
    }

    fn masses_for(&self, kind: ChannelKind) -> (f64, f64) {
        match kind {
            ChannelKind::OppositeSign => (self.mass_one, self.mass_two),
            ChannelKind::SameSignPositive => (self.mass_one, self.mass_one),
            ChannelKind::SameSignNegative => (self.mass_two, self.mass_two),
        }
    }

    /// Applies evaluated outcomes in deterministic order; the slot draw for
    /// identical-species pairs happens here, on the single owned stream.
    fn apply_outcomes(
        &mut self,
        channel_idx: usize,
        kind: EventKind,
        outcomes: Vec<PairOutcome>,
        multiplicity: f64,
        flip_slots: bool,
        weight: f64,
    ) {
        for outcome in outcomes {
            match outcome {
                PairOutcome::Fill(mut kinematics) => {
                    if flip_slots && self.rng.random::<f64>() <= 0.5 {
                        kinematics = kinematics.exchanged();
                    }
                    let filled = self.channels[channel_idx].container.fill(
                        kind,
                        &kinematics,
                        multiplicity,
                        weight,
                    );
                    if filled {
                        match kind {
                            EventKind::Same => self.stats.same_pairs_filled += 1,
                            EventKind::Mixed => self.stats.mixed_pairs_filled += 1,
                        }
                    } else {
                        self.stats.pairs_out_of_acceptance += 1;
                    }
                }
                PairOutcome::Close => self.stats.pairs_rejected_close += 1,
                PairOutcome::Unclean => self.stats.pairs_rejected_unclean += 1,
                PairOutcome::Degenerate => self.stats.pairs_degenerate += 1,
            }
        }
    }
}

/// Evaluates every candidate pair of one (channel, event-or-partner)
/// combination in parallel, preserving candidate order in the result.
#[allow(clippy::too_many_arguments)]
fn evaluate_pairs(
    list_a: &[Particle],
    list_b: &[Particle],
    policy: PairPolicy,
    masses: (f64, f64),
    frame: Frame,
    veto: Option<&ClosePairRejection>,
    mag_field: f64,
    check_clean: bool,
) -> Vec<PairOutcome> {
    let candidates: Vec<(usize, usize)> =
        pair_indices(policy, list_a.len(), list_b.len()).collect();
    candidates
        .into_par_iter()
        .map(|(i, j)| {
            let p1 = &list_a[i];
            let p2 = &list_b[j];
            if check_clean && !is_clean_pair(p1, p2) {
                return PairOutcome::Unclean;
            }
            if let Some(veto) = veto {
                if veto.is_close_pair(p1, p2, mag_field) {
                    return PairOutcome::Close;
                }
            }
            match pair_kinematics(p1, masses.0, p2, masses.1, frame) {
                Some(kinematics) => PairOutcome::Fill(kinematics),
                None => PairOutcome::Degenerate,
            }
        })
        .collect()
}
