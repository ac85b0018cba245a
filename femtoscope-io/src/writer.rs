//! Results output.
//!
//! Flattens the accumulated containers into a plain JSON document: axes,
//! per-cell counts, first moments and covariance, plus the pass counters.
//! Moment arrays are written as nested lists indexed the way the container
//! stores them.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use femtoscope_algorithms::{
    AnalysisResults, ChannelResults, CorrelationContainer, EngineStatistics, EventKind,
};

use crate::error::Result;

/// One side (numerator or denominator) of a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideExport {
    /// Raw counts per kstar bin.
    pub counts: Vec<f64>,
    /// Real first moments, one list per harmonic.
    pub re: Vec<Vec<f64>>,
    /// Imaginary first moments, one list per harmonic.
    pub im: Vec<Vec<f64>>,
    /// Covariance per kstar bin over the interleaved moment vector.
    pub covariance: Vec<Vec<Vec<f64>>>,
}

/// One (multiplicity, kT) cell of a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellExport {
    /// Multiplicity bin of the cell (0 in kstar-only mode).
    pub mult_bin: usize,
    /// kT bin of the cell (0 in kstar-only mode).
    pub kt_bin: usize,
    /// Same-event accumulation.
    pub same: SideExport,
    /// Mixed-event accumulation.
    pub mixed: SideExport,
}

/// One correlation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelExport {
    /// Channel label, e.g. `same_sign_positive`.
    pub channel: String,
    /// Maximum harmonic order.
    pub l_max: usize,
    /// kstar bin edges.
    pub kstar_edges: Vec<f64>,
    /// Multiplicity cell edges (differential mode only).
    pub mult_edges: Option<Vec<f64>>,
    /// kT cell edges (differential mode only).
    pub kt_edges: Option<Vec<f64>>,
    /// Cells, row-major over (multiplicity, kT).
    pub cells: Vec<CellExport>,
}

/// Whole-pass output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDocument {
    /// Pass counters.
    pub statistics: EngineStatistics,
    /// One entry per enabled channel.
    pub channels: Vec<ChannelExport>,
}

impl ResultsDocument {
    /// Flattens finalized results into the output form.
    #[must_use]
    pub fn from_results(results: &AnalysisResults) -> Self {
        Self {
            statistics: results.statistics.clone(),
            channels: results.channels.iter().map(export_channel).collect(),
        }
    }
}

fn export_channel(channel: &ChannelResults) -> ChannelExport {
    let container = &channel.container;
    let n_kt = container.kt_axis().map_or(1, |axis| axis.n_bins());
    let cells = (0..container.n_cells())
        .map(|idx| CellExport {
            mult_bin: idx / n_kt,
            kt_bin: idx % n_kt,
            same: export_side(container, EventKind::Same, idx, &channel.covariance_same[idx]),
            mixed: export_side(
                container,
                EventKind::Mixed,
                idx,
                &channel.covariance_mixed[idx],
            ),
        })
        .collect();
    ChannelExport {
        channel: channel.kind.label().to_string(),
        l_max: container.l_max(),
        kstar_edges: container.kstar_axis().edges(),
        mult_edges: container.mult_axis().map(femtoscope_algorithms::BinAxis::edges),
        kt_edges: container.kt_axis().map(femtoscope_algorithms::BinAxis::edges),
        cells,
    }
}

fn export_side(
    container: &CorrelationContainer,
    kind: EventKind,
    cell_idx: usize,
    covariance: &Array3<f64>,
) -> SideExport {
    let cell = &container.cells(kind)[cell_idx];
    SideExport {
        counts: cell.counts().to_vec(),
        re: cell.re().outer_iter().map(|row| row.to_vec()).collect(),
        im: cell.im().outer_iter().map(|row| row.to_vec()).collect(),
        covariance: covariance
            .outer_iter()
            .map(|matrix| matrix.outer_iter().map(|row| row.to_vec()).collect())
            .collect(),
    }
}

/// Writes finalized results as pretty-printed JSON.
///
/// # Errors
/// Fails if the file cannot be created or the document cannot be written.
pub fn write_results<P: AsRef<Path>>(path: P, results: &AnalysisResults) -> Result<()> {
    let document = ResultsDocument::from_results(results);
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use femtoscope_algorithms::{
        AnalysisConfig, BinAxis, ChannelSelection, CorrelationEngine, OutputMode,
    };
    use femtoscope_core::{Event, NsigmaPair, Particle, PidSignals};

    fn small_results() -> AnalysisResults {
        let config = AnalysisConfig {
            close_pair: None,
            output: OutputMode::KstarOnly,
            kstar_axis: BinAxis::Uniform {
                n: 10,
                min: 0.0,
                max: 2.0,
            },
            l_max: 1,
            channels: ChannelSelection {
                opposite_sign: true,
                same_sign_positive: false,
                same_sign_negative: false,
            },
            ..AnalysisConfig::default()
        };
        let mut engine = CorrelationEngine::new(config).unwrap();
        let pair = NsigmaPair::new(0.0, 0.0);
        let pid = PidSignals {
            pion: pair,
            kaon: pair,
            proton: pair,
        };
        let particle = |pt: f64, phi: f64, sign: i8, track_id: u64| Particle {
            pt,
            eta: 0.1,
            phi,
            sign,
            track_id,
            pid,
        };
        engine.process_event(&Event {
            vertex_z: 0.0,
            multiplicity: 10.0,
            mag_field: 0.5,
            particles: vec![particle(0.4, 0.3, 1, 1), particle(0.5, 1.4, -1, 2)],
        });
        engine.finalize()
    }

    #[test]
    fn test_document_shape() {
        let results = small_results();
        let document = ResultsDocument::from_results(&results);
        assert_eq!(document.channels.len(), 1);
        let channel = &document.channels[0];
        assert_eq!(channel.channel, "opposite_sign");
        assert_eq!(channel.kstar_edges.len(), 11);
        assert!(channel.mult_edges.is_none());
        assert_eq!(channel.cells.len(), 1);
        let cell = &channel.cells[0];
        // (l_max + 1)^2 = 4 moments
        assert_eq!(cell.same.re.len(), 4);
        assert_eq!(cell.same.counts.len(), 10);
        // interleaved covariance is 8 x 8
        assert_eq!(cell.same.covariance[0].len(), 8);
        assert_eq!(document.statistics.events_seen, 1);
    }

    #[test]
    fn test_write_and_parse_back() {
        let results = small_results();
        let file = tempfile::NamedTempFile::new().unwrap();
        write_results(file.path(), &results).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let parsed: ResultsDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.channels[0].channel, "opposite_sign");
        let total: f64 = parsed.channels[0].cells[0].same.counts.iter().sum();
        assert!(total > 0.0);
    }
}
