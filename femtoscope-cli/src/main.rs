//!
//! Command-line front end for the femtoscope correlation analysis.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{Parser, Subcommand, ValueEnum};

use femtoscope_algorithms::{AnalysisConfig, CorrelationEngine, OutputMode};
use femtoscope_core::Frame;
use femtoscope_io::{write_results, EventFileReader};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    FemtoscopeIo(#[from] femtoscope_io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] femtoscope_algorithms::Error),
}

/// Frame of the relative-momentum decomposition.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrameArg {
    /// Longitudinally co-moving system
    Lcms,
    /// Pair rest frame
    Prf,
}

impl From<FrameArg> for Frame {
    fn from(value: FrameArg) -> Self {
        match value {
            FrameArg::Lcms => Frame::Lcms,
            FrameArg::Prf => Frame::Prf,
        }
    }
}

/// Output shape selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Single cell binned in kstar only
    KstarOnly,
    /// Cells differential in kstar, kT and multiplicity
    Differential,
}

impl From<ModeArg> for OutputMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::KstarOnly => OutputMode::KstarOnly,
            ModeArg::Differential => OutputMode::Differential,
        }
    }
}

/// Two-particle correlation functions from collision-event data.
#[derive(Parser)]
#[command(name = "femtoscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accumulate correlation containers from event files
    Process {
        /// Input event file(s), JSON lines
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Analysis configuration file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of events buffered per mixing bin
        #[arg(long)]
        mixing_depth: Option<usize>,

        /// Override the maximum spherical-harmonic order
        #[arg(long)]
        l_max: Option<usize>,

        /// Override the pair-slot sampling seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the decomposition frame
        #[arg(long, value_enum)]
        frame: Option<FrameArg>,

        /// Override the output shape
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            mixing_depth,
            l_max,
            seed,
            frame,
            mode,
            verbose,
        } => {
            let mut analysis = match config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => AnalysisConfig::default(),
            };
            if let Some(depth) = mixing_depth {
                analysis.mixing_depth = depth;
            }
            if let Some(l_max) = l_max {
                analysis.l_max = l_max;
            }
            if let Some(seed) = seed {
                analysis.seed = seed;
            }
            if let Some(frame) = frame {
                analysis.frame = frame.into();
            }
            if let Some(mode) = mode {
                analysis.output = mode.into();
            }

            if verbose {
                eprintln!("Processing {} file(s)...", input.len());
                eprintln!("Mixing depth: {}", analysis.mixing_depth);
                eprintln!("Harmonic order: {}", analysis.l_max);
                eprintln!("Frame: {:?}", analysis.frame);
            }

            let start = Instant::now();
            let mut engine = CorrelationEngine::new(analysis)?;
            for path in &input {
                for event in EventFileReader::open(path)? {
                    engine.process_event(&event?);
                }
                if verbose {
                    eprintln!(
                        "{}: {} events so far",
                        path.display(),
                        engine.statistics().events_seen
                    );
                }
            }
            let results = engine.finalize();

            if verbose {
                let stats = &results.statistics;
                eprintln!("Events: {}", stats.events_seen);
                eprintln!(
                    "  rejected by multiplicity window: {}",
                    stats.events_rejected_multiplicity
                );
                eprintln!(
                    "Pairs: {} same-event, {} mixed-event",
                    stats.same_pairs_filled, stats.mixed_pairs_filled
                );
                eprintln!(
                    "  rejected: {} close, {} unclean, {} degenerate, {} out of range",
                    stats.pairs_rejected_close,
                    stats.pairs_rejected_unclean,
                    stats.pairs_degenerate,
                    stats.pairs_out_of_acceptance
                );
                eprintln!(
                    "Mixing: {} partners, {} field-sign skips",
                    stats.mixed_partners, stats.field_sign_skips
                );
                eprintln!("Elapsed: {:.2?}", start.elapsed());
            }

            write_results(&output, &results)?;
            println!("Wrote {}", output.display());
        }

        Commands::Info { input } => {
            let mut events = 0_u64;
            let mut particles = 0_u64;
            let mut mult_range: Option<(f64, f64)> = None;
            let mut vertex_range: Option<(f64, f64)> = None;
            for event in EventFileReader::open(&input)? {
                let event = event?;
                events += 1;
                particles += event.particles.len() as u64;
                mult_range = Some(match mult_range {
                    None => (event.multiplicity, event.multiplicity),
                    Some((lo, hi)) => (lo.min(event.multiplicity), hi.max(event.multiplicity)),
                });
                vertex_range = Some(match vertex_range {
                    None => (event.vertex_z, event.vertex_z),
                    Some((lo, hi)) => (lo.min(event.vertex_z), hi.max(event.vertex_z)),
                });
            }
            println!("File: {}", input.display());
            println!("Events: {}", events);
            println!("Particles: {}", particles);
            if let Some((lo, hi)) = mult_range {
                println!("Multiplicity: {lo} to {hi}");
            }
            if let Some((lo, hi)) = vertex_range {
                println!("Vertex z: {lo} to {hi} cm");
            }
        }
    }

    Ok(())
}
