//! # CLI Module - Command Line Interface for the Traffic Pipeline
//!
//! Two pipeline stages, each operating on the output of the previous one:
//!
//! ## Stage 1: Scenario Generation (`generate-scenarios`)
//!
//! Draws reproducible traffic samples (departures at gates, arrivals staged
//! onto final) from a seeded RNG and saves each as editable JSON under
//! `<data>/scenario/`.
//!
//! **Usage**:
//! ```bash
//! skysim-rs generate-scenarios --count 10 --departures 3 --arrivals 2 --seed 7
//! ```
//!
//! ## Stage 2: Simulation (`simulate`)
//!
//! Replays every saved scenario through the deterministic tick loop, in
//! parallel across scenarios, and writes a report per run under
//! `<data>/run/` in both JSON and binary form.
//!
//! **Usage**:
//! ```bash
//! skysim-rs simulate --data-dir ./data --ticks 1800 --threads 4
//! ```
//!
//! Scenario parameters can also come from a TOML file via `--config`,
//! which wins over the individual flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage 1: Generate reproducible traffic scenarios
    GenerateScenarios {
        /// Number of scenarios to generate
        #[arg(short, long, default_value_t = 5)]
        count: usize,

        /// Departures per scenario
        #[arg(short, long, default_value_t = 2)]
        departures: usize,

        /// Arrivals per scenario
        #[arg(short, long, default_value_t = 1)]
        arrivals: usize,

        /// Base RNG seed
        #[arg(short, long, default_value_t = 7)]
        seed: u64,

        /// Tag used in scenario file names
        #[arg(long, default_value = "traffic")]
        tag: String,

        /// Optional TOML file with full scenario parameters
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base data directory
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Stage 2: Replay saved scenarios and write reports
    Simulate {
        /// Base data directory holding scenario files
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Maximum ticks per scenario
        #[arg(short, long, default_value_t = 1800)]
        ticks: usize,

        /// Tick size in milliseconds
        #[arg(long, default_value_t = 1000)]
        tick_millis: u64,

        /// Snapshot interval in ticks
        #[arg(long, default_value_t = 5)]
        frame_interval: usize,

        /// Worker threads for the scenario batch
        #[arg(long, default_value_t = 4)]
        threads: usize,
    },
}
