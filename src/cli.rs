use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use color_interp::{InterpolationConfig, OutsideHullPolicy, SolverKind, Strategy};

/// Command-line arguments for the color-interp tool.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Predicts the color response on a regular control grid from sparse calibration samples."
)]
pub struct Args {
    /// Calibration CSV files, one per output channel. The file stem names the channel.
    #[arg(short, long = "input", value_name = "CSV", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Path to save the output CSV file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of control coordinates per calibration row (2 or 3).
    #[arg(short, long, default_value_t = 3)]
    pub dim: usize,

    /// Lower bound of the query grid on every axis.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub grid_min: f64,

    /// Upper bound of the query grid on every axis.
    #[arg(long, default_value_t = 255.0, allow_negative_numbers = true)]
    pub grid_max: f64,

    /// Spacing of the query grid.
    #[arg(long, default_value_t = 1.0)]
    pub grid_step: f64,

    /// Interpolation weights to use.
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// What to report for grid points outside the calibrated range.
    #[arg(long, value_enum)]
    pub outside: Option<OutsideArg>,

    /// Linear solver for barycentric weights.
    #[arg(long, value_enum)]
    pub solver: Option<SolverArg>,

    /// Number of threads to use. 0 uses all available processors.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Number of grid points per scheduling chunk.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Configuration file with `key = value` defaults.
    #[arg(long, default_value = "app.config")]
    pub config: PathBuf,
}

impl Args {
    /// Overrides configuration values with the flags given on the command line.
    pub fn apply(&self, config: &mut InterpolationConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if let Some(outside) = self.outside {
            config.outside_hull = outside.into();
        }
        if let Some(solver) = self.solver {
            config.solver = solver.into();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Barycentric coordinates in the enclosing simplex.
    Barycentric,
    /// Sibson natural-neighbor coordinates.
    NaturalNeighbor,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Barycentric => Strategy::Barycentric,
            StrategyArg::NaturalNeighbor => Strategy::NaturalNeighbor,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutsideArg {
    /// Mark the point as outside and write no values.
    Marker,
    /// Write a zero vector.
    Zero,
    /// Write the value of the nearest calibration sample.
    Nearest,
}

impl From<OutsideArg> for OutsideHullPolicy {
    fn from(arg: OutsideArg) -> Self {
        match arg {
            OutsideArg::Marker => OutsideHullPolicy::Marker,
            OutsideArg::Zero => OutsideHullPolicy::Zero,
            OutsideArg::Nearest => OutsideHullPolicy::NearestSample,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SolverArg {
    Lu,
    Qr,
}

impl From<SolverArg> for SolverKind {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Lu => SolverKind::Lu,
            SolverArg::Qr => SolverKind::Qr,
        }
    }
}
