//! # Color Interp
//!
//! Scattered-data interpolation of color responses from sparse calibration
//! samples. Calibration points in a 2-D or 3-D control space (for example the
//! three intensity settings of a light) each carry a measured output vector;
//! the library predicts the output at arbitrary control settings.
//!
//! The main components are:
//! - `SampleStore`: the calibration samples of one channel.
//! - `Triangulation`: a Delaunay triangulation of the sample points, built once
//!   and shared read-only.
//! - `Locator` and `WeightCalculator`: barycentric or natural-neighbor weights
//!   for a query point, with a pluggable `WeightSolver` for the linear solve.
//! - `Interpolator`: weighted combination of sample values, with a configurable
//!   `OutsideHullPolicy`.
//! - `BatchScheduler`: concurrent evaluation of large query sets over many
//!   channels.

pub mod batch;
pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod interpolate;
pub mod locate;
pub mod point;
pub mod samples;
pub mod triangulation;
pub mod weights;

pub use batch::{BatchScheduler, ChannelResults, ResultMap};
pub use channel::{build_channels, Channel, ChannelBuild};
pub use config::InterpolationConfig;
pub use error::{InterpolationError, Result};
pub use grid::GridSpec;
pub use interpolate::{InterpolationResult, Interpolator, OutsideHullPolicy};
pub use locate::{Location, Locator, NaturalNeighbor, Strategy};
pub use point::{Point, MAX_DIM};
pub use samples::{Sample, SampleStore};
pub use triangulation::{Simplex, Triangulation, WalkHint};
pub use weights::{LuSolver, QrSolver, SolverKind, WeightCalculator, WeightSet, WeightSolver};
