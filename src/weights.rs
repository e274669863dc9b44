//! Interpolation weights from a located simplex or neighbor set.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;
use nalgebra::Vector4;

use crate::error::{InterpolationError, Result};
use crate::geometry::{self, DEGENERACY_TOLERANCE};
use crate::locate::{Location, NaturalNeighbor};
use crate::point::{Point, MAX_DIM};
use crate::triangulation::{Simplex, Triangulation};

/// Default slack for negative barycentric weights produced by round-off.
pub const DEFAULT_CLAMP_TOLERANCE: f64 = 1e-6;

// Barycentric weights are dimensionless; a clamped sum below this is singular.
const MIN_WEIGHT_SUM: f64 = 1e-12;

/// Solves the homogeneous barycentric system of one simplex.
///
/// Implementations receive the `dim + 1` simplex vertices and the query and
/// return one coordinate per vertex (the trailing slot is zero in 2-D), or
/// `None` when the system is singular.
pub trait WeightSolver: Send + Sync + fmt::Debug {
    fn solve(&self, vertices: &[Point], query: &Point) -> Option<[f64; MAX_DIM + 1]>;
}

/// LU decomposition with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuSolver;

/// Column-pivoted QR; slower, more tolerant of badly shaped simplices.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrSolver;

fn finite_coordinates(x: Vector4<f64>) -> Option<[f64; MAX_DIM + 1]> {
    x.iter()
        .all(|v| v.is_finite())
        .then(|| [x[0], x[1], x[2], x[3]])
}

impl WeightSolver for LuSolver {
    fn solve(&self, vertices: &[Point], query: &Point) -> Option<[f64; MAX_DIM + 1]> {
        let (a, b) = geometry::homogeneous_system(vertices, query);
        finite_coordinates(a.lu().solve(&b)?)
    }
}

impl WeightSolver for QrSolver {
    fn solve(&self, vertices: &[Point], query: &Point) -> Option<[f64; MAX_DIM + 1]> {
        let (a, b) = geometry::homogeneous_system(vertices, query);
        finite_coordinates(a.col_piv_qr().solve(&b)?)
    }
}

/// Named choice of [`WeightSolver`] for configuration files and the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SolverKind {
    #[default]
    Lu,
    Qr,
}

impl SolverKind {
    pub fn solver(self) -> Arc<dyn WeightSolver> {
        match self {
            SolverKind::Lu => Arc::new(LuSolver),
            SolverKind::Qr => Arc::new(QrSolver),
        }
    }
}

impl FromStr for SolverKind {
    type Err = InterpolationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lu" => Ok(SolverKind::Lu),
            "qr" => Ok(SolverKind::Qr),
            other => Err(InterpolationError::InvalidConfig {
                key: "solver".to_string(),
                reason: format!("unknown solver '{}'", other),
            }),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Lu => write!(f, "lu"),
            SolverKind::Qr => write!(f, "qr"),
        }
    }
}

/// Normalized, strictly positive weights per contributing sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSet {
    entries: Vec<(usize, f64)>,
}

impl WeightSet {
    pub fn single(sample: usize) -> Self {
        WeightSet {
            entries: vec![(sample, 1.0)],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Weight of `sample`, zero when it does not contribute.
    pub fn weight_of(&self, sample: usize) -> f64 {
        self.entries
            .iter()
            .find(|(s, _)| *s == sample)
            .map_or(0.0, |(_, w)| *w)
    }
}

/// Turns a [`Location`] into a [`WeightSet`].
#[derive(Debug, Clone)]
pub struct WeightCalculator {
    solver: Arc<dyn WeightSolver>,
    clamp_tolerance: f64,
}

impl Default for WeightCalculator {
    fn default() -> Self {
        WeightCalculator::new(Arc::new(LuSolver), DEFAULT_CLAMP_TOLERANCE)
    }
}

impl WeightCalculator {
    pub fn new(solver: Arc<dyn WeightSolver>, clamp_tolerance: f64) -> Self {
        WeightCalculator {
            solver,
            clamp_tolerance,
        }
    }

    pub fn solver(&self) -> &Arc<dyn WeightSolver> {
        &self.solver
    }

    /// Weights for `query` at `location`; empty outside the hull.
    pub fn weights(
        &self,
        triangulation: &Triangulation,
        location: &Location,
        query: &Point,
    ) -> Result<WeightSet> {
        match location {
            Location::Vertex(sample) => Ok(WeightSet::single(*sample)),
            Location::NotInHull => Ok(WeightSet::default()),
            Location::Simplex(simplex) => self.barycentric(triangulation, simplex, query),
            Location::Neighbors(neighbors) => natural_neighbor(neighbors, query),
        }
    }

    fn barycentric(
        &self,
        triangulation: &Triangulation,
        simplex: &Simplex,
        query: &Point,
    ) -> Result<WeightSet> {
        let singular = || InterpolationError::SingularSimplex {
            vertices: simplex.vertices().to_vec(),
            query: *query,
        };

        let vertices = triangulation.simplex_points(simplex);
        if geometry::normalized_volume(&vertices) <= DEGENERACY_TOLERANCE {
            return Err(singular());
        }
        let lambda = self.solver.solve(&vertices, query).ok_or_else(singular)?;

        let mut entries = Vec::with_capacity(vertices.len());
        for (&sample, &w) in simplex.vertices().iter().zip(lambda.iter()) {
            if w < -self.clamp_tolerance {
                warn!(
                    "Barycentric weight {:.3e} of sample #{} for {} clamped to zero",
                    w, sample, query
                );
            }
            entries.push((sample, w.max(0.0)));
        }

        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if !(total > MIN_WEIGHT_SUM) {
            return Err(singular());
        }
        Ok(normalized(entries, total))
    }
}

fn natural_neighbor(neighbors: &[NaturalNeighbor], query: &Point) -> Result<WeightSet> {
    let total: f64 = neighbors.iter().map(|n| n.ceded).sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(InterpolationError::SingularSimplex {
            vertices: neighbors.iter().map(|n| n.sample).collect(),
            query: *query,
        });
    }
    Ok(normalized(
        neighbors.iter().map(|n| (n.sample, n.ceded)).collect(),
        total,
    ))
}

fn normalized(entries: Vec<(usize, f64)>, total: f64) -> WeightSet {
    WeightSet {
        entries: entries
            .into_iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(s, w)| (s, w / total))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::SampleStore;
    use crate::triangulation::WalkHint;
    use crate::locate::{Locator, Strategy};
    use approx::assert_relative_eq;

    fn triangle() -> Triangulation {
        let store = SampleStore::from_pairs(vec![
            (Point::from([0.0, 0.0]), vec![0.0]),
            (Point::from([3.0, 0.0]), vec![0.0]),
            (Point::from([0.0, 3.0]), vec![0.0]),
        ])
        .unwrap();
        Triangulation::build(&store).unwrap()
    }

    #[test]
    fn test_solvers_agree() {
        let vertices = [
            Point::from([0.0, 0.0, 0.0]),
            Point::from([1.0, 0.0, 0.0]),
            Point::from([0.0, 2.0, 0.0]),
            Point::from([0.0, 0.0, 4.0]),
        ];
        let q = Point::from([0.25, 0.5, 1.0]);
        let lu = LuSolver.solve(&vertices, &q).unwrap();
        let qr = QrSolver.solve(&vertices, &q).unwrap();
        for k in 0..4 {
            assert_relative_eq!(lu[k], qr[k], epsilon = 1e-12);
        }
        assert_relative_eq!(lu[1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(lu.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_2d_padding_is_zero() {
        let vertices = [Point::from([0.0, 0.0]), Point::from([1.0, 0.0]), Point::from([0.0, 1.0])];
        let w = QrSolver.solve(&vertices, &Point::from([0.2, 0.2])).unwrap();
        assert_relative_eq!(w[3], 0.0, epsilon = 1e-15);
        assert_relative_eq!(w[0], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_centroid_weights() {
        let tri = Arc::new(triangle());
        let locator = Locator::new(Arc::clone(&tri), Strategy::Barycentric);
        let q = Point::from([1.0, 1.0]);
        let location = locator.locate(&q, &mut WalkHint::default());
        let weights = WeightCalculator::default().weights(&tri, &location, &q).unwrap();
        assert_eq!(weights.len(), 3);
        for s in 0..3 {
            assert_relative_eq!(weights.weight_of(s), 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_weights_are_dropped() {
        let weights = normalized(vec![(0, 1.0), (1, 0.0), (2, 3.0)], 4.0);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights.weight_of(1), 0.0);
        assert_relative_eq!(weights.weight_of(2), 0.75);

        let tri = triangle();
        let q = Point::from([1.5, 0.0]);
        let simplex = tri.simplices().next().unwrap();
        let weights = WeightCalculator::default()
            .weights(&tri, &Location::Simplex(simplex), &q)
            .unwrap();
        assert!(weights.iter().all(|(_, w)| w > 0.0));
        assert!(weights.weight_of(2) < 1e-12);
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_neighbor_volume_is_singular() {
        let q = Point::from([0.0, 0.0]);
        let neighbors = [
            NaturalNeighbor { sample: 0, ceded: 0.0 },
            NaturalNeighbor { sample: 1, ceded: 0.0 },
        ];
        assert!(matches!(
            natural_neighbor(&neighbors, &q),
            Err(InterpolationError::SingularSimplex { .. })
        ));
        let set = natural_neighbor(&[NaturalNeighbor { sample: 4, ceded: 2.0 }], &q).unwrap();
        assert_eq!(set, WeightSet::single(4));
    }
}
