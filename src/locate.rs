//! Point location against a built triangulation.
//!
//! Two strategies share the same walk: [`Strategy::Barycentric`] stops at the
//! enclosing simplex, [`Strategy::NaturalNeighbor`] goes on to compute the
//! Sibson neighbors of the query from the cavity its insertion would open.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use nalgebra::Vector4;

use crate::error::InterpolationError;
use crate::geometry::{self, BARYCENTRIC_TOLERANCE};
use crate::point::{dot, Point};
use crate::triangulation::{Simplex, Triangulation, WalkHint};

// Normalized volume below which a new cell on the hull counts as flat.
const HULL_BAND: f64 = 1e-6;

/// How a query is located and weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Barycentric coordinates in the enclosing simplex.
    #[default]
    Barycentric,
    /// Sibson natural-neighbor coordinates.
    NaturalNeighbor,
}

impl FromStr for Strategy {
    type Err = InterpolationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "barycentric" | "simplex" => Ok(Strategy::Barycentric),
            "natural-neighbor" | "natural_neighbor" | "nn" | "sibson" => Ok(Strategy::NaturalNeighbor),
            other => Err(InterpolationError::InvalidConfig {
                key: "strategy".to_string(),
                reason: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Barycentric => write!(f, "barycentric"),
            Strategy::NaturalNeighbor => write!(f, "natural-neighbor"),
        }
    }
}

/// A natural neighbor of a query and the volume it cedes to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaturalNeighbor {
    pub sample: usize,
    pub ceded: f64,
}

/// Outcome of locating one query point.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// The query coincides with a sample.
    Vertex(usize),
    /// The query lies in this simplex.
    Simplex(Simplex),
    /// Sibson neighbors of the query.
    Neighbors(Vec<NaturalNeighbor>),
    /// The query is outside the convex hull of the samples.
    NotInHull,
}

#[derive(Debug, Clone)]
pub struct Locator {
    triangulation: Arc<Triangulation>,
    strategy: Strategy,
}

impl Locator {
    pub fn new(triangulation: Arc<Triangulation>, strategy: Strategy) -> Self {
        Locator {
            triangulation,
            strategy,
        }
    }

    pub fn triangulation(&self) -> &Arc<Triangulation> {
        &self.triangulation
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Locates `query`, starting the walk from `hint` and updating it.
    ///
    /// The query must have the triangulation's dimension.
    pub fn locate(&self, query: &Point, hint: &mut WalkHint) -> Location {
        let tri = &self.triangulation;
        if let Some(vertex) = tri.vertex_at(query) {
            return Location::Vertex(vertex);
        }
        let (cell, lambda) = match tri.locate_cell(query, hint) {
            Some(found) => found,
            None => return Location::NotInHull,
        };

        match self.strategy {
            Strategy::Barycentric => Location::Simplex(tri.simplex_of(cell)),
            Strategy::NaturalNeighbor => match self.natural_neighbors(query, cell, &lambda) {
                Some(neighbors) => Location::Neighbors(neighbors),
                None => Location::Simplex(tri.simplex_of(cell)),
            },
        }
    }

    // Sibson neighbors from the Bowyer-Watson cavity of `query`. Returns `None`
    // where the Sibson cell would be unbounded or the cavity is unusable; the
    // caller then falls back to the enclosing simplex.
    fn natural_neighbors(
        &self,
        query: &Point,
        cell: usize,
        lambda: &Vector4<f64>,
    ) -> Option<Vec<NaturalNeighbor>> {
        let mesh = self.triangulation.mesh();
        let dim = mesh.dim;

        // On the hull boundary.
        for k in 0..=dim {
            let across = mesh.cells[cell].neighbors[k];
            if lambda[k] <= BARYCENTRIC_TOLERANCE && mesh.cells[across].is_hull(dim) {
                return None;
            }
        }
        if !mesh.in_conflict(cell, query) {
            debug!("Query {} is not in conflict with its own simplex", query);
            return None;
        }

        let mut cavity = vec![cell];
        let mut in_cavity = HashSet::from([cell]);
        let mut next = 0;
        while next < cavity.len() {
            let c = cavity[next];
            next += 1;
            for k in 0..=dim {
                let n = mesh.cells[c].neighbors[k];
                if in_cavity.contains(&n) || !mesh.in_conflict(n, query) {
                    continue;
                }
                if mesh.cells[n].is_hull(dim) {
                    return None;
                }
                in_cavity.insert(n);
                cavity.push(n);
            }
        }

        let mut old_centers = Vec::with_capacity(cavity.len());
        for &c in &cavity {
            old_centers.push((c, mesh.cells[c].sphere?.center));
        }

        // Cells the query would form with the cavity boundary. A nearly flat
        // one on the hull puts its circumcenter out of numerical reach.
        let mut new_cells: Vec<(Vec<usize>, Point)> = Vec::new();
        for &c in &cavity {
            for k in 0..=dim {
                let outer = mesh.cells[c].neighbors[k];
                if in_cavity.contains(&outer) {
                    continue;
                }
                let facet: Vec<usize> = (0..=dim)
                    .filter(|&s| s != k)
                    .map(|s| mesh.cells[c].vertices[s])
                    .collect();
                let mut points: Vec<Point> = facet.iter().map(|&v| mesh.points[v]).collect();
                points.push(*query);
                if mesh.cells[outer].is_hull(dim)
                    && geometry::normalized_volume(&points) <= HULL_BAND
                {
                    return None;
                }
                let center = geometry::circumsphere(&points)?.center;
                new_cells.push((facet, center));
            }
        }

        let neighbors: BTreeSet<usize> = cavity
            .iter()
            .flat_map(|&c| mesh.cells[c].vertices[..=dim].iter().copied())
            .collect();

        let mut result = Vec::with_capacity(neighbors.len());
        for &a in &neighbors {
            let pa = mesh.points[a];

            // Removed part of each old Voronoi facet between a and j.
            let mut removed: BTreeMap<usize, Vec<Point>> = BTreeMap::new();
            for &(c, center) in &old_centers {
                let cell = &mesh.cells[c];
                if !cell.contains_vertex(a, dim) {
                    continue;
                }
                for &j in cell.vertices[..=dim].iter().filter(|&&j| j != a) {
                    removed.entry(j).or_default().push(center);
                }
            }

            // New Voronoi facet between a and the query.
            let mut shared_with_query = Vec::new();
            for (facet, center) in &new_cells {
                if !facet.contains(&a) {
                    continue;
                }
                shared_with_query.push(*center);
                for &j in facet.iter().filter(|&&j| j != a) {
                    removed.entry(j).or_default().push(*center);
                }
            }

            // The ceded region is convex and bounded by the removed facets and
            // the new one; sum pyramids from its vertex centroid.
            let mut faces: Vec<(Point, Vec<Point>)> = removed
                .into_iter()
                .map(|(j, points)| (mesh.points[j], points))
                .collect();
            faces.push((*query, shared_with_query));
            let corners: Vec<Point> = faces
                .iter()
                .flat_map(|(_, points)| points.iter().copied())
                .collect();
            let apex = Point::centroid(&corners)?;

            let mut ceded = 0.0;
            for (other, points) in &faces {
                let normal = pa.sub(other);
                let mid = Point::centroid(&[pa, *other])?;
                let height = dot(&apex.sub(&mid), &normal, dim).abs() / pa.distance(other);
                ceded += height * geometry::facet_measure(points, &normal, dim) / dim as f64;
            }

            result.push(NaturalNeighbor {
                sample: a,
                ceded: ceded.max(0.0),
            });
        }
        Some(result)
    }
}
