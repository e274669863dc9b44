//! Delaunay triangulation of the calibration points.
//!
//! Construction is incremental Bowyer-Watson insertion over a mesh closed by
//! a symbolic vertex at infinity: every hull facet is joined to [`INFINITE`]
//! to form a hull cell, so inserting outside the current hull is handled by
//! the same cavity rule as inserting inside it. Points are inserted in
//! lexicographic order, which makes the result a function of the point set.
//!
//! Each insertion:
//! 1. finds one cell in conflict with the point (visibility walk, then scan),
//! 2. grows the conflict cavity breadth-first over adjacent conflicting cells,
//! 3. enlarges the cavity until every boundary facet is strictly visible from
//!    the point, so the re-triangulated region is star-shaped,
//! 4. cones the cavity boundary to the point and links the new cells.
//!
//! After the last insertion the live cells are compacted with finite cells
//! first, so cell `0` is always a valid walk start.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use log::debug;
use nalgebra::{Matrix4, Vector4};

use crate::error::{InterpolationError, Result};
use crate::geometry::{self, Sphere, BARYCENTRIC_TOLERANCE, ORIENTATION_TOLERANCE};
use crate::point::{Point, MAX_DIM};
use crate::samples::SampleStore;

/// Symbolic vertex at infinity.
pub(crate) const INFINITE: usize = usize::MAX;

const UNLINKED: usize = usize::MAX;
const SLOTS: usize = MAX_DIM + 1;

/// One cell of the closed mesh. Only the first `dim + 1` slots are used.
///
/// `neighbors[k]` is the cell across the facet opposite `vertices[k]`. For
/// finite cells `sphere` is the circumsphere; for hull cells it is the
/// circumsphere of the hull facet inside its own hyperplane.
#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub vertices: [usize; SLOTS],
    pub neighbors: [usize; SLOTS],
    pub sphere: Option<Sphere>,
    pub inverse: Option<Matrix4<f64>>,
}

impl Cell {
    fn unlinked(vertices: [usize; SLOTS]) -> Self {
        Cell {
            vertices,
            neighbors: [UNLINKED; SLOTS],
            sphere: None,
            inverse: None,
        }
    }

    pub fn is_hull(&self, dim: usize) -> bool {
        self.vertices[..=dim].contains(&INFINITE)
    }

    pub fn contains_vertex(&self, v: usize, dim: usize) -> bool {
        self.vertices[..=dim].contains(&v)
    }

    pub fn slot_of_neighbor(&self, n: usize, dim: usize) -> Option<usize> {
        self.neighbors[..=dim].iter().position(|&x| x == n)
    }
}

pub(crate) enum Walk {
    Inside {
        cell: usize,
        barycentric: Vector4<f64>,
    },
    Outside {
        hull_cell: usize,
    },
    Lost,
}

#[derive(Debug, Clone)]
pub(crate) struct Mesh {
    pub dim: usize,
    pub points: Vec<Point>,
    pub cells: Vec<Cell>,
    /// A point strictly inside the hull, used to orient hull facets.
    pub interior: Point,
}

impl Mesh {
    /// Finite vertex points of a cell in slot order.
    pub fn finite_points(&self, cell: &Cell) -> Vec<Point> {
        cell.vertices[..=self.dim]
            .iter()
            .filter(|&&v| v != INFINITE)
            .map(|&v| self.points[v])
            .collect()
    }

    fn facet_vertices(&self, cell: &Cell, slot: usize) -> Vec<usize> {
        (0..=self.dim)
            .filter(|&k| k != slot)
            .map(|k| cell.vertices[k])
            .collect()
    }

    /// Builds a cell with its cached sphere and barycentric inverse.
    fn prepare(&self, vertices: [usize; SLOTS]) -> Option<Cell> {
        let mut cell = Cell::unlinked(vertices);
        let points = self.finite_points(&cell);
        cell.sphere = Some(geometry::circumsphere(&points)?);
        if !cell.is_hull(self.dim) {
            cell.inverse = Some(geometry::barycentric_inverse(&points)?);
        }
        Some(cell)
    }

    /// Whether `p` lies strictly inside the circumsphere of cell `id`.
    ///
    /// A hull cell conflicts when `p` is strictly beyond its hull facet, or
    /// lies in the facet's hyperplane strictly inside the facet's circumsphere.
    pub fn in_conflict(&self, id: usize, p: &Point) -> bool {
        let cell = &self.cells[id];
        let inside_sphere = cell.sphere.map_or(false, |s| s.strictly_contains(p));
        if !cell.is_hull(self.dim) {
            return inside_sphere;
        }
        let facet = self.finite_points(cell);
        let side = geometry::orientation(&facet, p);
        if side.abs() <= ORIENTATION_TOLERANCE {
            return inside_sphere;
        }
        let inner = geometry::orientation(&facet, &self.interior);
        side.signum() != inner.signum()
    }

    pub fn barycentric(&self, id: usize, p: &Point) -> Option<Vector4<f64>> {
        self.cells[id]
            .inverse
            .as_ref()
            .map(|inv| geometry::barycentric_with(inv, p))
    }

    // Slot with the most negative coordinate, first one on ties.
    fn exit_slot(&self, lambda: &Vector4<f64>) -> usize {
        let mut exit = 0;
        for k in 1..=self.dim {
            if lambda[k] < lambda[exit] {
                exit = k;
            }
        }
        exit
    }

    /// Visibility walk from finite cell `start` towards `p`.
    pub fn walk(&self, p: &Point, start: usize) -> Walk {
        let mut current = start;
        for _ in 0..self.cells.len() {
            let lambda = match self.barycentric(current, p) {
                Some(lambda) => lambda,
                None => return Walk::Lost,
            };
            let exit = self.exit_slot(&lambda);
            if lambda[exit] >= -BARYCENTRIC_TOLERANCE {
                return Walk::Inside {
                    cell: current,
                    barycentric: lambda,
                };
            }
            let next = self.cells[current].neighbors[exit];
            if self.cells[next].is_hull(self.dim) {
                return Walk::Outside { hull_cell: next };
            }
            current = next;
        }
        Walk::Lost
    }

    /// First cell among `candidates` containing `p`.
    pub fn scan<I>(&self, p: &Point, candidates: I) -> Option<(usize, Vector4<f64>)>
    where
        I: IntoIterator<Item = usize>,
    {
        candidates.into_iter().find_map(|id| {
            let lambda = self.barycentric(id, p)?;
            (lambda[self.exit_slot(&lambda)] >= -BARYCENTRIC_TOLERANCE).then_some((id, lambda))
        })
    }
}

fn degenerate(reason: String) -> InterpolationError {
    InterpolationError::DegenerateInput { reason }
}

struct Builder {
    mesh: Mesh,
    alive: Vec<bool>,
    last: usize,
}

impl Builder {
    fn new(points: Vec<Point>, dim: usize, initial: &[usize]) -> Result<Self> {
        let simplex: Vec<Point> = initial.iter().map(|&v| points[v]).collect();
        let interior = Point::centroid(&simplex)
            .ok_or_else(|| degenerate("no initial simplex".to_string()))?;

        let mut builder = Builder {
            mesh: Mesh {
                dim,
                points,
                cells: Vec::new(),
                interior,
            },
            alive: Vec::new(),
            last: 0,
        };

        let mut vertices = [INFINITE; SLOTS];
        vertices[..=dim].copy_from_slice(initial);
        builder.push(vertices)?;
        for slot in 0..=dim {
            let mut hull = vertices;
            hull[slot] = INFINITE;
            builder.push(hull)?;
        }
        let ids: Vec<usize> = (0..builder.mesh.cells.len()).collect();
        builder.link(&ids)?;
        Ok(builder)
    }

    fn push(&mut self, vertices: [usize; SLOTS]) -> Result<usize> {
        let cell = self.mesh.prepare(vertices).ok_or_else(|| {
            let points: Vec<String> = vertices[..=self.mesh.dim]
                .iter()
                .filter(|&&v| v != INFINITE)
                .map(|&v| format!("#{} {}", v, self.mesh.points[v]))
                .collect();
            degenerate(format!("numerically flat simplex [{}]", points.join(", ")))
        })?;
        self.mesh.cells.push(cell);
        self.alive.push(true);
        Ok(self.mesh.cells.len() - 1)
    }

    fn facet_key(&self, id: usize, slot: usize) -> Vec<usize> {
        let mut key = self.mesh.facet_vertices(&self.mesh.cells[id], slot);
        key.sort_unstable();
        key
    }

    // Pairs up the unlinked facets of `ids`; every one must find a partner.
    fn link(&mut self, ids: &[usize]) -> Result<()> {
        let dim = self.mesh.dim;
        let mut open: BTreeMap<Vec<usize>, (usize, usize)> = BTreeMap::new();
        for &id in ids {
            for slot in 0..=dim {
                if self.mesh.cells[id].neighbors[slot] != UNLINKED {
                    continue;
                }
                let key = self.facet_key(id, slot);
                match open.remove(&key) {
                    Some((other, other_slot)) => {
                        self.mesh.cells[id].neighbors[slot] = other;
                        self.mesh.cells[other].neighbors[other_slot] = id;
                    }
                    None => {
                        open.insert(key, (id, slot));
                    }
                }
            }
        }
        if open.is_empty() {
            Ok(())
        } else {
            Err(degenerate(format!(
                "{} unmatched facets while re-triangulating",
                open.len()
            )))
        }
    }

    fn find_conflict(&self, p: &Point) -> Option<usize> {
        let seed = match self.mesh.walk(p, self.last) {
            Walk::Inside { cell, .. } => Some(cell),
            Walk::Outside { hull_cell } => Some(hull_cell),
            Walk::Lost => None,
        };
        if let Some(seed) = seed.filter(|&c| self.mesh.in_conflict(c, p)) {
            return Some(seed);
        }
        (0..self.mesh.cells.len()).find(|&c| self.alive[c] && self.mesh.in_conflict(c, p))
    }

    // A boundary facet is acceptable when `p` is strictly on the cavity side.
    fn visible(&self, id: usize, slot: usize, p: &Point) -> bool {
        let dim = self.mesh.dim;
        let cell = &self.mesh.cells[id];
        let facet = self.mesh.facet_vertices(cell, slot);
        if facet.contains(&INFINITE) {
            return true;
        }
        let facet: Vec<Point> = facet.iter().map(|&v| self.mesh.points[v]).collect();
        let side = geometry::orientation(&facet, p);
        if side.abs() <= ORIENTATION_TOLERANCE {
            return false;
        }

        let inner = cell.vertices[slot];
        if inner != INFINITE {
            let reference = geometry::orientation(&facet, &self.mesh.points[inner]);
            return side.signum() == reference.signum();
        }
        let outer = &self.mesh.cells[cell.neighbors[slot]];
        match outer.slot_of_neighbor(id, dim).map(|k| outer.vertices[k]) {
            Some(apex) if apex != INFINITE => {
                let reference = geometry::orientation(&facet, &self.mesh.points[apex]);
                side.signum() != reference.signum()
            }
            _ => true,
        }
    }

    fn insert(&mut self, v: usize) -> Result<()> {
        let dim = self.mesh.dim;
        let p = self.mesh.points[v];
        let seed = self.find_conflict(&p).ok_or_else(|| {
            degenerate(format!(
                "sample #{} at {} cannot be separated from its neighbors",
                v, p
            ))
        })?;

        let mut cavity = vec![seed];
        let mut in_cavity: HashSet<usize> = HashSet::from([seed]);
        let mut queue = VecDeque::from([seed]);
        while let Some(c) = queue.pop_front() {
            for slot in 0..=dim {
                let n = self.mesh.cells[c].neighbors[slot];
                if !in_cavity.contains(&n) && self.mesh.in_conflict(n, &p) {
                    in_cavity.insert(n);
                    cavity.push(n);
                    queue.push_back(n);
                }
            }
        }

        // Star-shape repair.
        loop {
            let mut added = Vec::new();
            for &c in &cavity {
                for slot in 0..=dim {
                    let outer = self.mesh.cells[c].neighbors[slot];
                    if in_cavity.contains(&outer) || added.contains(&outer) {
                        continue;
                    }
                    if !self.visible(c, slot, &p) {
                        added.push(outer);
                    }
                }
            }
            if added.is_empty() {
                break;
            }
            for outer in added {
                in_cavity.insert(outer);
                cavity.push(outer);
            }
        }

        let mut boundary = Vec::new();
        for &c in &cavity {
            for slot in 0..=dim {
                let outer = self.mesh.cells[c].neighbors[slot];
                if !in_cavity.contains(&outer) {
                    boundary.push((c, slot, outer));
                }
            }
        }
        if boundary.is_empty() {
            return Err(degenerate(format!(
                "sample #{} at {} swallowed the whole mesh",
                v, p
            )));
        }

        let first_new = self.mesh.cells.len();
        let mut last_finite = None;
        for (c, slot, outer) in boundary {
            let mut vertices = self.mesh.cells[c].vertices;
            vertices[slot] = v;
            let id = self.push(vertices)?;
            self.mesh.cells[id].neighbors[slot] = outer;

            let back = self.mesh.cells[outer]
                .slot_of_neighbor(c, dim)
                .ok_or_else(|| degenerate(format!("broken adjacency at cell {}", outer)))?;
            self.mesh.cells[outer].neighbors[back] = id;

            if !self.mesh.cells[id].is_hull(dim) {
                last_finite = Some(id);
            }
        }
        for &c in &cavity {
            self.alive[c] = false;
        }

        let new_ids: Vec<usize> = (first_new..self.mesh.cells.len()).collect();
        self.link(&new_ids)?;
        self.last = last_finite
            .ok_or_else(|| degenerate(format!("sample #{} at {} produced no simplex", v, p)))?;
        Ok(())
    }

    // Drops dead cells and renumbers: finite cells first, then hull cells.
    fn finish(self) -> Result<(Mesh, usize)> {
        let dim = self.mesh.dim;
        let (mut order, hull): (Vec<usize>, Vec<usize>) = (0..self.mesh.cells.len())
            .filter(|&c| self.alive[c])
            .partition(|&c| !self.mesh.cells[c].is_hull(dim));
        let finite_count = order.len();
        order.extend(hull);

        let mut remap = vec![UNLINKED; self.mesh.cells.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }

        let mut cells = Vec::with_capacity(order.len());
        for &old in &order {
            let mut cell = self.mesh.cells[old].clone();
            for slot in 0..=dim {
                let n = remap[cell.neighbors[slot]];
                if n == UNLINKED {
                    return Err(degenerate(format!("cell {} links to a removed cell", old)));
                }
                cell.neighbors[slot] = n;
            }
            cells.push(cell);
        }

        Ok((Mesh { cells, ..self.mesh }, finite_count))
    }
}

// First affinely independent `dim + 1` points in insertion order.
fn initial_simplex(points: &[Point], order: &[usize], dim: usize) -> Option<Vec<usize>> {
    let mut chosen = vec![*order.first()?];
    for &i in &order[1..] {
        if chosen.len() == dim + 1 {
            break;
        }
        let mut trial: Vec<Point> = chosen.iter().map(|&c| points[c]).collect();
        trial.push(points[i]);
        if geometry::affinely_independent(&trial) {
            chosen.push(i);
        }
    }
    (chosen.len() == dim + 1).then_some(chosen)
}

/// A finite simplex of the triangulation, as sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Simplex {
    vertices: [usize; SLOTS],
    len: usize,
}

impl Simplex {
    pub fn vertices(&self) -> &[usize] {
        &self.vertices[..self.len]
    }
}

/// Last cell a worker located in; speeds up queries that arrive in spatial order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkHint(usize);

/// Immutable Delaunay triangulation whose vertices are exactly the samples of a store.
///
/// Vertex `i` is sample `i` of the store it was built from.
#[derive(Debug, Clone)]
pub struct Triangulation {
    mesh: Mesh,
    finite_count: usize,
    lookup: HashMap<Point, usize>,
}

impl Triangulation {
    /// Triangulates the points of `store`.
    pub fn build(store: &SampleStore) -> Result<Self> {
        let dim = store.dim().ok_or(InterpolationError::EmptyStore)?;
        if !(2..=MAX_DIM).contains(&dim) {
            return Err(InterpolationError::UnsupportedDimension(dim));
        }
        let points = store.points();
        let n = points.len();
        if n < dim + 1 {
            return Err(degenerate(format!(
                "{} samples cannot span a {}-dimensional simplex (need at least {})",
                n,
                dim,
                dim + 1
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| points[a].cmp(&points[b]));

        let initial = initial_simplex(&points, &order, dim).ok_or_else(|| {
            degenerate(format!(
                "all {} samples lie in a common {}",
                n,
                if dim == 2 { "line" } else { "plane" }
            ))
        })?;

        let mut builder = Builder::new(points, dim, &initial)?;
        for &v in order.iter().filter(|v| !initial.contains(v)) {
            builder.insert(v)?;
        }
        let (mesh, finite_count) = builder.finish()?;

        let mut used = vec![false; n];
        for cell in &mesh.cells[..finite_count] {
            for &v in &cell.vertices[..=dim] {
                used[v] = true;
            }
        }
        if let Some(missing) = used.iter().position(|u| !u) {
            return Err(degenerate(format!(
                "sample #{} at {} was lost during triangulation",
                missing, mesh.points[missing]
            )));
        }

        debug!(
            "Triangulated {} samples in {}-D: {} simplices, {} hull facets",
            n,
            dim,
            finite_count,
            mesh.cells.len() - finite_count
        );

        let lookup = mesh
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i))
            .collect();

        Ok(Triangulation {
            mesh,
            finite_count,
            lookup,
        })
    }

    pub fn dim(&self) -> usize {
        self.mesh.dim
    }

    pub fn num_vertices(&self) -> usize {
        self.mesh.points.len()
    }

    pub fn num_simplices(&self) -> usize {
        self.finite_count
    }

    pub fn point(&self, vertex: usize) -> &Point {
        &self.mesh.points[vertex]
    }

    pub fn points(&self) -> &[Point] {
        &self.mesh.points
    }

    /// Vertex whose coordinates equal `p` exactly.
    pub fn vertex_at(&self, p: &Point) -> Option<usize> {
        self.lookup.get(p).copied()
    }

    pub fn simplices(&self) -> impl Iterator<Item = Simplex> + '_ {
        let len = self.mesh.dim + 1;
        self.mesh.cells[..self.finite_count]
            .iter()
            .map(move |cell| Simplex {
                vertices: cell.vertices,
                len,
            })
    }

    pub fn simplex_points(&self, simplex: &Simplex) -> Vec<Point> {
        simplex.vertices().iter().map(|&v| self.mesh.points[v]).collect()
    }

    pub fn simplex_volume(&self, simplex: &Simplex) -> f64 {
        geometry::simplex_volume(&self.simplex_points(simplex))
    }

    /// Total volume of all simplices, equal to the volume of the convex hull.
    pub fn hull_volume(&self) -> f64 {
        self.simplices().map(|s| self.simplex_volume(&s)).sum()
    }

    pub(crate) fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub(crate) fn simplex_of(&self, cell: usize) -> Simplex {
        Simplex {
            vertices: self.mesh.cells[cell].vertices,
            len: self.mesh.dim + 1,
        }
    }

    /// Finite cell containing `p` with its barycentric coordinates, or `None`
    /// when `p` is outside the convex hull.
    pub(crate) fn locate_cell(
        &self,
        p: &Point,
        hint: &mut WalkHint,
    ) -> Option<(usize, Vector4<f64>)> {
        let start = if hint.0 < self.finite_count { hint.0 } else { 0 };
        let found = match self.mesh.walk(p, start) {
            Walk::Inside { cell, barycentric } => Some((cell, barycentric)),
            Walk::Outside { .. } => None,
            Walk::Lost => {
                debug!("Walk towards {} did not settle, scanning all simplices", p);
                self.mesh.scan(p, 0..self.finite_count)
            }
        };
        if let Some((cell, _)) = found {
            hint.0 = cell;
        }
        found
    }
}
