//! Geometric predicates and measures over small simplices.
//!
//! Every predicate works on normalized quantities (determinants divided by the
//! product of their row norms) so that the tolerances below do not depend on
//! the scale of the control space. Calibration grids in 0..=255 and unit cubes
//! behave the same way.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Vector4};

use crate::point::{dot, Offset, Point, MAX_DIM};

/// Relative slack on the squared circumradius; points inside the slack are ties.
pub const IN_SPHERE_TOLERANCE: f64 = 1e-10;

/// Normalized orientation values at or below this are treated as coplanar.
pub const ORIENTATION_TOLERANCE: f64 = 1e-10;

/// Barycentric coordinates down to `-BARYCENTRIC_TOLERANCE` still count as inside.
pub const BARYCENTRIC_TOLERANCE: f64 = 1e-9;

/// Normalized volume at or below which a simplex is singular.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Circumscribed sphere of a simplex (or of a facet, inside its affine hull).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point,
    pub radius_squared: f64,
}

impl Sphere {
    /// True when `p` lies inside the sphere by more than the tie tolerance.
    pub fn strictly_contains(&self, p: &Point) -> bool {
        self.center.distance_squared(p) < self.radius_squared * (1.0 - IN_SPHERE_TOLERANCE)
    }
}

/// Circumsphere through `points` (2 to `MAX_DIM + 1` of them).
///
/// The center is found in the span of the edge vectors from the first point,
/// so it always lies in the affine hull of the points. The edge matrix is
/// factored by QR and the normal equations are never formed. Returns `None`
/// when the points are affinely dependent.
pub fn circumsphere(points: &[Point]) -> Option<Sphere> {
    let (origin, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let dim = origin.dim();
    let edges: Vec<Offset> = rest.iter().map(|p| p.sub(origin)).collect();
    if edges.len() > dim {
        return None;
    }

    let qr = edge_matrix(&edges, dim).qr();
    let r = qr.r();
    if normalized_span(&edges, &r, dim) <= DEGENERACY_TOLERANCE {
        return None;
    }
    // Center offset c = E y with E^T E y = b. For E = QR: R^T z = b, c = Q z.
    let rhs = DVector::from_fn(edges.len(), |i, _| 0.5 * dot(&edges[i], &edges[i], dim));
    let z = r.transpose().solve_lower_triangular(&rhs)?;
    let c = qr.q() * z;

    let mut offset = [0.0; MAX_DIM];
    for axis in 0..dim {
        offset[axis] = c[axis];
    }
    let center = origin.offset(&offset);
    if !center.is_finite() {
        return None;
    }
    Some(Sphere {
        center,
        radius_squared: dot(&offset, &offset, dim),
    })
}

// Edges as columns of a dim x k matrix.
fn edge_matrix(edges: &[Offset], dim: usize) -> DMatrix<f64> {
    DMatrix::from_fn(dim, edges.len(), |i, j| edges[j][i])
}

// prod |R_jj| / prod |e_j| for the QR factor of the edge matrix: the volume
// spanned by the edges relative to a box with the same edge lengths. Zero for
// dependent edges, one for orthogonal ones.
fn normalized_span(edges: &[Offset], r: &DMatrix<f64>, dim: usize) -> f64 {
    let mut ratio = 1.0;
    for (j, edge) in edges.iter().enumerate() {
        let len = dot(edge, edge, dim).sqrt();
        if len == 0.0 {
            return 0.0;
        }
        ratio *= r[(j, j)].abs() / len;
    }
    ratio
}

/// True when the points span a simplex of their own dimension (count - 1).
pub fn affinely_independent(points: &[Point]) -> bool {
    match points.split_first() {
        None => false,
        Some((_, [])) => true,
        Some((origin, rest)) => {
            let dim = origin.dim();
            let edges: Vec<Offset> = rest.iter().map(|p| p.sub(origin)).collect();
            if edges.len() > dim {
                return false;
            }
            let r = edge_matrix(&edges, dim).qr().r();
            normalized_span(&edges, &r, dim) > ORIENTATION_TOLERANCE
        }
    }
}

/// Determinant of the first `dim` rows and columns.
pub fn determinant(rows: &[Offset], dim: usize) -> f64 {
    match dim {
        2 => rows[0][0] * rows[1][1] - rows[0][1] * rows[1][0],
        3 => Matrix3::from_fn(|i, j| rows[i][j]).determinant(),
        _ => DMatrix::from_fn(dim, dim, |i, j| rows[i][j]).determinant(),
    }
}

/// Signed, scale-free orientation of `q` against a facet of `dim` points.
///
/// The sign tells which side of the facet's hyperplane `q` is on; the magnitude
/// is the normalized volume of the simplex facet + `q`. Only signs computed
/// against the same facet ordering are comparable.
pub fn orientation(facet: &[Point], q: &Point) -> f64 {
    let dim = q.dim();
    let origin = &facet[0];
    let mut rows = [[0.0; MAX_DIM]; MAX_DIM];
    for i in 1..dim {
        rows[i - 1] = facet[i].sub(origin);
    }
    rows[dim - 1] = q.sub(origin);

    let mut norms = 1.0;
    for row in rows.iter().take(dim) {
        norms *= dot(row, row, dim).sqrt();
    }
    if norms == 0.0 {
        return 0.0;
    }
    determinant(&rows, dim) / norms
}

/// Normalized volume of a full simplex, in `[0, 1]`.
pub fn normalized_volume(simplex: &[Point]) -> f64 {
    let dim = simplex[0].dim();
    orientation(&simplex[..dim], &simplex[dim]).abs()
}

/// Euclidean volume (area in 2-D) of a full simplex.
pub fn simplex_volume(simplex: &[Point]) -> f64 {
    let dim = simplex[0].dim();
    let origin = &simplex[0];
    let mut rows = [[0.0; MAX_DIM]; MAX_DIM];
    for i in 0..dim {
        rows[i] = simplex[i + 1].sub(origin);
    }
    let factorial: f64 = (1..=dim).map(|k| k as f64).product();
    determinant(&rows, dim).abs() / factorial
}

/// Homogeneous barycentric system `A * lambda = b` for a simplex and a query.
///
/// Column `j` of `A` is vertex `j` with a trailing 1. Unused rows and columns
/// (2-D simplices) are padded with the identity so the system stays 4x4 and
/// the padded coordinates solve to zero.
pub fn homogeneous_system(vertices: &[Point], query: &Point) -> (Matrix4<f64>, Vector4<f64>) {
    let dim = query.dim();
    let mut a = Matrix4::identity();
    let mut b = Vector4::zeros();
    for (j, v) in vertices.iter().enumerate().take(dim + 1) {
        for axis in 0..dim {
            a[(axis, j)] = v[axis];
        }
        a[(dim, j)] = 1.0;
    }
    for axis in 0..dim {
        b[axis] = query[axis];
    }
    b[dim] = 1.0;
    (a, b)
}

/// Inverse of the homogeneous barycentric matrix, for repeated location tests.
pub fn barycentric_inverse(vertices: &[Point]) -> Option<Matrix4<f64>> {
    if normalized_volume(vertices) <= DEGENERACY_TOLERANCE {
        return None;
    }
    let (a, _) = homogeneous_system(vertices, &vertices[0]);
    a.try_inverse()
}

/// Barycentric coordinates of `query` through a cached inverse.
pub fn barycentric_with(inverse: &Matrix4<f64>, query: &Point) -> Vector4<f64> {
    let dim = query.dim();
    let mut b = Vector4::zeros();
    for axis in 0..dim {
        b[axis] = query[axis];
    }
    b[dim] = 1.0;
    inverse * b
}

/// Measure of a flat Voronoi facet given its vertices and its normal.
///
/// In 2-D the facet is a segment and the measure is its length; in 3-D it is
/// the area of the convex polygon spanned by the points.
pub fn facet_measure(points: &[Point], normal: &Offset, dim: usize) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    if dim == 2 {
        let mut longest: f64 = 0.0;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                longest = longest.max(a.distance(b));
            }
        }
        return longest;
    }

    let (u, v) = match plane_basis(normal) {
        Some(basis) => basis,
        None => return 0.0,
    };
    let origin = points[0];
    let projected: Vec<(f64, f64)> = points
        .iter()
        .map(|p| {
            let d = p.sub(&origin);
            (dot(&d, &u, 3), dot(&d, &v, 3))
        })
        .collect();
    polygon_area(&convex_hull_2d(projected))
}

fn plane_basis(normal: &Offset) -> Option<(Offset, Offset)> {
    let len = dot(normal, normal, 3).sqrt();
    if len == 0.0 {
        return None;
    }
    let n = [normal[0] / len, normal[1] / len, normal[2] / len];

    // Cross with the axis least aligned with n.
    let mut axis = 0;
    for i in 1..3 {
        if n[i].abs() < n[axis].abs() {
            axis = i;
        }
    }
    let mut e = [0.0; 3];
    e[axis] = 1.0;
    let u = normalize(&cross(&n, &e))?;
    let v = cross(&n, &u);
    Some((u, v))
}

fn cross(a: &Offset, b: &Offset) -> Offset {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: &Offset) -> Option<Offset> {
    let len = dot(a, a, 3).sqrt();
    if len == 0.0 {
        None
    } else {
        Some([a[0] / len, a[1] / len, a[2] / len])
    }
}

// Andrew's monotone chain; collinear and repeated points are dropped.
fn convex_hull_2d(mut pts: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    if pts.len() < 3 {
        return pts;
    }
    let turn = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut hull: Vec<(f64, f64)> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

fn polygon_area(polygon: &[(f64, f64)]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..polygon.len() {
        let (x0, y0) = polygon[i];
        let (x1, y1) = polygon[(i + 1) % polygon.len()];
        twice += x0 * y1 - x1 * y0;
    }
    twice.abs() / 2.0
}
