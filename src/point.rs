//! Control-space points.
//!
//! A [`Point`] stores up to [`MAX_DIM`] coordinates inline so that it is `Copy`
//! and can key hash maps of millions of query results without allocating.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use crate::error::{InterpolationError, Result};

/// Largest supported control-space dimension.
pub const MAX_DIM: usize = 3;

/// Smallest supported control-space dimension.
pub const MIN_DIM: usize = 2;

/// A coordinate offset in control space; only the first `dim` entries are meaningful.
pub type Offset = [f64; MAX_DIM];

/// An immutable point in a 2-D or 3-D control space.
///
/// Equality and hashing compare exact coordinate values, with `-0.0` folded
/// into `0.0`. Ordering is lexicographic over the coordinates.
#[derive(Clone, Copy)]
pub struct Point {
    coords: [f64; MAX_DIM],
    dim: usize,
}

impl Point {
    /// Creates a point from a coordinate slice of length 2 or 3.
    pub fn new(coords: &[f64]) -> Result<Self> {
        let dim = coords.len();
        if !(MIN_DIM..=MAX_DIM).contains(&dim) {
            return Err(InterpolationError::UnsupportedDimension(dim));
        }
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(InterpolationError::NonFiniteValue {
                context: format!("point coordinate {}", bad),
            });
        }
        let mut stored = [0.0; MAX_DIM];
        stored[..dim].copy_from_slice(coords);
        Ok(Self::from_offset(stored, dim))
    }

    // Builds a point from computed coordinates. Callers guarantee `dim` is supported.
    pub(crate) fn from_offset(mut coords: Offset, dim: usize) -> Self {
        for (axis, c) in coords.iter_mut().enumerate() {
            if axis >= dim || *c == 0.0 {
                *c = 0.0;
            }
        }
        Point { coords, dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords[..self.dim]
    }

    pub fn is_finite(&self) -> bool {
        self.coords().iter().all(|c| c.is_finite())
    }

    /// Vector from `origin` to `self`.
    pub fn sub(&self, origin: &Point) -> Offset {
        let mut out = [0.0; MAX_DIM];
        for axis in 0..self.dim {
            out[axis] = self.coords[axis] - origin.coords[axis];
        }
        out
    }

    /// Point displaced by `offset`.
    pub fn offset(&self, offset: &Offset) -> Point {
        let mut out = self.coords;
        for axis in 0..self.dim {
            out[axis] += offset[axis];
        }
        Point::from_offset(out, self.dim)
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        let d = self.sub(other);
        dot(&d, &d, self.dim)
    }

    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Arithmetic mean of a non-empty set of points of equal dimension.
    pub fn centroid(points: &[Point]) -> Option<Point> {
        let first = points.first()?;
        let mut sum = [0.0; MAX_DIM];
        for p in points {
            for axis in 0..first.dim {
                sum[axis] += p.coords[axis];
            }
        }
        let n = points.len() as f64;
        for s in sum.iter_mut() {
            *s /= n;
        }
        Some(Point::from_offset(sum, first.dim))
    }
}

/// Dot product over the first `dim` components.
pub fn dot(a: &Offset, b: &Offset, dim: usize) -> f64 {
    a[..dim].iter().zip(&b[..dim]).map(|(x, y)| x * y).sum()
}

impl From<[f64; 2]> for Point {
    /// Unchecked conversion; sample insertion re-validates finiteness.
    fn from(c: [f64; 2]) -> Self {
        Point::from_offset([c[0], c[1], 0.0], 2)
    }
}

impl From<[f64; 3]> for Point {
    /// Unchecked conversion; sample insertion re-validates finiteness.
    fn from(c: [f64; 3]) -> Self {
        Point::from_offset(c, 3)
    }
}

impl Index<usize> for Point {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        &self.coords()[axis]
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim
            && self
                .coords()
                .iter()
                .zip(other.coords())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dim.hash(state);
        for c in self.coords() {
            c.to_bits().hash(state);
        }
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dim.cmp(&other.dim).then_with(|| {
            self.coords()
                .iter()
                .zip(other.coords())
                .map(|(a, b)| a.total_cmp(b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (axis, c) in self.coords().iter().enumerate() {
            if axis > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_negative_zero_is_same_key() {
        let a = Point::from([0.0, 1.0, 2.0]);
        let b = Point::from([-0.0, 1.0, 2.0]);
        assert_eq!(a, b);
        let set: HashSet<Point> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_lexicographic_order() {
        let mut points = vec![
            Point::from([1.0, 0.0]),
            Point::from([0.0, 5.0]),
            Point::from([0.0, 1.0]),
        ];
        points.sort();
        assert_eq!(points[0], Point::from([0.0, 1.0]));
        assert_eq!(points[2], Point::from([1.0, 0.0]));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            Point::new(&[1.0]),
            Err(InterpolationError::UnsupportedDimension(1))
        );
        assert!(matches!(
            Point::new(&[1.0, f64::NAN]),
            Err(InterpolationError::NonFiniteValue { .. })
        ));
        assert_eq!(Point::new(&[1.0, 2.0]).unwrap().dim(), 2);
    }

    #[test]
    fn test_centroid_and_distance() {
        let c = Point::centroid(&[Point::from([0.0, 0.0]), Point::from([2.0, 4.0])]).unwrap();
        assert_eq!(c, Point::from([1.0, 2.0]));
        assert_eq!(c.distance(&Point::from([4.0, 6.0])), 5.0);
    }
}
