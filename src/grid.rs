//! Regular query lattices.

use crate::error::{InterpolationError, Result};
use crate::point::{Point, MAX_DIM, MIN_DIM};

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridAxis {
    min: f64,
    max: f64,
    step: f64,
}

impl GridAxis {
    fn len(&self) -> usize {
        // Slack keeps `max` on the lattice despite round-off in the division.
        ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1
    }

    fn value(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step
    }
}

/// Axis-aligned lattice of query points, `min..=max` in steps of `step` per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    axes: Vec<GridAxis>,
}

impl GridSpec {
    /// Lattice with `(min, max, step)` per axis.
    pub fn new(axes: &[(f64, f64, f64)]) -> Result<Self> {
        if !(MIN_DIM..=MAX_DIM).contains(&axes.len()) {
            return Err(InterpolationError::UnsupportedDimension(axes.len()));
        }
        let mut checked = Vec::with_capacity(axes.len());
        for (axis, &(min, max, step)) in axes.iter().enumerate() {
            if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                return Err(InterpolationError::NonFiniteValue {
                    context: format!("grid axis {}", axis),
                });
            }
            if step <= 0.0 || max < min {
                return Err(InterpolationError::InvalidConfig {
                    key: "grid".to_string(),
                    reason: format!(
                        "axis {} needs min <= max and a positive step (got {}..={} step {})",
                        axis, min, max, step
                    ),
                });
            }
            checked.push(GridAxis { min, max, step });
        }
        Ok(GridSpec { axes: checked })
    }

    /// Same range and step on every axis.
    pub fn uniform(dim: usize, min: f64, max: f64, step: f64) -> Result<Self> {
        GridSpec::new(&vec![(min, max, step); dim])
    }

    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn len(&self) -> usize {
        self.axes.iter().map(GridAxis::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All lattice points, last axis varying fastest.
    pub fn points(&self) -> Vec<Point> {
        let dim = self.dim();
        let lens: Vec<usize> = self.axes.iter().map(GridAxis::len).collect();
        let mut out = Vec::with_capacity(self.len());
        let mut index = vec![0usize; dim];
        loop {
            let mut coords = [0.0; MAX_DIM];
            for axis in 0..dim {
                coords[axis] = self.axes[axis].value(index[axis]);
            }
            out.push(Point::from_offset(coords, dim));

            let mut axis = dim;
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < lens[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_lattice() {
        let grid = GridSpec::uniform(3, 0.0, 255.0, 1.0).unwrap();
        assert_eq!(grid.len(), 256 * 256 * 256);
    }

    #[test]
    fn test_order_and_endpoints() {
        let grid = GridSpec::new(&[(0.0, 1.0, 0.5), (10.0, 11.0, 1.0)]).unwrap();
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], Point::from([0.0, 10.0]));
        assert_eq!(points[1], Point::from([0.0, 11.0]));
        assert_eq!(points[5], Point::from([1.0, 11.0]));

        let tenths = GridSpec::uniform(2, 0.0, 1.0, 0.1).unwrap();
        assert_eq!(tenths.len(), 121);
    }

    #[test]
    fn test_invalid_axes() {
        assert!(matches!(
            GridSpec::uniform(2, 1.0, 0.0, 0.5),
            Err(InterpolationError::InvalidConfig { .. })
        ));
        assert!(GridSpec::uniform(2, 0.0, 1.0, 0.0).is_err());
        assert_eq!(
            GridSpec::uniform(4, 0.0, 1.0, 0.5),
            Err(InterpolationError::UnsupportedDimension(4))
        );
    }
}
