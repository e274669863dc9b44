//! Calibration sample storage.

use std::collections::HashMap;

use crate::error::{InterpolationError, Result};
use crate::point::Point;

/// One measured calibration sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub point: Point,
    pub value: Vec<f64>,
}

/// Ordered set of calibration samples for one output channel.
///
/// All samples share the control-space dimension and output length of the
/// first sample. Points are unique; a repeated point is rejected.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
    index: HashMap<Point, usize>,
    dim: Option<usize>,
    value_len: Option<usize>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store by adding every pair in order.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Point, Vec<f64>)>,
    {
        let mut store = Self::new();
        for (point, value) in pairs {
            store.add_sample(point, value)?;
        }
        Ok(store)
    }

    /// Appends a sample and returns its index.
    pub fn add_sample(&mut self, point: Point, value: Vec<f64>) -> Result<usize> {
        let index = self.samples.len();

        if !point.is_finite() {
            return Err(InterpolationError::NonFiniteValue {
                context: format!("coordinates of sample #{}", index),
            });
        }
        if let Some(dim) = self.dim {
            if point.dim() != dim {
                return Err(InterpolationError::DimensionMismatch {
                    expected: dim,
                    actual: point.dim(),
                    context: "calibration sample",
                });
            }
        }
        if let Some(expected) = self.value_len {
            if value.len() != expected {
                return Err(InterpolationError::ValueLengthMismatch {
                    index,
                    expected,
                    actual: value.len(),
                });
            }
        }
        if value.iter().any(|v| !v.is_finite()) {
            return Err(InterpolationError::NonFiniteValue {
                context: format!("value of sample #{} at {}", index, point),
            });
        }
        if let Some(&first) = self.index.get(&point) {
            return Err(InterpolationError::DuplicateSample { point, first, index });
        }

        self.dim = Some(point.dim());
        self.value_len = Some(value.len());
        self.index.insert(point, index);
        self.samples.push(Sample { point, value });
        Ok(index)
    }

    /// Samples in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Control-space dimension, once the first sample is present.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn value_len(&self) -> Option<usize> {
        self.value_len
    }

    pub fn index_of(&self, point: &Point) -> Option<usize> {
        self.index.get(point).copied()
    }

    pub fn point(&self, index: usize) -> &Point {
        &self.samples[index].point
    }

    pub fn value(&self, index: usize) -> &[f64] {
        &self.samples[index].value
    }

    pub fn points(&self) -> Vec<Point> {
        self.samples.iter().map(|s| s.point).collect()
    }

    /// Index of the sample closest to `query`; ties resolve to the lowest index.
    pub fn nearest(&self, query: &Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, sample) in self.samples.iter().enumerate() {
            let d = sample.point.distance_squared(query);
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_reports_both_indices() {
        let mut store = SampleStore::new();
        store.add_sample(Point::from([0.0, 0.0]), vec![1.0]).unwrap();
        store.add_sample(Point::from([1.0, 0.0]), vec![2.0]).unwrap();
        let err = store
            .add_sample(Point::from([-0.0, 0.0]), vec![3.0])
            .unwrap_err();
        assert_eq!(
            err,
            InterpolationError::DuplicateSample {
                point: Point::from([0.0, 0.0]),
                first: 0,
                index: 2,
            }
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_shape_checks() {
        let mut store = SampleStore::new();
        store.add_sample(Point::from([0.0, 0.0]), vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            store.add_sample(Point::from([1.0, 0.0, 0.0]), vec![1.0, 2.0]),
            Err(InterpolationError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(matches!(
            store.add_sample(Point::from([1.0, 0.0]), vec![1.0]),
            Err(InterpolationError::ValueLengthMismatch { index: 1, expected: 2, actual: 1 })
        ));
        assert!(matches!(
            store.add_sample(Point::from([1.0, 0.0]), vec![1.0, f64::INFINITY]),
            Err(InterpolationError::NonFiniteValue { .. })
        ));
        assert!(matches!(
            store.add_sample(Point::from([f64::NAN, 0.0]), vec![1.0, 1.0]),
            Err(InterpolationError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn test_nearest_prefers_lowest_index() {
        let store = SampleStore::from_pairs(vec![
            (Point::from([0.0, 0.0]), vec![0.0]),
            (Point::from([2.0, 0.0]), vec![1.0]),
        ])
        .unwrap();
        assert_eq!(store.nearest(&Point::from([1.0, 0.0])), Some(0));
        assert_eq!(store.nearest(&Point::from([1.5, 3.0])), Some(1));
        assert_eq!(SampleStore::new().nearest(&Point::from([0.0, 0.0])), None);
    }
}
