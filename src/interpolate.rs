//! Weighted combination of sample values for one channel.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::InterpolationConfig;
use crate::error::{InterpolationError, Result};
use crate::locate::{Location, Locator, Strategy};
use crate::point::Point;
use crate::samples::SampleStore;
use crate::triangulation::{Triangulation, WalkHint};
use crate::weights::{WeightCalculator, WeightSet};

/// What to report for queries outside the convex hull of the samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutsideHullPolicy {
    /// No value, only the outside marker.
    #[default]
    Marker,
    /// A zero vector.
    Zero,
    /// The value of the nearest sample.
    NearestSample,
}

impl FromStr for OutsideHullPolicy {
    type Err = InterpolationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "marker" | "none" => Ok(OutsideHullPolicy::Marker),
            "zero" => Ok(OutsideHullPolicy::Zero),
            "nearest" | "nearest-sample" | "nearest_sample" => Ok(OutsideHullPolicy::NearestSample),
            other => Err(InterpolationError::InvalidConfig {
                key: "outside_hull".to_string(),
                reason: format!("unknown policy '{}'", other),
            }),
        }
    }
}

impl fmt::Display for OutsideHullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutsideHullPolicy::Marker => write!(f, "marker"),
            OutsideHullPolicy::Zero => write!(f, "zero"),
            OutsideHullPolicy::NearestSample => write!(f, "nearest"),
        }
    }
}

/// Result of one query on one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationResult {
    Inside(Vec<f64>),
    /// Outside the convex hull, with the policy's fill value if it has one.
    OutsideHull { fill: Option<Vec<f64>> },
    /// The weights could not be computed.
    Failed(InterpolationError),
}

impl InterpolationResult {
    /// Interpolated value or outside fill.
    pub fn value(&self) -> Option<&[f64]> {
        match self {
            InterpolationResult::Inside(v) => Some(v),
            InterpolationResult::OutsideHull { fill } => fill.as_deref(),
            InterpolationResult::Failed(_) => None,
        }
    }

    pub fn is_inside(&self) -> bool {
        matches!(self, InterpolationResult::Inside(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            InterpolationResult::Inside(_) => "inside",
            InterpolationResult::OutsideHull { .. } => "outside",
            InterpolationResult::Failed(_) => "failed",
        }
    }
}

/// Locator, weight calculator and sample values of one channel.
///
/// Immutable after construction and shared by reference between workers;
/// per-worker state lives in the [`WalkHint`] passed to each query.
#[derive(Debug, Clone)]
pub struct Interpolator {
    locator: Locator,
    calculator: WeightCalculator,
    store: Arc<SampleStore>,
    policy: OutsideHullPolicy,
}

impl Interpolator {
    /// Assembles an interpolator over a triangulation of `store`'s points.
    pub fn new(
        store: Arc<SampleStore>,
        triangulation: Arc<Triangulation>,
        config: &InterpolationConfig,
    ) -> Result<Self> {
        if store.is_empty() {
            return Err(InterpolationError::EmptyStore);
        }
        if triangulation.points() != store.points().as_slice() {
            return Err(InterpolationError::InvalidConfig {
                key: "triangulation".to_string(),
                reason: "built from a different point set than the samples".to_string(),
            });
        }
        Ok(Interpolator {
            locator: Locator::new(triangulation, config.strategy),
            calculator: WeightCalculator::new(config.solver.solver(), config.clamp_tolerance),
            store,
            policy: config.outside_hull,
        })
    }

    /// Triangulates `store` and wraps it in an interpolator.
    pub fn build(store: SampleStore, config: &InterpolationConfig) -> Result<Self> {
        let triangulation = Triangulation::build(&store)?;
        Interpolator::new(Arc::new(store), Arc::new(triangulation), config)
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn triangulation(&self) -> &Arc<Triangulation> {
        self.locator.triangulation()
    }

    pub fn strategy(&self) -> Strategy {
        self.locator.strategy()
    }

    pub fn policy(&self) -> OutsideHullPolicy {
        self.policy
    }

    pub fn interpolate(&self, query: &Point) -> InterpolationResult {
        self.interpolate_with_hint(query, &mut WalkHint::default())
    }

    /// Interpolates `query`, reusing and updating a per-worker walk hint.
    pub fn interpolate_with_hint(&self, query: &Point, hint: &mut WalkHint) -> InterpolationResult {
        let location = match self.locate(query, hint) {
            Ok(location) => location,
            Err(e) => return InterpolationResult::Failed(e),
        };
        if location == Location::NotInHull {
            return InterpolationResult::OutsideHull {
                fill: self.outside_fill(query),
            };
        }
        match self
            .calculator
            .weights(self.triangulation(), &location, query)
        {
            Ok(weights) => InterpolationResult::Inside(self.combine(&weights)),
            Err(e) => InterpolationResult::Failed(e),
        }
    }

    /// Weights of `query`; empty outside the hull.
    pub fn weights(&self, query: &Point, hint: &mut WalkHint) -> Result<WeightSet> {
        let location = self.locate(query, hint)?;
        self.calculator
            .weights(self.triangulation(), &location, query)
    }

    /// Weighted sum of sample values.
    pub fn combine(&self, weights: &WeightSet) -> Vec<f64> {
        let mut out = vec![0.0; self.store.value_len().unwrap_or(0)];
        for (sample, w) in weights.iter() {
            for (acc, v) in out.iter_mut().zip(self.store.value(sample)) {
                *acc += w * v;
            }
        }
        out
    }

    fn locate(&self, query: &Point, hint: &mut WalkHint) -> Result<Location> {
        let expected = self.triangulation().dim();
        if query.dim() != expected {
            return Err(InterpolationError::DimensionMismatch {
                expected,
                actual: query.dim(),
                context: "query point",
            });
        }
        if !query.is_finite() {
            return Err(InterpolationError::NonFiniteValue {
                context: format!("query point {}", query),
            });
        }
        Ok(self.locator.locate(query, hint))
    }

    fn outside_fill(&self, query: &Point) -> Option<Vec<f64>> {
        match self.policy {
            OutsideHullPolicy::Marker => None,
            OutsideHullPolicy::Zero => Some(vec![0.0; self.store.value_len().unwrap_or(0)]),
            OutsideHullPolicy::NearestSample => self
                .store
                .nearest(query)
                .map(|i| self.store.value(i).to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle(config: &InterpolationConfig) -> Interpolator {
        let store = SampleStore::from_pairs(vec![
            (Point::from([0.0, 0.0]), vec![1.0, 0.0, 0.0]),
            (Point::from([1.0, 0.0]), vec![0.0, 1.0, 0.0]),
            (Point::from([0.0, 1.0]), vec![0.0, 0.0, 1.0]),
        ])
        .unwrap();
        Interpolator::build(store, config).unwrap()
    }

    #[test]
    fn test_non_finite_query_fails() {
        let interp = triangle(&InterpolationConfig::default());
        for q in [Point::from([f64::NAN, 0.2]), Point::from([0.2, f64::INFINITY])] {
            assert!(matches!(
                interp.interpolate(&q),
                InterpolationResult::Failed(InterpolationError::NonFiniteValue { .. })
            ));
            assert!(interp.weights(&q, &mut WalkHint::default()).is_err());
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Zero".parse::<OutsideHullPolicy>().unwrap(), OutsideHullPolicy::Zero);
        assert_eq!(
            "nearest-sample".parse::<OutsideHullPolicy>().unwrap(),
            OutsideHullPolicy::NearestSample
        );
        assert!("clamp".parse::<OutsideHullPolicy>().is_err());
    }

    #[test]
    fn test_centroid_of_triangle() {
        let interp = triangle(&InterpolationConfig::default());
        let result = interp.interpolate(&Point::from([1.0 / 3.0, 1.0 / 3.0]));
        let value = result.value().unwrap();
        for v in value {
            assert_relative_eq!(*v, 1.0 / 3.0, epsilon = 1e-12);
        }
        assert_eq!(result.status(), "inside");
    }

    #[test]
    fn test_outside_policies() {
        let q = Point::from([2.0, 2.0]);
        let marker = triangle(&InterpolationConfig::default()).interpolate(&q);
        assert_eq!(marker, InterpolationResult::OutsideHull { fill: None });
        assert_eq!(marker.value(), None);

        let config = InterpolationConfig {
            outside_hull: OutsideHullPolicy::Zero,
            ..InterpolationConfig::default()
        };
        assert_eq!(
            triangle(&config).interpolate(&q).value(),
            Some(&[0.0, 0.0, 0.0][..])
        );

        let config = InterpolationConfig {
            outside_hull: OutsideHullPolicy::NearestSample,
            ..InterpolationConfig::default()
        };
        let result = triangle(&config).interpolate(&Point::from([3.0, 0.5]));
        assert!(!result.is_inside());
        assert_eq!(result.value(), Some(&[0.0, 1.0, 0.0][..]));
    }

    #[test]
    fn test_query_dimension_is_checked() {
        let interp = triangle(&InterpolationConfig::default());
        assert!(matches!(
            interp.interpolate(&Point::from([0.1, 0.1, 0.1])),
            InterpolationResult::Failed(InterpolationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_mismatched_triangulation_is_rejected() {
        let interp = triangle(&InterpolationConfig::default());
        let other = SampleStore::from_pairs(vec![
            (Point::from([0.0, 0.0]), vec![1.0]),
            (Point::from([2.0, 0.0]), vec![1.0]),
            (Point::from([0.0, 2.0]), vec![1.0]),
        ])
        .unwrap();
        assert!(matches!(
            Interpolator::new(
                Arc::new(other),
                Arc::clone(interp.triangulation()),
                &InterpolationConfig::default()
            ),
            Err(InterpolationError::InvalidConfig { .. })
        ));
    }
}
