//! Named output channels and their construction from calibration tables.

use std::sync::Arc;

use log::{debug, warn};

use crate::config::InterpolationConfig;
use crate::error::InterpolationError;
use crate::interpolate::Interpolator;
use crate::point::Point;
use crate::samples::SampleStore;
use crate::triangulation::Triangulation;

/// One independently calibrated output, e.g. the response to the red channel.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    interpolator: Interpolator,
}

impl Channel {
    pub fn new(name: impl Into<String>, interpolator: Interpolator) -> Self {
        Channel {
            name: name.into(),
            interpolator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }
}

/// Channels that built, and the reason each of the others did not.
#[derive(Debug, Default)]
pub struct ChannelBuild {
    pub channels: Vec<Channel>,
    pub failures: Vec<(String, InterpolationError)>,
}

/// Builds one channel per calibration table.
///
/// A table that fails (duplicate points, degenerate geometry) is reported in
/// [`ChannelBuild::failures`] without stopping the others. Tables with the
/// same point sequence share one triangulation.
pub fn build_channels<I>(tables: I, config: &InterpolationConfig) -> ChannelBuild
where
    I: IntoIterator<Item = (String, Vec<(Point, Vec<f64>)>)>,
{
    let mut build = ChannelBuild::default();
    let mut triangulations: Vec<(Vec<Point>, Arc<Triangulation>)> = Vec::new();

    for (name, pairs) in tables {
        let store = match SampleStore::from_pairs(pairs) {
            Ok(store) => store,
            Err(e) => {
                warn!("Channel '{}' rejected: {}", name, e);
                build.failures.push((name, e));
                continue;
            }
        };

        let points = store.points();
        let shared = triangulations
            .iter()
            .find(|(p, _)| *p == points)
            .map(|(_, t)| Arc::clone(t));
        let triangulation = match shared {
            Some(t) => {
                debug!("Channel '{}' reuses an existing triangulation", name);
                t
            }
            None => match Triangulation::build(&store) {
                Ok(t) => {
                    let t = Arc::new(t);
                    triangulations.push((points, Arc::clone(&t)));
                    t
                }
                Err(e) => {
                    warn!("Channel '{}' rejected: {}", name, e);
                    build.failures.push((name, e));
                    continue;
                }
            },
        };

        match Interpolator::new(Arc::new(store), triangulation, config) {
            Ok(interpolator) => build.channels.push(Channel::new(name, interpolator)),
            Err(e) => build.failures.push((name, e)),
        }
    }
    build
}
