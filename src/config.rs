//! Interpolation settings and the `app.config` loader.
//!
//! `app.config` holds plain `key = value` lines; `#` starts a comment. The
//! recognized keys are the field names of [`InterpolationConfig`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{InterpolationError, Result};
use crate::interpolate::OutsideHullPolicy;
use crate::locate::Strategy;
use crate::weights::{SolverKind, DEFAULT_CLAMP_TOLERANCE};

pub const DEFAULT_CONFIG_FILE: &str = "app.config";
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationConfig {
    pub strategy: Strategy,
    pub outside_hull: OutsideHullPolicy,
    pub solver: SolverKind,
    /// Worker threads; 0 uses every available processor.
    pub jobs: usize,
    /// Queries per scheduling chunk.
    pub chunk_size: usize,
    pub clamp_tolerance: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        InterpolationConfig {
            strategy: Strategy::default(),
            outside_hull: OutsideHullPolicy::default(),
            solver: SolverKind::default(),
            jobs: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            clamp_tolerance: DEFAULT_CLAMP_TOLERANCE,
        }
    }
}

fn parse_key<T>(path: &Path, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match load_config_value(path, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| InterpolationError::InvalidConfig {
                key: key.to_string(),
                reason: format!("'{}': {}", raw, e),
            }),
    }
}

impl InterpolationConfig {
    /// Defaults overlaid with the keys present in the file at `path`.
    ///
    /// A missing file yields the defaults.
    pub fn from_app_config(path: &Path) -> Result<Self> {
        let mut config = InterpolationConfig::default();
        if let Some(v) = parse_key(path, "strategy")? {
            config.strategy = v;
        }
        if let Some(v) = parse_key(path, "outside_hull")? {
            config.outside_hull = v;
        }
        if let Some(v) = parse_key(path, "solver")? {
            config.solver = v;
        }
        if let Some(v) = parse_key(path, "jobs")? {
            config.jobs = v;
        }
        if let Some(v) = parse_key(path, "chunk_size")? {
            config.chunk_size = v;
        }
        if let Some(v) = parse_key(path, "clamp_tolerance")? {
            config.clamp_tolerance = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(InterpolationError::InvalidConfig {
                key: "chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if !(self.clamp_tolerance.is_finite() && self.clamp_tolerance >= 0.0) {
            return Err(InterpolationError::InvalidConfig {
                key: "clamp_tolerance".to_string(),
                reason: format!("{} is not a non-negative number", self.clamp_tolerance),
            });
        }
        Ok(())
    }

    /// Number of workers to start: `jobs` capped at the processor count.
    pub fn worker_count(&self) -> usize {
        let num_procs = num_cpus::get();
        if self.jobs > 0 {
            std::cmp::min(self.jobs, num_procs)
        } else {
            num_procs
        }
    }
}

/// Value of `key_to_find` in a `key = value` config file, if present.
pub fn load_config_value(path: &Path, key_to_find: &str) -> Option<String> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.ok()?;
        let line = line.split('#').next().unwrap_or("");
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == key_to_find {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = InterpolationConfig::from_app_config(Path::new("no/such/app.config")).unwrap();
        assert_eq!(config, InterpolationConfig::default());
    }

    #[test]
    fn test_overlay() {
        let file = write_config(
            "# interpolation\nstrategy = natural-neighbor\njobs=3 # threads\nsolver = qr\nunrelated = 1\n",
        );
        let config = InterpolationConfig::from_app_config(file.path()).unwrap();
        assert_eq!(config.strategy, Strategy::NaturalNeighbor);
        assert_eq!(config.solver, SolverKind::Qr);
        assert_eq!(config.jobs, 3);
        assert_eq!(config.outside_hull, OutsideHullPolicy::Marker);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_bad_values() {
        let file = write_config("chunk_size = many\n");
        assert!(matches!(
            InterpolationConfig::from_app_config(file.path()),
            Err(InterpolationError::InvalidConfig { ref key, .. }) if key == "chunk_size"
        ));
        let file = write_config("chunk_size = 0\n");
        assert!(InterpolationConfig::from_app_config(file.path()).is_err());
    }

    #[test]
    fn test_worker_count() {
        let procs = num_cpus::get();
        let config = InterpolationConfig {
            jobs: 0,
            ..InterpolationConfig::default()
        };
        assert_eq!(config.worker_count(), procs);
        let config = InterpolationConfig {
            jobs: 1,
            ..InterpolationConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
    }
}
