//! Concurrent evaluation of large query sets.
//!
//! Queries are cut into contiguous chunks and chunk `c` is handled by worker
//! `c % jobs`. Every worker fills its own buffer per channel and keeps its own
//! walk hint per channel; the shared result map is locked once per worker and
//! channel, after the worker's last chunk.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::channel::Channel;
use crate::config::InterpolationConfig;
use crate::error::{InterpolationError, Result};
use crate::interpolate::InterpolationResult;
use crate::point::Point;
use crate::triangulation::WalkHint;

/// Results of one channel keyed by query point.
pub type ChannelResults = HashMap<Point, InterpolationResult>;

/// Results of every channel keyed by channel name.
pub type ResultMap = BTreeMap<String, ChannelResults>;

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    jobs: usize,
    chunk_size: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchScheduler {
    pub fn new(jobs: usize, chunk_size: usize) -> Self {
        BatchScheduler {
            jobs: jobs.max(1),
            chunk_size: chunk_size.max(1),
            cancel: None,
        }
    }

    pub fn from_config(config: &InterpolationConfig) -> Self {
        BatchScheduler::new(config.worker_count(), config.chunk_size)
    }

    /// Stops the batch between chunks once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    pub fn run(&self, queries: &[Point], channels: &[Channel]) -> Result<ResultMap> {
        self.run_with_progress(queries, channels, |_, _| {})
    }

    /// Evaluates every query on every channel.
    ///
    /// `progress(done, total)` is called from the workers after each finished
    /// chunk. Returns [`InterpolationError::Cancelled`] if the cancel flag
    /// was raised before all chunks ran.
    pub fn run_with_progress<F>(
        &self,
        queries: &[Point],
        channels: &[Channel],
        progress: F,
    ) -> Result<ResultMap>
    where
        F: Fn(usize, usize) + Sync,
    {
        let chunks: Vec<&[Point]> = queries.chunks(self.chunk_size).collect();
        let total = chunks.len();
        let jobs = self.jobs.min(total.max(1));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| InterpolationError::WorkerPool {
                reason: e.to_string(),
            })?;

        debug!(
            "Scheduling {} queries on {} channels: {} chunks of {} over {} workers",
            queries.len(),
            channels.len(),
            total,
            self.chunk_size,
            jobs
        );

        let shared: Vec<Mutex<ChannelResults>> = channels
            .iter()
            .map(|_| Mutex::new(HashMap::with_capacity(queries.len())))
            .collect();
        let completed = AtomicUsize::new(0);
        let stopped = AtomicBool::new(false);

        let chunks = &chunks;
        let shared = &shared;
        let completed = &completed;
        let stopped = &stopped;
        let progress = &progress;

        pool.scope(|scope| {
            for tid in 0..jobs {
                scope.spawn(move |_| {
                    let mut local: Vec<ChannelResults> =
                        channels.iter().map(|_| HashMap::new()).collect();
                    let mut hints = vec![WalkHint::default(); channels.len()];

                    for chunk in chunks.iter().skip(tid).step_by(jobs) {
                        if self.cancelled() {
                            stopped.store(true, Ordering::Relaxed);
                            break;
                        }
                        for query in chunk.iter() {
                            for (c, channel) in channels.iter().enumerate() {
                                if local[c].contains_key(query) {
                                    continue;
                                }
                                let result = channel
                                    .interpolator()
                                    .interpolate_with_hint(query, &mut hints[c]);
                                local[c].insert(*query, result);
                            }
                        }
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        progress(done, total);
                    }

                    for (c, results) in local.into_iter().enumerate() {
                        let mut merged = shared[c].lock().unwrap_or_else(PoisonError::into_inner);
                        merged.extend(results);
                    }
                });
            }
        });

        if stopped.load(Ordering::Relaxed) {
            return Err(InterpolationError::Cancelled {
                completed: completed.load(Ordering::Relaxed),
                total,
            });
        }

        let mut results = ResultMap::new();
        for (channel, merged) in channels.iter().zip(shared.iter()) {
            let mut merged = merged.lock().unwrap_or_else(PoisonError::into_inner);
            results.insert(channel.name().to_string(), std::mem::take(&mut *merged));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::Interpolator;
    use crate::samples::SampleStore;

    fn square_channel(name: &str) -> Channel {
        let store = SampleStore::from_pairs(vec![
            (Point::from([0.0, 0.0]), vec![0.0]),
            (Point::from([1.0, 0.0]), vec![1.0]),
            (Point::from([0.0, 1.0]), vec![2.0]),
            (Point::from([1.0, 1.0]), vec![3.0]),
        ])
        .unwrap();
        Channel::new(
            name,
            Interpolator::build(store, &InterpolationConfig::default()).unwrap(),
        )
    }

    fn queries() -> Vec<Point> {
        let mut points = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                points.push(Point::from([i as f64 * 0.125, j as f64 * 0.125]));
            }
        }
        points
    }

    #[test]
    fn test_every_query_once_per_channel() {
        let channels = vec![square_channel("a"), square_channel("b")];
        let mut queries = queries();
        queries.push(queries[5]);
        let results = BatchScheduler::new(3, 7).run(&queries, &channels).unwrap();
        assert_eq!(results.len(), 2);
        for map in results.values() {
            assert_eq!(map.len(), 121);
            let outside = map.values().filter(|r| !r.is_inside()).count();
            // Coordinates above 1.0 on either axis.
            assert_eq!(outside, 121 - 81);
        }
    }

    #[test]
    fn test_progress_reaches_total() {
        let channels = vec![square_channel("a")];
        let queries = queries();
        let calls = AtomicUsize::new(0);
        let max_done = AtomicUsize::new(0);
        BatchScheduler::new(2, 10)
            .run_with_progress(&queries, &channels, |done, total| {
                assert_eq!(total, 13);
                calls.fetch_add(1, Ordering::Relaxed);
                max_done.fetch_max(done, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 13);
        assert_eq!(max_done.load(Ordering::Relaxed), 13);
    }

    #[test]
    fn test_empty_query_set() {
        let channels = vec![square_channel("a")];
        let results = BatchScheduler::new(4, 16).run(&[], &channels).unwrap();
        assert!(results["a"].is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let flag = Arc::new(AtomicBool::new(true));
        let channels = vec![square_channel("a")];
        let err = BatchScheduler::new(2, 10)
            .with_cancel_flag(flag)
            .run(&queries(), &channels)
            .unwrap_err();
        assert_eq!(
            err,
            InterpolationError::Cancelled {
                completed: 0,
                total: 13
            }
        );
    }
}
