//! Batch runner.
//!
//! Runs one scenario across many seeds in parallel using rayon. Every seed
//! gets its own world with a freshly randomized population.

use std::io;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{HeadlessRunner, RunConfig, RunSummary};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of seeds to run.
    pub seeds: u32,
    /// First seed; the rest follow consecutively.
    pub seed_start: u64,
    /// Ticks per world.
    pub ticks: u64,
    /// Maximum parallel worlds (0 = use rayon default).
    pub parallel: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            seeds: 16,
            seed_start: 0,
            ticks: 3600,
            parallel: 0,
        }
    }
}

impl BatchConfig {
    /// Seeds covered by this batch.
    pub fn seed_range(&self) -> impl Iterator<Item = u64> + '_ {
        (0..u64::from(self.seeds)).map(|i| self.seed_start.wrapping_add(i))
    }
}

/// Error from one world of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed that failed.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate results of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Per-seed summaries, in seed order.
    pub runs: Vec<RunSummary>,
    /// Seeds that could not be run.
    pub errors: Vec<BatchError>,
    /// Wall-clock duration.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Mean final score in points.
    #[must_use]
    pub fn mean_score(&self) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        let tenths: u64 = self.runs.iter().map(|r| r.score.tenths()).sum();
        tenths as f64 / 10.0 / self.runs.len() as f64
    }
}

fn run_seed(scenario: &Scenario, seed: u64, ticks: u64) -> Result<RunSummary, ScenarioError> {
    let mut scenario = scenario.clone();
    scenario.config.seed = seed;
    let mut runner = HeadlessRunner::from_scenario(&scenario)?;
    let config = RunConfig {
        ticks,
        ..RunConfig::default()
    };
    Ok(runner.run(&config, &mut io::sink())?)
}

/// Run `scenario` once per seed.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} seeds of '{}'",
        config.seeds, scenario.name
    );

    // Configure thread pool if specified
    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let seeds: Vec<u64> = config.seed_range().collect();
    let results: Vec<Result<RunSummary, BatchError>> = seeds
        .into_par_iter()
        .map(|seed| {
            run_seed(scenario, seed, config.ticks).map_err(|e| {
                warn!("Seed {} failed: {}", seed, e);
                BatchError {
                    seed,
                    message: e.to_string(),
                }
            })
        })
        .inspect(|result| {
            if let Ok(summary) = result {
                debug!(seed = summary.seed, score = %summary.score, "Seed finished");
            }
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunSummary> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} worlds in {:.1}s, {} failed",
        runs.len(),
        duration_seconds,
        errors.len()
    );

    BatchResults {
        runs,
        errors,
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_batch(seeds: u32) -> BatchConfig {
        BatchConfig {
            seeds,
            seed_start: 10,
            ticks: 60,
            parallel: 0,
        }
    }

    #[test]
    fn test_one_summary_per_seed_in_order() {
        let results = run_batch(&Scenario::default(), &small_batch(4));
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.runs.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
        assert!(results.runs.iter().all(|r| r.ticks == 60));
    }

    #[test]
    fn test_batch_matches_sequential_runs() {
        let scenario = Scenario::default();
        let results = run_batch(&scenario, &small_batch(3));
        for run in &results.runs {
            let single = run_seed(&scenario, run.seed, 60).unwrap();
            assert_eq!(&single, run);
        }
    }

    #[test]
    fn test_failures_are_collected() {
        let scenario = Scenario {
            map: crate::scenario::MapSource::Bundled("atlantis".to_string()),
            ..Scenario::default()
        };
        let results = run_batch(&scenario, &small_batch(2));
        assert!(results.runs.is_empty());
        assert_eq!(results.errors.len(), 2);
        assert_eq!(results.mean_score(), 0.0);
    }
}
