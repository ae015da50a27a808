//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A world built from the same map and config must replay exactly.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`empires_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: wander rerolls, agent picks and spawn fallbacks
//!   all draw from the world's seeded `ChaCha8Rng`.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (BFS, collisions, etc.)
//! 2. **Property tests**: Random maps and seeds must still replay exactly
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use empires_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use empires_test_utils::determinism::verify_determinism;
/// use empires_test_utils::fixtures::{quiet_config, sim_from_ascii, VILLAGE};
///
/// let result = verify_determinism(
///     3,   // Run 3 times
///     100, // 100 ticks each
///     || {
///         let mut sim = sim_from_ascii(VILLAGE, quiet_config(4));
///         sim.reset_population();
///         sim
///     },
///     |sim| {
///         sim.tick();
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches state that leaks between worlds or depends on thread scheduling.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    sim.run_ticks(num_ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation testing.
///
/// These strategies generate random but reproducible maps, configs and
/// inputs for property-based tests.
pub mod strategies {
    use empires_core::components::{Heading, ManualInput};
    use empires_core::config::{BoundaryPolicy, SimConfig};
    use empires_core::economy::ResourceKind;
    use empires_core::grid::{Cell, TileKind, WorldGrid};
    use proptest::prelude::*;

    /// Any world seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// A single non-home tile, mostly open.
    pub fn arb_tile() -> impl Strategy<Value = TileKind> {
        prop_oneof![
            6 => Just(TileKind::Open),
            2 => Just(TileKind::Obstacle(ResourceKind::Tree)),
            1 => Just(TileKind::Obstacle(ResourceKind::BerryBush)),
        ]
    }

    /// Random rectangular grid of 3..=max_rows by 3..=max_cols cells,
    /// optionally with one home tile.
    pub fn arb_grid(max_rows: u32, max_cols: u32) -> impl Strategy<Value = WorldGrid> {
        (3..=max_rows.max(3), 3..=max_cols.max(3))
            .prop_flat_map(|(rows, cols)| {
                (
                    proptest::collection::vec(
                        proptest::collection::vec(arb_tile(), cols as usize),
                        rows as usize,
                    ),
                    proptest::option::of((0..rows, 0..cols)),
                    prop_oneof![Just(16u32), Just(32u32), Just(48u32)],
                )
            })
            .prop_map(|(mut tiles, home, tile_size)| {
                if let Some((row, col)) = home {
                    tiles[row as usize][col as usize] = TileKind::Home;
                }
                WorldGrid::from_rows(tile_size, tiles).expect("generated grid is rectangular")
            })
    }

    /// Any cell inside a `rows` by `cols` grid.
    pub fn arb_cell(rows: u32, cols: u32) -> impl Strategy<Value = Cell> {
        (0..rows.max(1), 0..cols.max(1)).prop_map(|(row, col)| Cell::new(row, col))
    }

    /// Any heading.
    pub fn arb_heading() -> impl Strategy<Value = Heading> {
        prop_oneof![
            Just(Heading::Up),
            Just(Heading::Down),
            Just(Heading::Left),
            Just(Heading::Right),
            Just(Heading::Idle),
        ]
    }

    /// Any manual input.
    pub fn arb_manual_input() -> impl Strategy<Value = ManualInput> {
        (proptest::option::of(arb_heading()), any::<bool>(), any::<bool>()).prop_map(
            |(heading, toggle_action, drop_off)| ManualInput {
                heading,
                toggle_action,
                drop_off,
            },
        )
    }

    /// Config with a random seed, speed and boundary penalty.
    pub fn arb_config() -> impl Strategy<Value = SimConfig> {
        (arb_seed(), 1u32..6, 0u32..10, any::<bool>()).prop_map(
            |(seed, speed, health_penalty, agent_enabled)| SimConfig {
                villager_speed: speed,
                scout_speed: speed,
                boundary: BoundaryPolicy { health_penalty },
                agent_enabled,
                ..SimConfig::with_seed(seed)
            },
        )
    }
}
