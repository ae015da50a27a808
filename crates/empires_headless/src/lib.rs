//! Headless runner for the village simulation.
//!
//! This crate drives [`empires_core`] worlds without graphics:
//!
//! - **Scenarios**: RON files naming a map, a config and a starting population
//! - **Runs**: tick a world, print fogged ASCII frames, report a summary
//! - **Paths**: overlay BFS routes on a map for inspection
//! - **Batches**: run many seeds in parallel and compare the outcomes
//!
//! # Example
//!
//! ```bash
//! # Run the default scenario with a frame every 10 seconds of game time
//! cargo run -p empires_headless -- run --ascii-every 625
//!
//! # Compare sixteen seeds
//! cargo run -p empires_headless -- batch --map village --seeds 16
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod runner;
pub mod scenario;

pub use ascii_visualizer::{render_ascii, render_path, AsciiConfig};
pub use batch::{run_batch, BatchConfig, BatchResults};
pub use runner::{HeadlessRunner, RunConfig, RunSummary};
pub use scenario::{MapSource, Population, Scenario, ScenarioError};
