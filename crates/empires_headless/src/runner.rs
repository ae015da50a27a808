//! Headless run loop.
//!
//! Ticks a world for a fixed number of steps, optionally printing ASCII
//! frames, and condenses everything that happened into a [`RunSummary`].

use std::io::{self, Write};

use empires_core::economy::{EconomyEvent, Points};
use empires_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};

use crate::ascii_visualizer::{render_ascii, AsciiConfig};
use crate::scenario::{Scenario, ScenarioError};

/// How a run is driven and displayed.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Ticks to simulate.
    pub ticks: u64,
    /// Print a frame every this many ticks.
    pub ascii_every: Option<u64>,
    /// Frame style.
    pub ascii: AsciiConfig,
}

/// Running totals over a run's tick events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTally {
    /// Units gathered from nodes.
    pub harvested: u64,
    /// Drop-offs at home.
    pub deposits: u64,
    /// Nodes emptied.
    pub depleted: u64,
    /// Entities removed.
    pub deaths: u64,
    /// World-edge bounces.
    pub boundary_hits: u64,
    /// Obstacle bumps.
    pub obstacle_hits: u64,
}

impl EventTally {
    /// Fold one tick's events in.
    pub fn record(&mut self, events: &TickEvents) {
        for event in &events.economy {
            match event {
                EconomyEvent::ResourceGathered { amount, .. } => {
                    self.harvested += u64::from(*amount);
                }
                EconomyEvent::ResourceDeposited { .. } => self.deposits += 1,
                EconomyEvent::NodeDepleted { .. } | EconomyEvent::ResourceDiscovered { .. } => {}
            }
        }
        self.depleted += events.depleted.len() as u64;
        self.deaths += events.deaths.len() as u64;
        self.boundary_hits += events.collisions.boundary_hits.len() as u64;
        self.obstacle_hits += events.collisions.obstacle_hits.len() as u64;
    }
}

/// Final report of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario or map name.
    pub name: String,
    /// World seed.
    pub seed: u64,
    /// Ticks completed.
    pub ticks: u64,
    /// Simulated time.
    pub time_ms: u64,
    /// Final score.
    pub score: Points,
    /// Wood stockpile.
    pub wood: u32,
    /// Food stockpile.
    pub food: u32,
    /// Gold stockpile.
    pub gold: u32,
    /// Nodes found by scouts.
    pub discovered: usize,
    /// Revealed cells.
    pub revealed: usize,
    /// Total cells.
    pub cells: usize,
    /// Entities still alive.
    pub entities: usize,
    /// Event totals.
    pub tally: EventTally,
    /// Final state hash.
    pub state_hash: u64,
}

/// Owns one world and runs it.
#[derive(Debug)]
pub struct HeadlessRunner {
    name: String,
    sim: Simulation,
    tally: EventTally,
}

impl HeadlessRunner {
    /// Runner over an already built world.
    #[must_use]
    pub fn new(name: impl Into<String>, sim: Simulation) -> Self {
        Self {
            name: name.into(),
            sim,
            tally: EventTally::default(),
        }
    }

    /// Build a scenario's world.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Ok(Self::new(scenario.name.clone(), scenario.build()?))
    }

    /// The world being run.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Advance one tick.
    pub fn step(&mut self) -> TickEvents {
        let events = self.sim.tick();
        self.tally.record(&events);
        events
    }

    /// Run `config.ticks` ticks, writing frames to `out`.
    pub fn run<W: Write>(&mut self, config: &RunConfig, out: &mut W) -> io::Result<RunSummary> {
        tracing::info!(name = %self.name, ticks = config.ticks, "Run started");

        for _ in 0..config.ticks {
            let events = self.step();
            for event in &events.economy {
                tracing::debug!(tick = self.sim.get_tick(), ?event, "Economy event");
            }

            let tick = self.sim.get_tick();
            if let Some(every) = config.ascii_every.filter(|n| *n > 0) {
                if tick % every == 0 {
                    write!(out, "{}", render_ascii(&self.sim.snapshot(), &config.ascii))?;
                    writeln!(out)?;
                }
            }
        }

        let summary = self.summary();
        tracing::info!(
            name = %summary.name,
            score = %summary.score,
            wood = summary.wood,
            food = summary.food,
            discovered = summary.discovered,
            "Run finished"
        );
        Ok(summary)
    }

    /// Report on the world as it stands.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let sim = &self.sim;
        let economy = sim.economy();
        RunSummary {
            name: self.name.clone(),
            seed: sim.config().seed,
            ticks: sim.get_tick(),
            time_ms: sim.now_ms(),
            score: economy.score,
            wood: economy.wood,
            food: economy.food,
            gold: economy.gold,
            discovered: sim.discovered().len(),
            revealed: sim.fog().revealed_count(),
            cells: sim.grid().cell_count(),
            entities: sim.entities().len(),
            tally: self.tally,
            state_hash: sim.state_hash(),
        }
    }
}
