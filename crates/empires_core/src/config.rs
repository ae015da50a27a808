//! Simulation tunables.
//!
//! Defaults reproduce the classic game's constants. Every field has a serde
//! default, so a RON scenario only needs to list what it overrides:
//!
//! ```ron
//! SimConfig(
//!     seed: 7,
//!     boundary: BoundaryPolicy(health_penalty: 5),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{EntityKind, Heading};
use crate::economy::ResourceKind;
use crate::error::{GameError, Result};

/// Random wander parameters for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanderProfile {
    /// Relative weights of up, down, left, right, idle.
    pub weights: [u32; 5],
    /// Shortest time a heading is held, inclusive.
    pub min_interval_ms: u64,
    /// Longest time a heading is held, inclusive.
    pub max_interval_ms: u64,
}

impl WanderProfile {
    /// Headings matching [`WanderProfile::weights`] by index.
    pub const CHOICES: [Heading; 5] = [
        Heading::Up,
        Heading::Down,
        Heading::Left,
        Heading::Right,
        Heading::Idle,
    ];

    /// Villager default: 3:3:3:3:1, 500..=2000 ms.
    #[must_use]
    pub const fn villager() -> Self {
        Self {
            weights: [3, 3, 3, 3, 1],
            min_interval_ms: 500,
            max_interval_ms: 2000,
        }
    }

    /// Scout default: 4:4:4:4:1, 300..=1500 ms.
    #[must_use]
    pub const fn scout() -> Self {
        Self {
            weights: [4, 4, 4, 4, 1],
            min_interval_ms: 300,
            max_interval_ms: 1500,
        }
    }

    fn validate(&self, who: &str) -> Result<()> {
        if self.weights.iter().all(|w| *w == 0) {
            return Err(GameError::InvalidState(format!(
                "{who} wander weights are all zero"
            )));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(GameError::InvalidState(format!(
                "{who} wander interval {}..{} is empty",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        Ok(())
    }
}

/// What happens when an entity runs into the world edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryPolicy {
    /// Health lost per boundary hit. Zero disables the penalty.
    pub health_penalty: u32,
}

impl BoundaryPolicy {
    /// The harsher variant where scouts lost 5 health per hit.
    #[must_use]
    pub const fn punishing() -> Self {
        Self { health_penalty: 5 }
    }
}

/// All simulation tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for every random decision.
    pub seed: u64,
    /// Simulated milliseconds per tick.
    pub tick_ms: u64,
    /// Villager speed in pixels per tick.
    pub villager_speed: u32,
    /// Scout speed in pixels per tick.
    pub scout_speed: u32,
    /// Time between harvest actions.
    pub harvest_interval_ms: u64,
    /// Units a villager can carry.
    pub carry_capacity: u32,
    /// Starting wood in a tree.
    pub tree_yield: u32,
    /// Starting food in a berry bush.
    pub bush_yield: u32,
    /// Whole points for a scout's first discovery of a node.
    pub discovery_points: u32,
    /// Villager wander parameters.
    pub villager_wander: WanderProfile,
    /// Scout wander parameters.
    pub scout_wander: WanderProfile,
    /// World edge handling.
    pub boundary: BoundaryPolicy,
    /// Run the target selector each tick.
    pub agent_enabled: bool,
    /// Start with the whole map revealed.
    pub fog_disabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_ms: 16,
            villager_speed: 2,
            scout_speed: 2,
            harvest_interval_ms: 1000,
            carry_capacity: 10,
            tree_yield: ResourceKind::Tree.default_yield(),
            bush_yield: ResourceKind::BerryBush.default_yield(),
            discovery_points: 10,
            villager_wander: WanderProfile::villager(),
            scout_wander: WanderProfile::scout(),
            boundary: BoundaryPolicy::default(),
            agent_enabled: true,
            fog_disabled: false,
        }
    }
}

impl SimConfig {
    /// Default config with a specific seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Movement speed for an entity kind.
    #[must_use]
    pub const fn speed(&self, kind: EntityKind) -> u32 {
        match kind {
            EntityKind::Villager => self.villager_speed,
            EntityKind::Scout => self.scout_speed,
        }
    }

    /// Wander parameters for an entity kind.
    #[must_use]
    pub const fn wander(&self, kind: EntityKind) -> &WanderProfile {
        match kind {
            EntityKind::Villager => &self.villager_wander,
            EntityKind::Scout => &self.scout_wander,
        }
    }

    /// Starting yield of a new node.
    #[must_use]
    pub const fn resource_yield(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Tree => self.tree_yield,
            ResourceKind::BerryBush => self.bush_yield,
        }
    }

    /// Reject configurations the tick loop cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(GameError::InvalidState("tick_ms must be positive".into()));
        }
        if self.carry_capacity == 0 {
            return Err(GameError::InvalidState(
                "carry_capacity must be positive".into(),
            ));
        }
        if self.tree_yield == 0 || self.bush_yield == 0 {
            return Err(GameError::InvalidState(
                "resource yields must be positive".into(),
            ));
        }
        self.villager_wander.validate("villager")?;
        self.scout_wander.validate("scout")
    }
}
