//! # Empires Core
//!
//! Deterministic village simulation: villagers harvest trees and berry
//! bushes and carry the goods home, scouts explore and report resources,
//! and a simple agent keeps one villager busy.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (one seeded `ChaCha8Rng` per world)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch runs
//! - Any renderer on top of [`snapshot::WorldSnapshot`]
//! - Determinism testing through [`simulation::Simulation::state_hash`]
//!
//! ## Crate Structure
//!
//! - [`components`] - Entity kinds, headings and control modes
//! - [`config`] - Simulation tunables
//! - [`grid`] - Tile map, cell/pixel conversion, map decoding
//! - [`economy`] - Resource nodes, harvesters and global stockpiles
//! - [`behavior`] - Per-entity state machine
//! - [`collision`] - Boundary, entity and obstacle collisions
//! - [`fog`] - Revealed cells
//! - [`pathfinding`] - Breadth-first grid search
//! - [`agent`] - Target selection for one controlled villager
//! - [`spawn`] - Spawn point and random cell selection
//! - [`snapshot`] - Read-only views for renderers
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod behavior;
pub mod collision;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod fog;
pub mod grid;
pub mod math;
pub mod pathfinding;
pub mod simulation;
pub mod snapshot;
pub mod spawn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{AgentEvent, TargetSelector};
    pub use crate::behavior::BehaviorState;
    pub use crate::components::*;
    pub use crate::config::{BoundaryPolicy, SimConfig, WanderProfile};
    pub use crate::economy::{
        Commodity, EconomyEvent, Harvester, Points, ResourceEconomy, ResourceId, ResourceKind,
        ResourceNode,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::grid::{Cell, MapDefinition, TileKind, WorldGrid};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{Entity, Simulation, TickEvents};
    pub use crate::snapshot::WorldSnapshot;
}
