//! Read-only views of the world for renderers.
//!
//! A [`WorldSnapshot`] is plain data: it can be serialized, diffed or drawn
//! without touching the simulation that produced it.

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorState;
use crate::components::{EntityControl, EntityId, EntityKind, Heading};
use crate::economy::{HarvestRole, ResourceEconomy, ResourceId, ResourceKind, ResourceNode};
use crate::fog::FogOfWar;
use crate::grid::{Cell, WorldGrid};
use crate::simulation::Entity;

/// One entity as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Villager or scout.
    pub kind: EntityKind,
    /// Pixel centre, rounded down.
    pub x: i64,
    /// Pixel centre, rounded down.
    pub y: i64,
    /// Cell under the centre.
    pub cell: Cell,
    /// Movement intention.
    pub heading: Heading,
    /// Sprite direction.
    pub facing: Heading,
    /// Behavior state.
    pub state: BehaviorState,
    /// Who steers it.
    pub control: EntityControl,
    /// Current health.
    pub health: u32,
    /// Units carried (villagers).
    pub carried: u32,
    /// Carry limit (villagers).
    pub capacity: u32,
    /// Harvest specialisation (villagers).
    pub role: Option<HarvestRole>,
    /// Nodes this scout has reported.
    pub discoveries: usize,
}

impl EntitySnapshot {
    /// Capture `entity`.
    #[must_use]
    pub fn of(entity: &Entity, grid: &WorldGrid) -> Self {
        let (x, y) = entity.position.to_pixels();
        let (carried, capacity, role) = entity
            .harvester
            .map_or((0, 0, None), |h| (h.carried, h.capacity, Some(h.role)));
        Self {
            id: entity.id,
            kind: entity.kind,
            x,
            y,
            cell: entity.cell(grid),
            heading: entity.heading,
            facing: entity.facing,
            state: entity.state,
            control: entity.control,
            health: entity.health.current,
            carried,
            capacity,
            role,
            discoveries: entity
                .scout_log
                .as_ref()
                .map_or(0, |log| log.discovered().len()),
        }
    }
}

/// One live resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Node id.
    pub id: ResourceId,
    /// Tree or berry bush.
    pub kind: ResourceKind,
    /// Where it stands.
    pub cell: Cell,
    /// Units left.
    pub remaining: u32,
    /// Units at creation.
    pub max_yield: u32,
    /// Whether its cell has been revealed.
    pub visible: bool,
}

impl ResourceSnapshot {
    /// Capture `node` with its fog visibility.
    #[must_use]
    pub fn of(node: &ResourceNode, fog: &FogOfWar) -> Self {
        Self {
            id: node.id,
            kind: node.kind,
            cell: node.cell,
            remaining: node.remaining,
            max_yield: node.max_yield,
            visible: fog.resource_visible(node),
        }
    }
}

/// The whole world at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks completed.
    pub tick: u64,
    /// Simulated milliseconds at `tick`.
    pub time_ms: u64,
    /// Grid rows.
    pub rows: u32,
    /// Grid columns.
    pub cols: u32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Home tile, if the map has one.
    pub home: Option<Cell>,
    /// Entities in id order.
    pub entities: Vec<EntitySnapshot>,
    /// Live resource nodes in id order.
    pub resources: Vec<ResourceSnapshot>,
    /// Stockpiles and score.
    pub economy: ResourceEconomy,
    /// Number of revealed cells.
    pub revealed_count: usize,
    /// Revealed cells, row-major.
    pub revealed: Vec<Cell>,
    /// Nodes found by scouts, in discovery order.
    pub discovered: Vec<ResourceId>,
    /// Villager under agent control.
    pub agent_entity: Option<EntityId>,
    /// Resource the agent is pursuing.
    pub agent_target: Option<ResourceId>,
}

impl WorldSnapshot {
    /// Whether `cell` was revealed.
    #[must_use]
    pub fn is_revealed(&self, cell: Cell) -> bool {
        self.revealed.binary_search(&cell).is_ok()
    }

    /// Entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Live node standing on `cell`.
    #[must_use]
    pub fn resource_at(&self, cell: Cell) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|r| r.cell == cell)
    }
}
