//! Core simulation loop.
//!
//! [`Simulation`] owns every piece of world state (grid, resource nodes,
//! entities, fog, economy, agent, random generator and clock) and advances
//! it one fixed-order tick at a time.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - All randomness comes from one `ChaCha8Rng` seeded from the config
//! - Consistent iteration order (sorted entity IDs, `BTreeMap` resources)
//! - Same seed and inputs always produce the same state hash
//!
//! # Example
//!
//! ```
//! use empires_core::config::SimConfig;
//! use empires_core::grid::WorldGrid;
//! use empires_core::math::Vec2Fixed;
//! use empires_core::simulation::Simulation;
//!
//! let grid = WorldGrid::open(11, 20, 64).unwrap();
//! let mut sim = Simulation::new(grid, SimConfig::with_seed(7)).unwrap();
//! let villager = sim.spawn_villager(Vec2Fixed::from_pixels(96, 96));
//!
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! assert!(sim.entity(villager).is_some());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentEvent, TargetSelector};
use crate::behavior::{apply_manual_input, decide, BehaviorState, WanderTimer, WorldView};
use crate::collision::{collision_system, CollisionReport, Obstacle};
use crate::components::{
    EntityControl, EntityId, EntityKind, Heading, Health, ManualInput, ScoutLog, MAX_HEALTH,
};
use crate::config::SimConfig;
use crate::economy::{
    economy_system, EconomyEvent, Harvester, Points, ResourceEconomy, ResourceId, ResourceNode,
};
use crate::error::{GameError, Result};
use crate::fog::FogOfWar;
use crate::grid::{Cell, MapDefinition, WorldGrid};
use crate::math::Vec2Fixed;
use crate::snapshot::{EntitySnapshot, ResourceSnapshot, WorldSnapshot};
use crate::spawn::{random_cells, spawn_position, RESET_POPULATION};

/// A mobile unit.
///
/// Villagers and scouts share this one type; what differs is the `kind` tag
/// and which optional capabilities are attached at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Villager or scout.
    pub kind: EntityKind,
    /// Pixel centre.
    pub position: Vec2Fixed,
    /// Position at the start of the current tick.
    pub prev_position: Option<Vec2Fixed>,
    /// Movement intention.
    pub heading: Heading,
    /// Last non-idle heading; where the sprite looks.
    pub facing: Heading,
    /// Displacement applied in the integration phase.
    pub velocity: Vec2Fixed,
    /// Pixels per tick.
    pub speed: u32,
    /// Hit points.
    pub health: Health,
    /// Behavior state.
    pub state: BehaviorState,
    /// Who steers this entity.
    pub control: EntityControl,
    /// Bounce on the next decision.
    pub reverse_next_move: bool,
    /// Following a BFS route because the direct way was blocked.
    #[serde(default)]
    pub detour: bool,
    /// Harvesting capability (villagers).
    pub harvester: Option<Harvester>,
    /// Discovery log (scouts).
    pub scout_log: Option<ScoutLog>,
    /// Wander reroll deadline.
    pub wander: WanderTimer,
}

impl Entity {
    /// Create an entity of `kind` with the capabilities that kind carries.
    ///
    /// The id is assigned when the entity is inserted into storage.
    #[must_use]
    pub fn new(kind: EntityKind, position: Vec2Fixed, config: &SimConfig) -> Self {
        let (harvester, scout_log) = match kind {
            EntityKind::Villager => (Some(Harvester::new(config.carry_capacity)), None),
            EntityKind::Scout => (None, Some(ScoutLog::default())),
        };
        Self {
            id: 0,
            kind,
            position,
            prev_position: None,
            heading: Heading::Idle,
            facing: Heading::Down,
            velocity: Vec2Fixed::ZERO,
            speed: config.speed(kind),
            health: Health::new(MAX_HEALTH),
            state: BehaviorState::Wandering,
            control: EntityControl::Autonomous,
            reverse_next_move: false,
            detour: false,
            harvester,
            scout_log,
            wander: WanderTimer::default(),
        }
    }

    /// Whether the entity still takes part in the simulation.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state != BehaviorState::Dead && !self.health.is_dead()
    }

    /// Cell under the entity's centre.
    #[must_use]
    pub fn cell(&self, grid: &WorldGrid) -> Cell {
        grid.clamped_cell_of_point(self.position)
    }
}

/// Storage for all entities in the simulation.
///
/// Uses a `HashMap` for O(1) entity lookup by ID, with deterministic
/// iteration via sorted keys when processing systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Map of entity ID to entity data.
    entities: HashMap<EntityId, Entity>,
    /// Next entity ID to assign.
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Remove every entity. Ids are never reused.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Entities in ascending id order.
    ///
    /// Sorts on every call; systems that also need mutation should take
    /// [`sorted_ids`](Self::sorted_ids) once instead.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Entity> {
        self.sorted_ids()
            .into_iter()
            .filter_map(move |id| self.entities.get(&id))
    }

    /// Iterate mutably over all entities (not in deterministic order).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Entity)> {
        self.entities.iter_mut()
    }
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Events generated during a simulation tick.
///
/// Renderers and the headless runner use these for effects and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Target selector decisions.
    pub agent: Vec<AgentEvent>,
    /// Harvests, deposits, depletions and discoveries.
    pub economy: Vec<EconomyEvent>,
    /// Boundary, pair and obstacle contacts.
    pub collisions: CollisionReport,
    /// Cells revealed for the first time.
    pub revealed: Vec<Cell>,
    /// Resource nodes removed this tick.
    pub depleted: Vec<ResourceId>,
    /// Entities removed this tick.
    pub deaths: Vec<EntityId>,
}

/// The village simulation.
///
/// # System Execution Order
///
/// Each tick, phases run in this order:
/// 1. **Decisions** - Agent directives, then every entity's state machine
/// 2. **Integration** - Apply velocities to positions
/// 3. **Collisions** - World edge, entity pairs, obstacles, scout discoveries
/// 4. **Fog** - Reveal every occupied cell
/// 5. **Commits** - Apply harvest and deposit intents to nodes and economy
/// 6. **Reaping** - Remove depleted nodes and dead entities
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    grid: WorldGrid,
    resources: BTreeMap<ResourceId, ResourceNode>,
    entities: EntityStorage,
    fog: FogOfWar,
    economy: ResourceEconomy,
    discovered: Vec<ResourceId>,
    agent: TargetSelector,
    rng: ChaCha8Rng,
    /// Current simulation tick.
    tick: u64,
}

impl Simulation {
    /// Build a world on `grid`: one resource node per obstacle tile, full fog,
    /// empty economy and no entities.
    pub fn new(grid: WorldGrid, config: SimConfig) -> Result<Self> {
        config.validate()?;
        let resources = build_resources(&grid, &config);
        let mut fog = FogOfWar::new(&grid);
        if config.fog_disabled {
            fog.reveal_all();
        }
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        tracing::info!(
            rows = grid.rows(),
            cols = grid.cols(),
            resources = resources.len(),
            seed = config.seed,
            "World built"
        );

        Ok(Self {
            config,
            grid,
            resources,
            entities: EntityStorage::new(),
            fog,
            economy: ResourceEconomy::new(),
            discovered: Vec::new(),
            agent: TargetSelector::new(),
            rng,
            tick: 0,
        })
    }

    /// Decode a map and build a world on it.
    pub fn from_definition(def: &MapDefinition, config: SimConfig) -> Result<Self> {
        Self::new(WorldGrid::from_definition(def)?, config)
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time at the start of the current tick.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.tick * self.config.tick_ms
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Replace the configuration. Changes apply from the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] and keeps the old configuration
    /// when `config` fails [`SimConfig::validate`].
    pub fn set_config(&mut self, config: SimConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// The static map.
    #[must_use]
    pub const fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    /// Live resource nodes.
    #[must_use]
    pub const fn resources(&self) -> &BTreeMap<ResourceId, ResourceNode> {
        &self.resources
    }

    /// Look up a live resource node.
    pub fn resource(&self, id: ResourceId) -> Result<&ResourceNode> {
        self.resources
            .get(&id)
            .ok_or(GameError::ResourceNotFound(id.0))
    }

    /// Get a reference to the entity storage.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable entity access for scripted setups.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Fog of war.
    #[must_use]
    pub const fn fog(&self) -> &FogOfWar {
        &self.fog
    }

    /// Global counters.
    #[must_use]
    pub const fn economy(&self) -> &ResourceEconomy {
        &self.economy
    }

    /// Resource ids found by scouts, in discovery order.
    #[must_use]
    pub fn discovered(&self) -> &[ResourceId] {
        &self.discovered
    }

    /// The target selector.
    #[must_use]
    pub const fn agent(&self) -> &TargetSelector {
        &self.agent
    }

    /// The agent's BFS route to its current target.
    #[must_use]
    pub fn planned_path(&self) -> Vec<Vec2Fixed> {
        self.agent.planned_path(self)
    }

    /// Add an entity of `kind` at `position`.
    pub fn spawn(&mut self, kind: EntityKind, position: Vec2Fixed) -> EntityId {
        let id = self
            .entities
            .insert(Entity::new(kind, position, &self.config));
        tracing::debug!(entity = id, kind = kind.label(), "Entity spawned");
        id
    }

    /// Add a villager at `position`.
    pub fn spawn_villager(&mut self, position: Vec2Fixed) -> EntityId {
        self.spawn(EntityKind::Villager, position)
    }

    /// Add a scout at `position`.
    pub fn spawn_scout(&mut self, position: Vec2Fixed) -> EntityId {
        self.spawn(EntityKind::Scout, position)
    }

    /// Add an entity at the standard spawn point next to home.
    pub fn spawn_near_home(&mut self, kind: EntityKind) -> Result<EntityId> {
        let (position, _) = spawn_position(&self.grid, &mut self.rng)
            .ok_or_else(|| GameError::NoSpawnCell("map has no cells".into()))?;
        Ok(self.spawn(kind, position))
    }

    /// Remove an entity.
    pub fn despawn_entity(&mut self, id: EntityId) -> Result<Entity> {
        self.entities
            .remove(id)
            .ok_or(GameError::EntityNotFound(id))
    }

    /// Hand an entity to a different controller.
    pub fn set_control(&mut self, id: EntityId, control: EntityControl) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(GameError::EntityNotFound(id))?;
        entity.control = control;
        if control == EntityControl::Manual {
            entity.heading = Heading::Idle;
        }
        Ok(())
    }

    /// Apply one manual input to a manually controlled entity.
    pub fn apply_input(&mut self, id: EntityId, input: &ManualInput) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(GameError::EntityNotFound(id))?;
        if entity.control != EntityControl::Manual {
            tracing::debug!(entity = id, "Ignoring input for entity not under manual control");
            return Err(GameError::NotManuallyControlled(id));
        }
        let world = WorldView::new(&self.grid, &self.resources);
        apply_manual_input(entity, input, &world);
        Ok(())
    }

    /// Send a villager after a specific resource node.
    pub fn command_seek(&mut self, id: EntityId, resource: ResourceId) -> Result<()> {
        if !self.resources.contains_key(&resource) {
            return Err(GameError::ResourceNotFound(resource.0));
        }
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(GameError::EntityNotFound(id))?;
        if entity.harvester.is_none() || !entity.is_alive() {
            return Err(GameError::InvalidState(format!(
                "entity {id} cannot harvest"
            )));
        }
        entity.state = BehaviorState::SeekingTarget(resource);
        Ok(())
    }

    /// Advance the simulation by one tick.
    ///
    /// Runs all phases in deterministic order and increments the tick counter.
    /// Never fails; degraded situations are logged and skipped.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        let now = self.now_ms();

        // 1. Decisions
        if self.config.agent_enabled {
            events.agent =
                self.agent
                    .update(&mut self.entities, &self.grid, &self.resources, &mut self.rng);
        }
        let ids = self.entities.sorted_ids();
        let intents = {
            let world = WorldView::new(&self.grid, &self.resources);
            let mut intents = Vec::new();
            for &id in &ids {
                if let Some(entity) = self.entities.get_mut(id) {
                    intents.extend(decide(entity, &world, now, &mut self.rng, &self.config));
                }
            }
            intents
        };

        // 2. Integration
        for &id in &ids {
            if let Some(entity) = self.entities.get_mut(id) {
                if entity.is_alive() {
                    entity.position = entity.position + entity.velocity;
                }
            }
        }

        // 3. Collisions
        events.collisions = collision_system(
            &mut self.entities,
            &ids,
            &self.grid,
            &self.resources,
            &self.config.boundary,
        );
        let hits = events.collisions.obstacle_hits.clone();
        for hit in hits {
            if self.fog.reveal(hit.cell) {
                events.revealed.push(hit.cell);
            }
            if let Obstacle::Resource(node) = hit.obstacle {
                events.economy.extend(self.record_discovery(hit.entity, node));
            }
        }

        // 4. Fog
        for &id in &ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if !entity.is_alive() {
                continue;
            }
            let cell = entity.cell(&self.grid);
            if self.fog.reveal(cell) {
                events.revealed.push(cell);
            }
        }

        // 5. Commits
        let mut harvesters: BTreeMap<EntityId, &mut Harvester> = self
            .entities
            .iter_mut()
            .filter_map(|(id, entity)| entity.harvester.as_mut().map(|h| (*id, h)))
            .collect();
        events.economy.extend(economy_system(
            &intents,
            &mut harvesters,
            &mut self.resources,
            &mut self.economy,
        ));

        // 6. Reaping
        self.resources.retain(|id, node| {
            if node.is_depleted() {
                events.depleted.push(*id);
                false
            } else {
                true
            }
        });
        for &id in &ids {
            let dead = self.entities.get(id).is_some_and(|e| !e.is_alive());
            if dead {
                self.entities.remove(id);
                tracing::debug!(entity = id, "Entity removed");
                events.deaths.push(id);
            }
        }

        self.tick += 1;

        #[cfg(feature = "debug-validation")]
        for violation in self.invariant_violations() {
            tracing::error!(tick = self.tick, %violation, "Invariant violated");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run `count` ticks, discarding events.
    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Log a scout's contact with a resource node.
    ///
    /// The first time any scout reports a node, the world list grows and the
    /// discovery bonus is paid once.
    fn record_discovery(&mut self, entity: EntityId, node: ResourceId) -> Option<EconomyEvent> {
        let log = self.entities.get_mut(entity)?.scout_log.as_mut()?;
        log.record(node);
        if self.discovered.contains(&node) {
            return None;
        }
        self.discovered.push(node);
        let points = Points::from_whole(u64::from(self.config.discovery_points));
        self.economy.award(points);
        tracing::info!(scout = entity, %node, %points, "Resource discovered");
        Some(EconomyEvent::ResourceDiscovered {
            scout: entity,
            node,
            points,
        })
    }

    /// Replace every entity with a fresh villager, scout and villager on
    /// distinct random cells. Map, resources, fog and economy are kept.
    pub fn reset_population(&mut self) -> Vec<EntityId> {
        self.entities.clear();
        self.agent.clear();
        let cells = random_cells(&self.grid, &mut self.rng, RESET_POPULATION.len());
        cells
            .into_iter()
            .zip(RESET_POPULATION)
            .map(|(cell, kind)| {
                let position = self.grid.point_center_of_cell(cell);
                self.spawn(kind, position)
            })
            .collect()
    }

    /// Start the world over on the same map.
    ///
    /// Entities, economy, fog, discoveries and the agent are cleared and every
    /// resource node regrows. The clock and random generator keep running.
    pub fn reset_world(&mut self) {
        self.entities.clear();
        self.economy.reset();
        self.fog.clear();
        if self.config.fog_disabled {
            self.fog.reveal_all();
        }
        self.discovered.clear();
        self.agent.clear();
        self.resources = build_resources(&self.grid, &self.config);
        tracing::info!(tick = self.tick, "World reset");
    }

    /// Serializable read-only view for renderers.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let entities = self
            .entities
            .iter_sorted()
            .map(|e| EntitySnapshot::of(e, &self.grid))
            .collect();
        let resources = self
            .resources
            .values()
            .map(|node| ResourceSnapshot::of(node, &self.fog))
            .collect();

        WorldSnapshot {
            tick: self.tick,
            time_ms: self.now_ms(),
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            tile_size: self.grid.tile_size(),
            home: self.grid.home_cell(),
            entities,
            resources,
            economy: self.economy,
            revealed_count: self.fog.revealed_count(),
            revealed: self.fog.revealed_cells().collect(),
            discovered: self.discovered.clone(),
            agent_entity: self.agent.controlled(),
            agent_target: self.agent.target(),
        }
    }

    /// Calculate a deterministic hash of the simulation state.
    ///
    /// Two runs with the same map, config and inputs produce the same hash
    /// after every tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        self.entities.len().hash(&mut hasher);
        for entity in self.entities.iter_sorted() {
            entity.id.hash(&mut hasher);
            entity.position.x.to_bits().hash(&mut hasher);
            entity.position.y.to_bits().hash(&mut hasher);
            entity.heading.hash(&mut hasher);
            entity.state.hash(&mut hasher);
            entity.control.hash(&mut hasher);
            entity.health.current.hash(&mut hasher);
            entity.reverse_next_move.hash(&mut hasher);
            entity.detour.hash(&mut hasher);
            entity.wander.hash(&mut hasher);
            if let Some(harvester) = &entity.harvester {
                harvester.role.hash(&mut hasher);
                harvester.carried.hash(&mut hasher);
            }
            if let Some(log) = &entity.scout_log {
                log.discovered().hash(&mut hasher);
            }
        }

        for node in self.resources.values() {
            node.id.hash(&mut hasher);
            node.remaining.hash(&mut hasher);
        }

        self.economy.wood.hash(&mut hasher);
        self.economy.food.hash(&mut hasher);
        self.economy.gold.hash(&mut hasher);
        self.economy.score.hash(&mut hasher);
        self.fog.revealed_count().hash(&mut hasher);
        self.discovered.hash(&mut hasher);
        self.agent.controlled().hash(&mut hasher);
        self.agent.target().hash(&mut hasher);

        hasher.finish()
    }

    /// Describe every broken world invariant. Empty when all hold.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for entity in self.entities.iter_sorted() {
            if let Some(h) = &entity.harvester {
                if h.carried > h.capacity {
                    violations.push(format!(
                        "entity {} carries {} over capacity {}",
                        entity.id, h.carried, h.capacity
                    ));
                }
            }
            if entity.health.current > entity.health.max {
                violations.push(format!("entity {} health above max", entity.id));
            }
            if self.grid.cell_count() > 0 && self.grid.cell_of_point(entity.position).is_none() {
                violations.push(format!("entity {} is outside the world", entity.id));
            }
        }

        for node in self.resources.values() {
            if node.remaining == 0 || node.remaining > node.max_yield {
                violations.push(format!(
                    "resource {} has {}/{} remaining",
                    node.id, node.remaining, node.max_yield
                ));
            }
        }

        let mut seen = self.discovered.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.discovered.len() {
            violations.push("discovered list has duplicates".into());
        }

        violations
    }
}

/// One node per obstacle tile, ids in row-major order.
fn build_resources(grid: &WorldGrid, config: &SimConfig) -> BTreeMap<ResourceId, ResourceNode> {
    (0..)
        .zip(grid.resource_tiles())
        .map(|(index, (cell, kind))| {
            let id = ResourceId(index);
            (
                id,
                ResourceNode::with_yield(id, kind, cell, config.resource_yield(kind)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::{Commodity, ResourceKind};
    use crate::grid::TileKind;

    const TILE: u32 = 32;

    fn center(grid: &WorldGrid, row: u32, col: u32) -> Vec2Fixed {
        grid.point_center_of_cell(Cell::new(row, col))
    }

    fn quiet_config() -> SimConfig {
        SimConfig {
            agent_enabled: false,
            ..SimConfig::default()
        }
    }

    fn small_world() -> Simulation {
        let o = TileKind::Open;
        let t = TileKind::Obstacle(ResourceKind::Tree);
        let b = TileKind::Obstacle(ResourceKind::BerryBush);
        let h = TileKind::Home;
        let grid = WorldGrid::from_rows(
            TILE,
            vec![
                vec![o, o, o, o, o],
                vec![o, t, o, o, o],
                vec![o, o, o, h, o],
                vec![b, o, o, o, o],
            ],
        )
        .unwrap();
        Simulation::new(grid, quiet_config()).unwrap()
    }

    #[test]
    fn test_simulation_creation() {
        let sim = small_world();
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.resources().len(), 2);
        assert_eq!(sim.resource(ResourceId(0)).map(|n| n.kind), Ok(ResourceKind::Tree));
        assert_eq!(
            sim.resource(ResourceId(1)).map(|n| n.remaining),
            Ok(15)
        );
        assert_eq!(sim.resource(ResourceId(7)), Err(GameError::ResourceNotFound(7)));
        assert!(sim.entities().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            tick_ms: 0,
            ..SimConfig::default()
        };
        let grid = WorldGrid::open(2, 2, 8).unwrap();
        assert!(matches!(
            Simulation::new(grid, config),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_set_config_validates() {
        let mut sim = small_world();
        let mut bad = sim.config().clone();
        bad.villager_wander.min_interval_ms = 3000;
        bad.villager_wander.max_interval_ms = 500;
        assert!(matches!(sim.set_config(bad), Err(GameError::InvalidState(_))));
        assert_eq!(sim.config(), &quiet_config());

        let faster = SimConfig {
            villager_speed: 4,
            ..quiet_config()
        };
        sim.set_config(faster.clone()).unwrap();
        assert_eq!(sim.config(), &faster);
        sim.run_ticks(5);
    }

    #[test]
    fn test_clock_advances() {
        let mut sim = small_world();
        assert_eq!(sim.now_ms(), 0);
        sim.run_ticks(3);
        assert_eq!(sim.get_tick(), 3);
        assert_eq!(sim.now_ms(), 48);
    }

    #[test]
    fn test_entity_capabilities() {
        let mut sim = small_world();
        let grid = sim.grid().clone();
        let v = sim.spawn_villager(center(&grid, 0, 0));
        let s = sim.spawn_scout(center(&grid, 3, 4));

        let villager = sim.entity(v).unwrap();
        assert!(villager.harvester.is_some());
        assert!(villager.scout_log.is_none());
        assert_eq!(villager.health.current, MAX_HEALTH);

        let scout = sim.entity(s).unwrap();
        assert!(scout.harvester.is_none());
        assert!(scout.scout_log.is_some());
    }

    #[test]
    fn test_spawn_near_home() {
        let mut sim = small_world();
        let id = sim.spawn_near_home(EntityKind::Villager).unwrap();
        let grid = sim.grid().clone();
        assert_eq!(sim.entity(id).map(|e| e.cell(&grid)), Some(Cell::new(2, 2)));

        let mut empty = Simulation::new(WorldGrid::open(0, 0, 8).unwrap(), quiet_config()).unwrap();
        assert!(matches!(
            empty.spawn_near_home(EntityKind::Scout),
            Err(GameError::NoSpawnCell(_))
        ));
    }

    #[test]
    fn test_despawn_and_errors() {
        let mut sim = small_world();
        let id = sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        assert!(sim.despawn_entity(id).is_ok());
        assert_eq!(sim.despawn_entity(id), Err(GameError::EntityNotFound(id)));
        assert_eq!(
            sim.set_control(id, EntityControl::Manual),
            Err(GameError::EntityNotFound(id))
        );
    }

    #[test]
    fn test_input_requires_manual_control() {
        let mut sim = small_world();
        let id = sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        let input = ManualInput::steer(Heading::Right);

        assert_eq!(
            sim.apply_input(id, &input),
            Err(GameError::NotManuallyControlled(id))
        );
        assert_eq!(sim.entity(id).map(|e| e.heading), Some(Heading::Idle));

        sim.set_control(id, EntityControl::Manual).unwrap();
        sim.apply_input(id, &input).unwrap();
        sim.tick();
        assert_eq!(
            sim.entity(id).map(|e| e.position),
            Some(Vec2Fixed::from_pixels(18, 16))
        );
    }

    #[test]
    fn test_command_seek_validation() {
        let mut sim = small_world();
        let v = sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        let s = sim.spawn_scout(Vec2Fixed::from_pixels(144, 16));

        assert!(sim.command_seek(v, ResourceId(0)).is_ok());
        assert_eq!(
            sim.command_seek(v, ResourceId(9)),
            Err(GameError::ResourceNotFound(9))
        );
        assert!(matches!(
            sim.command_seek(s, ResourceId(0)),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_harvest_cycle_deposits_wood() {
        let mut sim = small_world();
        let grid = sim.grid().clone();
        // Standing right of the tree at (1, 1).
        let id = sim.spawn_villager(center(&grid, 1, 2));
        sim.command_seek(id, ResourceId(0)).unwrap();

        let mut deposited = None;
        for _ in 0..2000 {
            let events = sim.tick();
            deposited = events.economy.iter().find_map(|e| match e {
                EconomyEvent::ResourceDeposited {
                    commodity, amount, ..
                } => Some((*commodity, *amount)),
                _ => None,
            });
            if deposited.is_some() {
                break;
            }
        }

        assert_eq!(deposited, Some((Commodity::Wood, 10)));
        assert_eq!(sim.economy().wood, 10);
        assert_eq!(sim.economy().score, Points::from_whole(12));
        assert_eq!(sim.resource(ResourceId(0)).map(|n| n.remaining), Ok(15));
        assert!(sim.invariant_violations().is_empty());
    }

    #[test]
    fn test_depleted_node_is_reaped() {
        let mut sim = small_world();
        sim.set_config(SimConfig {
            tree_yield: 1,
            ..sim.config().clone()
        })
        .unwrap();
        sim.reset_world();
        let grid = sim.grid().clone();
        let id = sim.spawn_villager(center(&grid, 1, 2));
        sim.command_seek(id, ResourceId(0)).unwrap();

        let mut depleted = Vec::new();
        for _ in 0..10 {
            depleted.extend(sim.tick().depleted);
        }
        assert_eq!(depleted, vec![ResourceId(0)]);
        assert!(sim.resource(ResourceId(0)).is_err());
        assert_eq!(
            sim.entity(id).and_then(|e| e.harvester).map(|h| h.carried),
            Some(1)
        );
    }

    #[test]
    fn test_fog_reveals_occupied_cells() {
        let mut sim = small_world();
        let grid = sim.grid().clone();
        sim.spawn_scout(center(&grid, 3, 3));
        let events = sim.tick();
        assert!(events.revealed.contains(&Cell::new(3, 3)));
        assert!(sim.fog().is_revealed(Cell::new(3, 3)));
    }

    #[test]
    fn test_fog_disabled_reveals_everything() {
        let grid = WorldGrid::open(3, 3, 8).unwrap();
        let config = SimConfig {
            fog_disabled: true,
            ..quiet_config()
        };
        let sim = Simulation::new(grid, config).unwrap();
        assert!(sim.fog().is_fully_revealed());
    }

    #[test]
    fn test_reset_population() {
        let mut sim = small_world();
        sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        let ids = sim.reset_population();

        assert_eq!(ids.len(), 3);
        let kinds: Vec<_> = ids
            .iter()
            .filter_map(|id| sim.entity(*id).map(|e| e.kind))
            .collect();
        assert_eq!(kinds, RESET_POPULATION.to_vec());

        let grid = sim.grid().clone();
        let mut cells: Vec<_> = ids
            .iter()
            .filter_map(|id| sim.entity(*id).map(|e| e.cell(&grid)))
            .collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), 3);
        assert!(cells.iter().all(|c| !grid.is_blocked(*c)));
    }

    #[test]
    fn test_reset_world_restores_resources() {
        let mut sim = small_world();
        sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        sim.run_ticks(5);
        sim.reset_world();

        assert!(sim.entities().is_empty());
        assert_eq!(sim.economy(), &ResourceEconomy::new());
        assert_eq!(sim.fog().revealed_count(), 0);
        assert_eq!(sim.resources().len(), 2);
        assert!(sim.discovered().is_empty());
    }

    #[test]
    fn test_state_hash_determinism() {
        let run = || {
            let mut sim = small_world();
            sim.set_config(SimConfig {
                agent_enabled: true,
                ..sim.config().clone()
            })
            .unwrap();
            sim.reset_population();
            sim.run_ticks(300);
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut sim = small_world();
        sim.reset_population();
        sim.tick();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.entities.len(), 3);
        assert_eq!(snapshot.resources.len(), 2);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"tick\":1"));
    }
}
