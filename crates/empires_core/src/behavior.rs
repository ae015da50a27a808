//! Per-entity behavior state machine.
//!
//! Each tick every living entity runs [`decide`] once, in ascending id order,
//! against the world as it stood when the tick began. Decisions only touch
//! the deciding entity; anything that changes shared state (harvesting,
//! depositing) comes back as an [`EconomyIntent`] for the commit phase.
//!
//! # States
//!
//! ```text
//! Wandering ──agent──▶ SeekingTarget ──adjacent──▶ PerformingAction
//!     ▲                                                  │ full
//!     └──────── DroppingOff ◀──next to home── ReturningHome
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{EntityControl, Heading, ManualInput};
use crate::config::{SimConfig, WanderProfile};
use crate::economy::{EconomyIntent, Harvester, ResourceId, ResourceNode};
use crate::grid::{Cell, TileKind, WorldGrid};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::find_cell_path_to_any;
use crate::simulation::Entity;

/// What an entity is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Moving around on its own, or holding still under agent control.
    #[default]
    Wandering,
    /// Walking toward a resource node.
    SeekingTarget(ResourceId),
    /// Harvesting an adjacent node.
    PerformingAction(ResourceId),
    /// Carrying goods back to home.
    ReturningHome,
    /// Handing goods over at home.
    DroppingOff,
    /// Out of health; removed at the end of the tick.
    Dead,
}

impl BehaviorState {
    /// Short state name for logs and snapshots.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wandering => "wandering",
            Self::SeekingTarget(_) => "seeking_target",
            Self::PerformingAction(_) => "performing_action",
            Self::ReturningHome => "returning_home",
            Self::DroppingOff => "dropping_off",
            Self::Dead => "dead",
        }
    }

    /// Resource this state refers to, if any.
    #[must_use]
    pub const fn resource(self) -> Option<ResourceId> {
        match self {
            Self::SeekingTarget(id) | Self::PerformingAction(id) => Some(id),
            _ => None,
        }
    }
}

/// When an autonomous wanderer next picks a new heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WanderTimer {
    /// Simulated time of the next reroll.
    pub next_change_ms: u64,
}

impl WanderTimer {
    /// A reroll happens once the clock has passed the deadline.
    #[must_use]
    pub const fn is_due(&self, now_ms: u64) -> bool {
        now_ms > self.next_change_ms
    }
}

/// Pick a wander heading with the profile's weights.
///
/// Falls back to idle if the weights are unusable.
pub fn sample_heading<R: Rng + ?Sized>(profile: &WanderProfile, rng: &mut R) -> Heading {
    WeightedIndex::new(profile.weights)
        .map_or(Heading::Idle, |dist| WanderProfile::CHOICES[dist.sample(rng)])
}

/// Read-only view of the world at the start of a tick.
#[derive(Debug)]
pub struct WorldView<'a> {
    /// Static tiles.
    pub grid: &'a WorldGrid,
    /// Live resource nodes.
    pub resources: &'a BTreeMap<ResourceId, ResourceNode>,
    by_cell: HashMap<Cell, ResourceId>,
}

impl<'a> WorldView<'a> {
    /// Index the live resources by cell.
    #[must_use]
    pub fn new(grid: &'a WorldGrid, resources: &'a BTreeMap<ResourceId, ResourceNode>) -> Self {
        let by_cell = resources.values().map(|n| (n.cell, n.id)).collect();
        Self {
            grid,
            resources,
            by_cell,
        }
    }

    /// Live resource standing on `cell`.
    #[must_use]
    pub fn resource_at(&self, cell: Cell) -> Option<&ResourceNode> {
        self.by_cell.get(&cell).and_then(|id| self.resources.get(id))
    }

    /// Out of bounds, a Home tile, or holding a live resource.
    #[must_use]
    pub fn is_obstructed(&self, cell: Cell) -> bool {
        !self.grid.in_bounds(cell)
            || self.grid.tile_at(cell) == Some(TileKind::Home)
            || self.by_cell.contains_key(&cell)
    }

    /// Cell an entity at `position` stands on.
    #[must_use]
    pub fn cell_of(&self, position: Vec2Fixed) -> Cell {
        self.grid.clamped_cell_of_point(position)
    }
}

/// 4-neighbours of `target` an entity can stand on, in up, down, left,
/// right order.
///
/// Cells still blocked on the static map are left out so a route can
/// always be planned to the result.
pub fn free_neighbors<'w>(
    world: &'w WorldView<'w>,
    target: Cell,
) -> impl Iterator<Item = Cell> + 'w {
    world
        .grid
        .neighbors4(target)
        .filter(move |c| !world.is_obstructed(*c) && !world.grid.is_blocked(*c))
}

/// Nearest free 4-neighbour of `target` as seen from `from`.
///
/// Ties go to the first neighbour in up, down, left, right order.
#[must_use]
pub fn approach_cell(world: &WorldView<'_>, from: Cell, target: Cell) -> Option<Cell> {
    free_neighbors(world, target).min_by_key(|c| c.manhattan(from))
}

/// A node 4-adjacent to `cell` that `harvester` may gather from.
///
/// `preferred` wins when it qualifies; otherwise the first match in
/// up, down, left, right order.
#[must_use]
pub fn adjacent_resource(
    world: &WorldView<'_>,
    cell: Cell,
    preferred: Option<ResourceId>,
    harvester: &Harvester,
) -> Option<ResourceId> {
    let usable = |node: &ResourceNode| node.cell.is_adjacent4(cell) && harvester.can_harvest(node.kind);

    if let Some(node) = preferred.and_then(|id| world.resources.get(&id)) {
        if usable(node) {
            return Some(node.id);
        }
    }
    world
        .grid
        .neighbors4(cell)
        .filter_map(|c| world.resource_at(c))
        .find(|node| usable(node))
        .map(|node| node.id)
}

/// Cardinal heading from one cell toward another, larger axis first.
#[must_use]
pub fn heading_between(from: Cell, to: Cell) -> Heading {
    let dcol = i64::from(to.col) - i64::from(from.col);
    let drow = i64::from(to.row) - i64::from(from.row);
    if dcol.abs() > drow.abs() {
        Heading::from_axis_step(true, dcol)
    } else {
        Heading::from_axis_step(false, drow)
    }
}

#[derive(Debug, Clone, Copy)]
struct Step {
    heading: Heading,
    pixels: Fixed,
}

impl Step {
    const IDLE: Self = Self {
        heading: Heading::Idle,
        pixels: Fixed::ZERO,
    };

    fn toward(heading: Heading, pixels: u32) -> Self {
        Self {
            heading,
            pixels: Fixed::from_num(pixels),
        }
    }

    /// Move along one axis by `along`, at most `speed` pixels.
    fn along_axis(horizontal: bool, along: Fixed, speed: u32) -> Self {
        let sign = if along > Fixed::ZERO { 1 } else { -1 };
        Self {
            heading: Heading::from_axis_step(horizontal, sign),
            pixels: along.abs().min(Fixed::from_num(speed)),
        }
    }
}

/// Advance one entity's state machine by one tick.
///
/// Sets the entity's heading and velocity for the integration phase and
/// returns the economy mutation it wants, if any.
pub fn decide<R: Rng + ?Sized>(
    entity: &mut Entity,
    world: &WorldView<'_>,
    now_ms: u64,
    rng: &mut R,
    config: &SimConfig,
) -> Option<EconomyIntent> {
    if entity.state == BehaviorState::Dead {
        entity.velocity = Vec2Fixed::ZERO;
        return None;
    }

    if std::mem::take(&mut entity.reverse_next_move) {
        entity.heading = entity.heading.reversed();
    }
    entity.prev_position = Some(entity.position);

    let before = entity.state;
    let mut intent = None;
    let step = match entity.state {
        BehaviorState::Wandering => wander(entity, now_ms, rng, config),
        BehaviorState::SeekingTarget(target) => seek(entity, world, target),
        BehaviorState::PerformingAction(target) => {
            intent = perform(entity, world, target, now_ms, config);
            Step::IDLE
        }
        BehaviorState::ReturningHome => return_home(entity, world),
        BehaviorState::DroppingOff => {
            if entity.harvester.is_some() {
                intent = Some(EconomyIntent::Deposit { entity: entity.id });
            }
            entity.state = BehaviorState::Wandering;
            Step::IDLE
        }
        BehaviorState::Dead => Step::IDLE,
    };

    entity.heading = step.heading;
    if step.heading.is_moving() {
        entity.facing = step.heading;
    }
    entity.velocity = step.heading.unit_vector().scale(step.pixels);

    if before != entity.state {
        entity.detour = false;
        tracing::debug!(
            entity = entity.id,
            from = before.name(),
            to = entity.state.name(),
            "State transition"
        );
    }
    intent
}

fn wander<R: Rng + ?Sized>(
    entity: &mut Entity,
    now_ms: u64,
    rng: &mut R,
    config: &SimConfig,
) -> Step {
    match entity.control {
        EntityControl::Agent => Step::IDLE,
        EntityControl::Manual => Step::toward(entity.heading, entity.speed),
        EntityControl::Autonomous => {
            if entity.wander.is_due(now_ms) {
                let profile = config.wander(entity.kind);
                entity.heading = sample_heading(profile, rng);
                let (min, max) = (profile.min_interval_ms, profile.max_interval_ms);
                let hold = rng.gen_range(min..=max.max(min));
                entity.wander.next_change_ms = now_ms + hold;
            }
            Step::toward(entity.heading, entity.speed)
        }
    }
}

fn seek(entity: &mut Entity, world: &WorldView<'_>, target: ResourceId) -> Step {
    let Some(node) = world.resources.get(&target) else {
        entity.state = BehaviorState::Wandering;
        return Step::IDLE;
    };
    let Some(harvester) = entity.harvester else {
        entity.state = BehaviorState::Wandering;
        return Step::IDLE;
    };

    let grid = world.grid;
    let cell = world.cell_of(entity.position);
    let to_center = grid.point_center_of_cell(node.cell) - entity.position;
    let tile = grid.tile_len();

    if to_center.x.abs() <= tile && to_center.y.abs() <= tile {
        if let Some(adjacent) = adjacent_resource(world, cell, Some(target), &harvester) {
            entity.state = BehaviorState::PerformingAction(adjacent);
            if let Some(found) = world.resources.get(&adjacent) {
                entity.facing = heading_between(cell, found.cell);
            }
            return Step::IDLE;
        }
        let blocked_by_cargo = grid
            .neighbors4(cell)
            .any(|c| world.resource_at(c).is_some());
        if blocked_by_cargo && !harvester.is_empty() {
            entity.state = BehaviorState::ReturningHome;
            return Step::IDLE;
        }
    }

    match travel(entity, world, node.cell) {
        Travel::Walking(step) => step,
        Travel::Arrived => Step::IDLE,
        Travel::Stuck => {
            tracing::debug!(entity = entity.id, target = target.0, "Target out of reach");
            entity.state = BehaviorState::Wandering;
            Step::IDLE
        }
    }
}

fn perform(
    entity: &mut Entity,
    world: &WorldView<'_>,
    target: ResourceId,
    now_ms: u64,
    config: &SimConfig,
) -> Option<EconomyIntent> {
    let cell = world.cell_of(entity.position);
    let Some(harvester) = entity.harvester.as_mut() else {
        entity.state = BehaviorState::Wandering;
        return None;
    };
    if harvester.is_full() {
        entity.state = BehaviorState::ReturningHome;
        return None;
    }
    let Some(node_id) = adjacent_resource(world, cell, Some(target), harvester) else {
        entity.state = BehaviorState::Wandering;
        return None;
    };

    entity.state = BehaviorState::PerformingAction(node_id);
    if let Some(node) = world.resources.get(&node_id) {
        entity.facing = heading_between(cell, node.cell);
    }

    let ready = harvester
        .last_harvest_ms
        .map_or(true, |last| now_ms.saturating_sub(last) >= config.harvest_interval_ms);
    if !ready {
        return None;
    }
    harvester.last_harvest_ms = Some(now_ms);
    Some(EconomyIntent::Harvest {
        entity: entity.id,
        node: node_id,
        amount: harvester.harvest_amount(),
    })
}

fn return_home(entity: &mut Entity, world: &WorldView<'_>) -> Step {
    let Some(home) = world.grid.home_cell() else {
        tracing::trace!(entity = entity.id, "No home to return to");
        return Step::IDLE;
    };

    let cell = world.cell_of(entity.position);
    if cell.is_adjacent4(home) {
        entity.state = BehaviorState::DroppingOff;
        return Step::IDLE;
    }

    match travel(entity, world, home) {
        Travel::Walking(step) => step,
        Travel::Arrived => Step::IDLE,
        Travel::Stuck => {
            tracing::trace!(entity = entity.id, "Home out of reach");
            Step::IDLE
        }
    }
}

/// Where one tick of walking toward a target cell leaves an entity.
#[derive(Debug, Clone, Copy)]
enum Travel {
    /// Still on the way.
    Walking(Step),
    /// Centred on a free neighbour of the target.
    Arrived,
    /// No free neighbour of the target can be reached.
    Stuck,
}

/// Walk one tick toward a free 4-neighbour of `target`.
///
/// Entities move cell to cell. Before stepping along one axis an entity
/// lines up with its cell's centre on the other axis, so its box never
/// reaches into a neighbouring row or column. The next cell is the greedy
/// one (larger axis first, vertical on ties) while that cell is free. Once
/// both greedy cells are obstructed the entity follows BFS routes until it
/// arrives.
fn travel(entity: &mut Entity, world: &WorldView<'_>, target: Cell) -> Travel {
    let grid = world.grid;
    let cell = world.cell_of(entity.position);
    let goals: Vec<Cell> = free_neighbors(world, target).collect();
    if goals.is_empty() {
        entity.detour = false;
        return Travel::Stuck;
    }

    if goals.contains(&cell) {
        entity.detour = false;
        return settle(entity, grid.point_center_of_cell(cell))
            .map_or(Travel::Arrived, Travel::Walking);
    }

    if !entity.detour {
        let greedy = goals
            .iter()
            .copied()
            .min_by_key(|goal| goal.manhattan(cell))
            .and_then(|goal| greedy_next(world, cell, goal));
        if let Some(next) = greedy {
            return Travel::Walking(step_into(entity, grid, cell, next));
        }
        tracing::trace!(entity = entity.id, %cell, %target, "Direct way blocked, routing around");
        entity.detour = true;
    }

    match find_cell_path_to_any(grid, cell, &goals, &HashSet::new()).get(1) {
        Some(&next) => Travel::Walking(step_into(entity, grid, cell, next)),
        None => {
            entity.detour = false;
            Travel::Stuck
        }
    }
}

/// Neighbour of `cell` one greedy step closer to `goal`, if it is free.
///
/// The axis with the larger cell distance goes first; ties go vertical.
fn greedy_next(world: &WorldView<'_>, cell: Cell, goal: Cell) -> Option<Cell> {
    let dcol = i64::from(goal.col) - i64::from(cell.col);
    let drow = i64::from(goal.row) - i64::from(cell.row);
    let axes = if drow.abs() >= dcol.abs() {
        [(false, drow), (true, dcol)]
    } else {
        [(true, dcol), (false, drow)]
    };

    axes.into_iter()
        .filter(|(_, d)| *d != 0)
        .find_map(|(horizontal, d)| {
            let (dc, dr) = Heading::from_axis_step(horizontal, d).delta();
            cell.offset(dc, dr).filter(|next| !world.is_obstructed(*next))
        })
}

/// Step from `cell` toward the adjacent cell `next`.
fn step_into(entity: &Entity, grid: &WorldGrid, cell: Cell, next: Cell) -> Step {
    let here = grid.point_center_of_cell(cell) - entity.position;
    let there = grid.point_center_of_cell(next) - entity.position;
    let horizontal = next.row == cell.row;

    let off_line = if horizontal { here.y } else { here.x };
    if off_line != Fixed::ZERO {
        return Step::along_axis(!horizontal, off_line, entity.speed);
    }
    let along = if horizontal { there.x } else { there.y };
    Step::along_axis(horizontal, along, entity.speed)
}

/// Step onto `center` within the current cell, larger axis first.
fn settle(entity: &Entity, center: Vec2Fixed) -> Option<Step> {
    let delta = center - entity.position;
    if delta == Vec2Fixed::ZERO {
        return None;
    }
    let horizontal = delta.x.abs() > delta.y.abs();
    let along = if horizontal { delta.x } else { delta.y };
    Some(Step::along_axis(horizontal, along, entity.speed))
}

/// Apply one manual input to an entity under manual control.
///
/// The caller is responsible for checking the control mode.
pub fn apply_manual_input(entity: &mut Entity, input: &ManualInput, world: &WorldView<'_>) {
    let before = entity.state;
    let cell = world.cell_of(entity.position);

    if let Some(heading) = input.heading {
        entity.heading = heading;
        if heading.is_moving() {
            entity.facing = heading;
            if matches!(entity.state, BehaviorState::PerformingAction(_)) {
                entity.state = BehaviorState::Wandering;
            }
        }
    }

    if input.toggle_action {
        match (entity.state, entity.harvester.as_ref()) {
            (BehaviorState::PerformingAction(_), _) => entity.state = BehaviorState::Wandering,
            (BehaviorState::Dead, _) | (_, None) => {}
            (_, Some(harvester)) => {
                if let Some(id) = adjacent_resource(world, cell, None, harvester) {
                    entity.state = BehaviorState::PerformingAction(id);
                    entity.heading = Heading::Idle;
                } else {
                    tracing::debug!(entity = entity.id, "Nothing to harvest here");
                }
            }
        }
    }

    if input.drop_off {
        let carrying = entity.harvester.is_some_and(|h| !h.is_empty());
        let at_home = world.grid.home_cell().is_some_and(|home| cell.is_adjacent4(home));
        if carrying && at_home && entity.state != BehaviorState::Dead {
            entity.state = BehaviorState::DroppingOff;
            entity.heading = Heading::Idle;
        }
    }

    if before != entity.state {
        tracing::debug!(
            entity = entity.id,
            from = before.name(),
            to = entity.state.name(),
            "Manual state change"
        );
    }
}
