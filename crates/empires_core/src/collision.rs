//! Collision detection and resolution.
//!
//! Runs right after positions are integrated:
//! 1. World boundary: boxes leaving the map are pushed back inside.
//! 2. Entity pairs: overlapping entities bounce on their next decision.
//! 3. Obstacles: entities overlapping a live resource or home are put back
//!    where they started the tick.
//!
//! Boxes are `tile_size` squares and overlap is strict, so touching edges
//! never count as a collision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorState;
use crate::components::EntityId;
use crate::config::BoundaryPolicy;
use crate::economy::{ResourceId, ResourceNode};
use crate::grid::{Cell, TileKind, WorldGrid};
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::simulation::{Entity, EntityStorage};

/// Something an entity cannot walk through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Obstacle {
    /// A live resource node.
    Resource(ResourceId),
    /// A home tile.
    Home,
}

/// An entity ran into an obstacle this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleHit {
    /// The moving entity.
    pub entity: EntityId,
    /// What it hit.
    pub obstacle: Obstacle,
    /// Where the obstacle stands.
    pub cell: Cell,
}

/// Everything the collision phase found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// Entities pushed back inside the world.
    pub boundary_hits: Vec<EntityId>,
    /// Overlapping entity pairs, lower id first.
    pub entity_pairs: Vec<(EntityId, EntityId)>,
    /// Obstacle contacts; an entity may hit several at once.
    pub obstacle_hits: Vec<ObstacleHit>,
}

/// Bounding box of an entity standing at `position`.
#[must_use]
pub fn entity_rect(position: Vec2Fixed, tile: Fixed) -> Rect {
    Rect::centered(position, tile)
}

/// Push an entity back inside the world rectangle.
///
/// Returns `true` if the entity was outside. A hit flags a bounce and
/// costs `policy.health_penalty` health; an entity brought to zero is
/// marked dead.
pub fn clamp_to_world(entity: &mut Entity, grid: &WorldGrid, policy: &BoundaryPolicy) -> bool {
    let bounds = grid.world_bounds();
    let rect = entity_rect(entity.position, grid.tile_len());
    if rect.is_within(&bounds) {
        return false;
    }

    entity.position = rect.clamped_into(&bounds).center();
    entity.reverse_next_move = true;

    if policy.health_penalty > 0 {
        entity.health.apply_damage(policy.health_penalty);
        if entity.health.is_dead() {
            tracing::info!(entity = entity.id, "Entity died at the world edge");
            entity.state = BehaviorState::Dead;
        }
    }
    true
}

/// Every unordered pair of strictly overlapping boxes.
///
/// Pairs come out in input order; with sorted input the lower id is first.
#[must_use]
pub fn detect_entity_pairs(boxes: &[(EntityId, Rect)]) -> Vec<(EntityId, EntityId)> {
    let mut pairs = Vec::new();
    for (i, (a, rect_a)) in boxes.iter().enumerate() {
        for (b, rect_b) in &boxes[i + 1..] {
            if rect_a.intersects(rect_b) {
                pairs.push((*a, *b));
            }
        }
    }
    pairs
}

/// Boxes of every obstacle: live resources in id order, then every Home
/// tile in row-major order.
#[must_use]
pub fn obstacle_boxes(
    grid: &WorldGrid,
    resources: &BTreeMap<ResourceId, ResourceNode>,
) -> Vec<(Obstacle, Cell, Rect)> {
    let mut boxes: Vec<_> = resources
        .values()
        .map(|node| (Obstacle::Resource(node.id), node.cell, grid.cell_rect(node.cell)))
        .collect();
    boxes.extend(
        grid.cells()
            .filter(|cell| grid.tile_at(*cell) == Some(TileKind::Home))
            .map(|cell| (Obstacle::Home, cell, grid.cell_rect(cell))),
    );
    boxes
}

/// Run the whole collision phase over `ids`, in order.
///
/// Dead entities take no part in pair or obstacle checks.
pub fn collision_system(
    entities: &mut EntityStorage,
    ids: &[EntityId],
    grid: &WorldGrid,
    resources: &BTreeMap<ResourceId, ResourceNode>,
    policy: &BoundaryPolicy,
) -> CollisionReport {
    let mut report = CollisionReport::default();
    let tile = grid.tile_len();

    for &id in ids {
        if let Some(entity) = entities.get_mut(id) {
            if entity.state != BehaviorState::Dead && clamp_to_world(entity, grid, policy) {
                report.boundary_hits.push(id);
            }
        }
    }

    let boxes: Vec<(EntityId, Rect)> = ids
        .iter()
        .filter_map(|&id| entities.get(id))
        .filter(|e| e.state != BehaviorState::Dead)
        .map(|e| (e.id, entity_rect(e.position, tile)))
        .collect();

    report.entity_pairs = detect_entity_pairs(&boxes);
    for &(a, b) in &report.entity_pairs {
        for id in [a, b] {
            if let Some(entity) = entities.get_mut(id) {
                entity.reverse_next_move = true;
            }
        }
    }

    let obstacles = obstacle_boxes(grid, resources);
    for (id, rect) in boxes {
        let hits: Vec<ObstacleHit> = obstacles
            .iter()
            .filter(|(_, _, obstacle_rect)| rect.intersects(obstacle_rect))
            .map(|&(obstacle, cell, _)| ObstacleHit {
                entity: id,
                obstacle,
                cell,
            })
            .collect();
        if hits.is_empty() {
            continue;
        }
        if let Some(entity) = entities.get_mut(id) {
            if let Some(prev) = entity.prev_position {
                entity.position = prev;
            }
            entity.reverse_next_move = true;
        }
        report.obstacle_hits.extend(hits);
    }

    report
}
