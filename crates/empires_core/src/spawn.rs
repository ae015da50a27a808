//! Where new entities appear.

use rand::seq::index::sample;
use rand::Rng;

use crate::components::EntityKind;
use crate::grid::{Cell, WorldGrid};
use crate::math::Vec2Fixed;

/// Kinds placed by a population reset, in placement order.
pub const RESET_POPULATION: [EntityKind; 3] =
    [EntityKind::Villager, EntityKind::Scout, EntityKind::Villager];

/// Spawn point for a single new entity.
///
/// The cell immediately left of home when there is one; otherwise a random
/// cell, preferring walkable ones. `None` only for an empty grid.
pub fn spawn_position<R: Rng + ?Sized>(grid: &WorldGrid, rng: &mut R) -> Option<(Vec2Fixed, Cell)> {
    let cell = match grid.home_cell() {
        Some(home) if home.col > 0 => Cell::new(home.row, home.col - 1),
        _ => random_cells(grid, rng, 1).into_iter().next()?,
    };
    Some((grid.point_center_of_cell(cell), cell))
}

/// Up to `count` distinct random cells.
///
/// Walkable cells are drawn first; blocked cells only fill the remainder
/// when the map has too few walkable ones.
pub fn random_cells<R: Rng + ?Sized>(grid: &WorldGrid, rng: &mut R, count: usize) -> Vec<Cell> {
    let (open, blocked): (Vec<Cell>, Vec<Cell>) = grid.cells().partition(|c| !grid.is_blocked(*c));

    let from_open = count.min(open.len());
    let mut picked: Vec<Cell> = sample(rng, open.len(), from_open)
        .into_iter()
        .map(|i| open[i])
        .collect();

    let from_blocked = (count - from_open).min(blocked.len());
    if from_blocked > 0 {
        tracing::warn!(from_blocked, "Not enough open cells, spawning on obstacles");
        picked.extend(
            sample(rng, blocked.len(), from_blocked)
                .into_iter()
                .map(|i| blocked[i]),
        );
    }
    picked
}
