//! Grid-based pathfinding using breadth-first search.
//!
//! Every step costs the same, so BFS finds a shortest 4-connected path.
//! Neighbours are expanded in up, down, left, right order, which makes the
//! chosen path identical across runs and platforms.
//!
//! Movement walks greedily and only asks for a route once the direct way is
//! blocked. The agent uses [`reachable_cells`] to skip walled-in nodes.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::grid::{Cell, WorldGrid};
use crate::math::Vec2Fixed;

/// Shortest cell path from `start` to `goal`, both inclusive.
///
/// Blocked cells are the grid's obstacles and Home plus `extra_obstacles`.
/// Returns an empty path when either end is out of bounds, the goal is
/// blocked, or no path exists. The start cell itself may be blocked.
#[must_use]
pub fn find_cell_path(
    grid: &WorldGrid,
    start: Cell,
    goal: Cell,
    extra_obstacles: &HashSet<Cell>,
) -> Vec<Cell> {
    if !grid.in_bounds(goal) {
        return Vec::new();
    }
    find_cell_path_to_any(grid, start, &[goal], extra_obstacles)
}

/// Shortest cell path from `start` to the closest of `goals`.
///
/// Blocked and out-of-bounds goals are ignored. Among equally close goals
/// the one reached first in expansion order wins. Returns an empty path
/// when no goal is reachable.
#[must_use]
pub fn find_cell_path_to_any(
    grid: &WorldGrid,
    start: Cell,
    goals: &[Cell],
    extra_obstacles: &HashSet<Cell>,
) -> Vec<Cell> {
    if !grid.in_bounds(start) {
        return Vec::new();
    }
    let blocked = |cell: Cell| grid.is_blocked(cell) || extra_obstacles.contains(&cell);
    let goals: HashSet<Cell> = goals
        .iter()
        .copied()
        .filter(|goal| grid.in_bounds(*goal) && !blocked(*goal))
        .collect();
    if goals.is_empty() {
        return Vec::new();
    }

    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut visited: HashSet<Cell> = HashSet::from([start]);
    let mut frontier = VecDeque::from([start]);

    while let Some(current) = frontier.pop_front() {
        if goals.contains(&current) {
            return reconstruct_path(&came_from, start, current);
        }

        for next in grid.neighbors4(current) {
            if blocked(next) || !visited.insert(next) {
                continue;
            }
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }

    Vec::new()
}

/// Every unblocked cell connected to `start`, plus `start` itself.
#[must_use]
pub fn reachable_cells(
    grid: &WorldGrid,
    start: Cell,
    extra_obstacles: &HashSet<Cell>,
) -> HashSet<Cell> {
    if !grid.in_bounds(start) {
        return HashSet::new();
    }
    let mut visited = HashSet::from([start]);
    let mut frontier = VecDeque::from([start]);
    while let Some(current) = frontier.pop_front() {
        for next in grid.neighbors4(current) {
            if grid.is_blocked(next) || extra_obstacles.contains(&next) {
                continue;
            }
            if visited.insert(next) {
                frontier.push_back(next);
            }
        }
    }
    visited
}

/// Shortest path between two pixel positions, as cell centres.
///
/// Same failure rules as [`find_cell_path`]; a point outside the world
/// rectangle counts as out of bounds.
#[must_use]
pub fn find_path(
    grid: &WorldGrid,
    start: Vec2Fixed,
    goal: Vec2Fixed,
    extra_obstacles: &HashSet<Cell>,
) -> Vec<Vec2Fixed> {
    let (Some(start_cell), Some(goal_cell)) = (grid.cell_of_point(start), grid.cell_of_point(goal))
    else {
        return Vec::new();
    };

    find_cell_path(grid, start_cell, goal_cell, extra_obstacles)
        .into_iter()
        .map(|cell| grid.point_center_of_cell(cell))
        .collect()
}

/// Reconstruct path from came_from map.
fn reconstruct_path(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;

    while current != start {
        let Some(&prev) = came_from.get(&current) else {
            break;
        };
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}
