//! Target selection policy.
//!
//! The agent adopts one villager at a time and keeps it busy: it picks a
//! resource, sends the villager after it, and when that resource runs out
//! switches to the nearest remaining one. Only resources with a free
//! neighbour the villager can walk to are considered. All random picks
//! draw from the simulation's seeded generator.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{free_neighbors, BehaviorState, WorldView};
use crate::components::{EntityControl, EntityId};
use crate::economy::{ResourceId, ResourceNode};
use crate::grid::WorldGrid;
use crate::math::Vec2Fixed;
use crate::pathfinding::{find_cell_path_to_any, reachable_cells};
use crate::simulation::{Entity, EntityStorage, Simulation};

/// What the agent did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Took control of a villager.
    Adopted(EntityId),
    /// Chose a new resource to pursue.
    Targeted(ResourceId),
    /// No resource is left within reach; the villager was handed back.
    Released(EntityId),
}

/// The controlling decision policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSelector {
    controlled: Option<EntityId>,
    target: Option<ResourceId>,
}

impl TargetSelector {
    /// Selector with nothing chosen yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            controlled: None,
            target: None,
        }
    }

    /// The villager under control.
    #[must_use]
    pub const fn controlled(&self) -> Option<EntityId> {
        self.controlled
    }

    /// The resource being pursued.
    #[must_use]
    pub const fn target(&self) -> Option<ResourceId> {
        self.target
    }

    /// Forget both the villager and the target.
    pub fn clear(&mut self) {
        self.controlled = None;
        self.target = None;
    }

    /// Revalidate choices and direct the controlled villager.
    ///
    /// Runs once per tick before entity decisions.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        entities: &mut EntityStorage,
        grid: &WorldGrid,
        resources: &BTreeMap<ResourceId, ResourceNode>,
        rng: &mut R,
    ) -> Vec<AgentEvent> {
        let mut events = Vec::new();

        if !self.controlled.is_some_and(|id| entities.get(id).is_some_and(is_steerable)) {
            self.clear();
            let candidates: Vec<EntityId> = entities
                .sorted_ids()
                .into_iter()
                .filter(|id| entities.get(*id).is_some_and(is_adoptable))
                .collect();
            if candidates.is_empty() {
                return events;
            }
            let picked = candidates[rng.gen_range(0..candidates.len())];
            tracing::debug!(entity = picked, "Agent adopted villager");
            self.controlled = Some(picked);
            events.push(AgentEvent::Adopted(picked));
        }
        let Some(controlled) = self.controlled else {
            return events;
        };
        let Some(entity) = entities.get_mut(controlled) else {
            return events;
        };

        let world = WorldView::new(grid, resources);
        let here = grid.clamped_cell_of_point(entity.position);
        let reach = reachable_cells(grid, here, &HashSet::new());
        let within_reach: Vec<&ResourceNode> = resources
            .values()
            .filter(|node| free_neighbors(&world, node.cell).any(|c| reach.contains(&c)))
            .collect();

        if within_reach.is_empty() {
            self.target = None;
            self.controlled = None;
            entity.control = EntityControl::Autonomous;
            if matches!(entity.state, BehaviorState::SeekingTarget(_)) {
                entity.state = BehaviorState::Wandering;
            }
            tracing::debug!(
                entity = controlled,
                remaining = resources.len(),
                "No resource within reach, releasing villager"
            );
            events.push(AgentEvent::Released(controlled));
            return events;
        }

        let stale = self
            .target
            .is_some_and(|t| !within_reach.iter().any(|node| node.id == t));
        if self.target.is_none() || stale {
            let next = if stale {
                within_reach
                    .iter()
                    .min_by_key(|node| (node.cell.manhattan(here), node.id))
                    .map(|node| node.id)
            } else {
                within_reach
                    .get(rng.gen_range(0..within_reach.len()))
                    .map(|node| node.id)
            };
            self.target = next;
            if let Some(target) = next {
                tracing::debug!(entity = controlled, %target, "Agent picked target");
                events.push(AgentEvent::Targeted(target));
            }
        }

        if let Some(target) = self.target {
            let redirect = match entity.state {
                BehaviorState::Wandering => true,
                BehaviorState::SeekingTarget(current) => current != target,
                _ => false,
            };
            entity.control = EntityControl::Agent;
            if redirect {
                entity.state = BehaviorState::SeekingTarget(target);
            }
        }

        events
    }

    /// BFS path from the controlled villager to where it will stand to harvest.
    ///
    /// Empty when there is no villager, no target, or no route.
    #[must_use]
    pub fn planned_path(&self, sim: &Simulation) -> Vec<Vec2Fixed> {
        let (Some(id), Some(target)) = (self.controlled, self.target) else {
            return Vec::new();
        };
        let (Some(entity), Some(node)) = (sim.entity(id), sim.resources().get(&target)) else {
            return Vec::new();
        };

        let grid = sim.grid();
        let world = WorldView::new(grid, sim.resources());
        let from = grid.clamped_cell_of_point(entity.position);
        let goals: Vec<_> = free_neighbors(&world, node.cell).collect();

        find_cell_path_to_any(grid, from, &goals, &HashSet::new())
            .into_iter()
            .map(|cell| grid.point_center_of_cell(cell))
            .collect()
    }
}

fn is_adoptable(entity: &Entity) -> bool {
    entity.harvester.is_some()
        && entity.control == EntityControl::Autonomous
        && entity.state != BehaviorState::Dead
        && !entity.health.is_dead()
}

fn is_steerable(entity: &Entity) -> bool {
    entity.harvester.is_some()
        && entity.control == EntityControl::Agent
        && entity.state != BehaviorState::Dead
        && !entity.health.is_dead()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::EntityKind;
    use crate::config::SimConfig;
    use crate::economy::ResourceKind;
    use crate::grid::{Cell, TileKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(trees: &[Cell]) -> (WorldGrid, BTreeMap<ResourceId, ResourceNode>) {
        let grid = WorldGrid::open(8, 8, 32).unwrap();
        let resources = trees
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let id = ResourceId(i as u32);
                (id, ResourceNode::new(id, ResourceKind::Tree, *cell))
            })
            .collect();
        (grid, resources)
    }

    fn villager_at(storage: &mut EntityStorage, grid: &WorldGrid, cell: Cell) -> EntityId {
        storage.insert(Entity::new(
            EntityKind::Villager,
            grid.point_center_of_cell(cell),
            &SimConfig::default(),
        ))
    }

    #[test]
    fn test_adopts_villager_and_directs_it() {
        let (grid, resources) = setup(&[Cell::new(4, 4)]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut agent = TargetSelector::new();

        let events = agent.update(&mut storage, &grid, &resources, &mut rng);

        assert_eq!(
            events,
            vec![AgentEvent::Adopted(id), AgentEvent::Targeted(ResourceId(0))]
        );
        let entity = storage.get(id).unwrap();
        assert_eq!(entity.control, EntityControl::Agent);
        assert_eq!(entity.state, BehaviorState::SeekingTarget(ResourceId(0)));
    }

    #[test]
    fn test_scouts_are_never_adopted() {
        let (grid, resources) = setup(&[Cell::new(4, 4)]);
        let mut storage = EntityStorage::new();
        storage.insert(Entity::new(
            EntityKind::Scout,
            grid.point_center_of_cell(Cell::new(0, 0)),
            &SimConfig::default(),
        ));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut agent = TargetSelector::new();

        assert!(agent.update(&mut storage, &grid, &resources, &mut rng).is_empty());
        assert_eq!(agent.controlled(), None);
    }

    #[test]
    fn test_consumed_target_switches_to_nearest() {
        let (grid, mut resources) = setup(&[Cell::new(7, 7), Cell::new(1, 2), Cell::new(2, 1)]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut agent = TargetSelector::new();
        agent.update(&mut storage, &grid, &resources, &mut rng);

        let first = agent.target().unwrap();
        resources.remove(&first);
        agent.update(&mut storage, &grid, &resources, &mut rng);

        // Both (1, 2) and (2, 1) are three steps away; the lower id wins.
        let expected = if first == ResourceId(1) {
            ResourceId(2)
        } else {
            ResourceId(1)
        };
        assert_eq!(agent.target(), Some(expected));
        assert_eq!(
            storage.get(id).map(|e| e.state),
            Some(BehaviorState::SeekingTarget(expected))
        );
    }

    #[test]
    fn test_empty_resources_release_villager() {
        let (grid, resources) = setup(&[]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(3, 3));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut agent = TargetSelector::new();

        let events = agent.update(&mut storage, &grid, &resources, &mut rng);

        assert_eq!(agent.target(), None);
        assert!(events.contains(&AgentEvent::Released(id)));
        let entity = storage.get(id).unwrap();
        assert_eq!(entity.state, BehaviorState::Wandering);
        assert_eq!(entity.control, EntityControl::Autonomous);
    }

    #[test]
    fn test_busy_villager_is_not_redirected() {
        let (grid, resources) = setup(&[Cell::new(4, 4)]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut agent = TargetSelector::new();
        agent.update(&mut storage, &grid, &resources, &mut rng);

        if let Some(entity) = storage.get_mut(id) {
            entity.state = BehaviorState::ReturningHome;
        }
        agent.update(&mut storage, &grid, &resources, &mut rng);
        assert_eq!(
            storage.get(id).map(|e| e.state),
            Some(BehaviorState::ReturningHome)
        );
    }

    #[test]
    fn test_manual_takeover_drops_villager() {
        let (grid, resources) = setup(&[Cell::new(4, 4)]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut agent = TargetSelector::new();
        agent.update(&mut storage, &grid, &resources, &mut rng);

        if let Some(entity) = storage.get_mut(id) {
            entity.control = EntityControl::Manual;
        }
        agent.update(&mut storage, &grid, &resources, &mut rng);
        assert_eq!(agent.controlled(), None);
        assert_eq!(storage.get(id).map(|e| e.control), Some(EntityControl::Manual));
    }

    fn walled_grove() -> (WorldGrid, BTreeMap<ResourceId, ResourceNode>) {
        // Tree 0 at (1, 1) is boxed in by trees 1..=4.
        let cells = [
            Cell::new(1, 1),
            Cell::new(0, 1),
            Cell::new(2, 1),
            Cell::new(1, 0),
            Cell::new(1, 2),
        ];
        let mut tiles = vec![vec![TileKind::Open; 6]; 4];
        for cell in &cells {
            tiles[cell.row as usize][cell.col as usize] = TileKind::Obstacle(ResourceKind::Tree);
        }
        let grid = WorldGrid::from_rows(32, tiles).unwrap();
        let resources = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let id = ResourceId(i as u32);
                (id, ResourceNode::new(id, ResourceKind::Tree, *cell))
            })
            .collect();
        (grid, resources)
    }

    #[test]
    fn test_walled_in_resource_is_never_picked() {
        let (grid, resources) = walled_grove();
        for seed in 0..20 {
            let mut storage = EntityStorage::new();
            villager_at(&mut storage, &grid, Cell::new(3, 5));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut agent = TargetSelector::new();
            agent.update(&mut storage, &grid, &resources, &mut rng);
            assert!(agent.target().is_some());
            assert_ne!(agent.target(), Some(ResourceId(0)));
        }
    }

    #[test]
    fn test_unreachable_target_is_replaced() {
        let (grid, resources) = walled_grove();
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(3, 5));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut agent = TargetSelector::new();
        agent.update(&mut storage, &grid, &resources, &mut rng);

        agent.target = Some(ResourceId(0));
        let events = agent.update(&mut storage, &grid, &resources, &mut rng);

        // (2, 1) and (1, 2) are both five steps away; the lower id wins.
        assert_eq!(events, vec![AgentEvent::Targeted(ResourceId(2))]);
        assert_eq!(
            storage.get(id).map(|e| e.state),
            Some(BehaviorState::SeekingTarget(ResourceId(2)))
        );
    }

    #[test]
    fn test_villager_fenced_off_from_every_resource_is_released() {
        let t = TileKind::Obstacle(ResourceKind::Tree);
        let (o, h) = (TileKind::Open, TileKind::Home);
        // The villager's corner is closed off by home tiles.
        let grid = WorldGrid::from_rows(32, vec![vec![o, h, o, t], vec![h, o, o, o]]).unwrap();
        let resources = BTreeMap::from([(
            ResourceId(0),
            ResourceNode::new(ResourceId(0), ResourceKind::Tree, Cell::new(0, 3)),
        )]);
        let mut storage = EntityStorage::new();
        let id = villager_at(&mut storage, &grid, Cell::new(0, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut agent = TargetSelector::new();

        let events = agent.update(&mut storage, &grid, &resources, &mut rng);
        assert_eq!(events, vec![AgentEvent::Adopted(id), AgentEvent::Released(id)]);
        assert_eq!(agent.target(), None);
        assert_eq!(storage.get(id).map(|e| e.control), Some(EntityControl::Autonomous));
    }
}
