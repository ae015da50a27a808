//! Economy and resource management.
//!
//! Villagers harvest from resource nodes (trees, berry bushes) into their
//! own cargo and deposit it at home, where it turns into stockpiled
//! commodities and score.
//!
//! Harvests and deposits are decided during the behavior phase as
//! [`EconomyIntent`]s and only applied by [`economy_system`] in the commit
//! phase, so every entity decides against the same tick-start snapshot.
//!
//! All calculations use integer math for deterministic simulation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::grid::Cell;

/// Identifier of a resource node. Assigned in row-major map order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Kind of harvestable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Yields wood.
    Tree,
    /// Yields food.
    BerryBush,
}

impl ResourceKind {
    /// Yield of a freshly placed node.
    #[must_use]
    pub const fn default_yield(self) -> u32 {
        match self {
            Self::Tree => 25,
            Self::BerryBush => 15,
        }
    }

    /// Commodity produced by harvesting this kind.
    #[must_use]
    pub const fn commodity(self) -> Commodity {
        match self {
            Self::Tree => Commodity::Wood,
            Self::BerryBush => Commodity::Food,
        }
    }

    /// Lowercase display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::BerryBush => "berry_bush",
        }
    }
}

/// Stockpiled goods tracked by the economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Commodity {
    /// From trees.
    Wood,
    /// From berry bushes.
    Food,
    /// No node produces gold yet; the counter is kept for the UI.
    Gold,
}

impl Commodity {
    /// Score awarded per deposited unit.
    #[must_use]
    pub const fn score_per_unit(self) -> Points {
        match self {
            Self::Wood => Points::from_tenths(12),
            Self::Food | Self::Gold => Points::from_tenths(10),
        }
    }
}

/// Score in exact tenths of a point.
///
/// Wood is worth 1.2 points per unit, which binary fixed-point cannot
/// represent exactly; tenths keep the running score exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Points(u64);

impl Points {
    /// Zero points.
    pub const ZERO: Self = Self(0);

    /// Create from a count of tenths.
    #[must_use]
    pub const fn from_tenths(tenths: u64) -> Self {
        Self(tenths)
    }

    /// Create from whole points.
    #[must_use]
    pub const fn from_whole(points: u64) -> Self {
        Self(points.saturating_mul(10))
    }

    /// Raw tenths.
    #[must_use]
    pub const fn tenths(self) -> u64 {
        self.0
    }

    /// Whole points, rounded down.
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / 10
    }

    /// `self * count`, saturating.
    #[must_use]
    pub const fn times(self, count: u32) -> Self {
        Self(self.0.saturating_mul(count as u64))
    }

    /// `self + other`, saturating.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// A resource node that harvesters can gather from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Node identifier.
    pub id: ResourceId,
    /// What grows here.
    pub kind: ResourceKind,
    /// Cell the node occupies.
    pub cell: Cell,
    /// Units left to harvest.
    pub remaining: u32,
    /// Units the node started with.
    pub max_yield: u32,
}

impl ResourceNode {
    /// Create a full node with the kind's default yield.
    #[must_use]
    pub const fn new(id: ResourceId, kind: ResourceKind, cell: Cell) -> Self {
        Self::with_yield(id, kind, cell, kind.default_yield())
    }

    /// Create a full node with an explicit yield.
    #[must_use]
    pub const fn with_yield(id: ResourceId, kind: ResourceKind, cell: Cell, max_yield: u32) -> Self {
        Self {
            id,
            kind,
            cell,
            remaining: max_yield,
            max_yield,
        }
    }

    /// Check if this node is depleted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.remaining == 0
    }

    /// Extract resources from this node.
    ///
    /// Returns the actual amount extracted (may be less than requested if node is nearly depleted).
    pub fn extract(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.remaining);
        self.remaining -= extracted;
        extracted
    }
}

/// What a villager is currently gathering.
///
/// A plain villager becomes a wood or forage gatherer when it first loads
/// goods, and turns plain again once it has dropped them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HarvestRole {
    /// Carrying nothing; may harvest any node kind.
    #[default]
    Plain,
    /// Carrying wood; only trees.
    WoodGatherer,
    /// Carrying food; only berry bushes.
    ForageGatherer,
}

impl HarvestRole {
    const fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Tree => Self::WoodGatherer,
            ResourceKind::BerryBush => Self::ForageGatherer,
        }
    }

    /// Commodity carried in this role.
    #[must_use]
    pub const fn commodity(self) -> Option<Commodity> {
        match self {
            Self::Plain => None,
            Self::WoodGatherer => Some(Commodity::Wood),
            Self::ForageGatherer => Some(Commodity::Food),
        }
    }
}

/// Harvesting capability attached to villagers at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvester {
    /// Current specialisation.
    pub role: HarvestRole,
    /// Units currently carried.
    pub carried: u32,
    /// Maximum units carried.
    pub capacity: u32,
    /// Simulated time of the last harvest attempt.
    pub last_harvest_ms: Option<u64>,
}

impl Harvester {
    /// Create an empty, plain harvester.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            role: HarvestRole::Plain,
            carried: 0,
            capacity,
            last_harvest_ms: None,
        }
    }

    /// Check if the harvester is full.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.carried >= self.capacity
    }

    /// Check if the harvester is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.carried == 0
    }

    /// Available cargo space.
    #[must_use]
    pub const fn available_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.carried)
    }

    /// Whether this harvester may gather from `kind` without mixing cargo.
    #[must_use]
    pub fn can_harvest(&self, kind: ResourceKind) -> bool {
        self.role == HarvestRole::Plain || self.role == HarvestRole::for_kind(kind)
    }

    /// Units to request from a node in one harvest action.
    #[must_use]
    pub fn harvest_amount(&self) -> u32 {
        1.min(self.available_capacity())
    }

    /// Load resources of `kind`, specialising a plain harvester.
    ///
    /// Returns actual amount loaded (may be less if capacity is reached).
    pub fn load(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        if !self.can_harvest(kind) {
            return 0;
        }
        let loaded = amount.min(self.available_capacity());
        if loaded > 0 {
            self.role = HarvestRole::for_kind(kind);
            self.carried += loaded;
        }
        loaded
    }

    /// Unload all resources, returning the harvester to the plain role.
    ///
    /// Returns the commodity and amount unloaded.
    pub fn unload(&mut self) -> Option<(Commodity, u32)> {
        let commodity = self.role.commodity()?;
        let amount = self.carried;
        self.carried = 0;
        self.role = HarvestRole::Plain;
        (amount > 0).then_some((commodity, amount))
    }
}

/// Global counters owned by the simulation root.
///
/// Counters never decrease except through [`ResourceEconomy::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceEconomy {
    /// Stockpiled wood.
    pub wood: u32,
    /// Stockpiled food.
    pub food: u32,
    /// Stockpiled gold.
    pub gold: u32,
    /// Total score.
    pub score: Points,
}

impl ResourceEconomy {
    /// Empty economy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            wood: 0,
            food: 0,
            gold: 0,
            score: Points::ZERO,
        }
    }

    /// Current stock of a commodity.
    #[must_use]
    pub const fn stock(&self, commodity: Commodity) -> u32 {
        match commodity {
            Commodity::Wood => self.wood,
            Commodity::Food => self.food,
            Commodity::Gold => self.gold,
        }
    }

    /// Add to a stockpile without awarding score.
    pub fn add(&mut self, commodity: Commodity, amount: u32) {
        let counter = match commodity {
            Commodity::Wood => &mut self.wood,
            Commodity::Food => &mut self.food,
            Commodity::Gold => &mut self.gold,
        };
        *counter = counter.saturating_add(amount);
    }

    /// Add points to the score.
    pub fn award(&mut self, points: Points) {
        self.score = self.score.saturating_add(points);
    }

    /// Stockpile a delivery and award its score. Returns the points awarded.
    pub fn deposit(&mut self, commodity: Commodity, amount: u32) -> Points {
        self.add(commodity, amount);
        let points = commodity.score_per_unit().times(amount);
        self.award(points);
        points
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// A shared-state mutation decided in the behavior phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EconomyIntent {
    /// Take `amount` units from `node` into the harvester's cargo.
    Harvest {
        /// The harvesting entity.
        entity: EntityId,
        /// The node harvested.
        node: ResourceId,
        /// Units requested.
        amount: u32,
    },
    /// Move all carried cargo into the economy.
    Deposit {
        /// The depositing entity.
        entity: EntityId,
    },
}

/// Events generated by the economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EconomyEvent {
    /// A harvester gathered resources from a node.
    ResourceGathered {
        /// The harvester entity.
        harvester: EntityId,
        /// The resource node.
        node: ResourceId,
        /// Amount gathered.
        amount: u32,
    },
    /// A harvester deposited resources at home.
    ResourceDeposited {
        /// The harvester entity.
        harvester: EntityId,
        /// What was delivered.
        commodity: Commodity,
        /// Amount deposited.
        amount: u32,
        /// Score awarded.
        points: Points,
    },
    /// A resource node has been fully depleted.
    NodeDepleted {
        /// The depleted node.
        node: ResourceId,
    },
    /// A scout found a node nobody had reported before.
    ResourceDiscovered {
        /// The scout entity.
        scout: EntityId,
        /// The node found.
        node: ResourceId,
        /// Score awarded.
        points: Points,
    },
}

/// Apply this tick's intents to nodes, cargo and the economy.
///
/// Intents are applied in order; when two harvesters race for the last unit
/// of a node the later one extracts nothing. Depleted nodes stay in `nodes`
/// so the caller can reap them.
pub fn economy_system(
    intents: &[EconomyIntent],
    harvesters: &mut BTreeMap<EntityId, &mut Harvester>,
    nodes: &mut BTreeMap<ResourceId, ResourceNode>,
    economy: &mut ResourceEconomy,
) -> Vec<EconomyEvent> {
    let mut events = Vec::new();

    for intent in intents {
        match *intent {
            EconomyIntent::Harvest {
                entity,
                node: node_id,
                amount,
            } => {
                let Some(harvester) = harvesters.get_mut(&entity) else {
                    continue;
                };
                let Some(node) = nodes.get_mut(&node_id) else {
                    continue;
                };
                if node.is_depleted() || !harvester.can_harvest(node.kind) {
                    continue;
                }

                let request = amount.min(harvester.available_capacity());
                let extracted = node.extract(request);
                let loaded = harvester.load(node.kind, extracted);

                if loaded > 0 {
                    events.push(EconomyEvent::ResourceGathered {
                        harvester: entity,
                        node: node_id,
                        amount: loaded,
                    });
                }
                if node.is_depleted() {
                    events.push(EconomyEvent::NodeDepleted { node: node_id });
                }
            }

            EconomyIntent::Deposit { entity } => {
                let Some(harvester) = harvesters.get_mut(&entity) else {
                    continue;
                };
                if let Some((commodity, amount)) = harvester.unload() {
                    let points = economy.deposit(commodity, amount);
                    tracing::info!(entity, ?commodity, amount, %points, "Goods deposited");
                    events.push(EconomyEvent::ResourceDeposited {
                        harvester: entity,
                        commodity,
                        amount,
                        points,
                    });
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(id: u32, remaining: u32) -> ResourceNode {
        ResourceNode::with_yield(ResourceId(id), ResourceKind::Tree, Cell::new(0, 0), remaining)
    }

    #[test]
    fn test_points_arithmetic() {
        let wood = Commodity::Wood.score_per_unit().times(10);
        assert_eq!(wood, Points::from_whole(12));
        assert_eq!(wood.to_string(), "12.0");

        let partial = Commodity::Wood.score_per_unit().times(3);
        assert_eq!(partial.tenths(), 36);
        assert_eq!(partial.whole(), 3);
        assert_eq!(partial.to_string(), "3.6");
    }

    #[test]
    fn test_resource_node_extraction() {
        let mut node = tree(1, 3);
        assert!(!node.is_depleted());

        assert_eq!(node.extract(1), 1);
        assert_eq!(node.remaining, 2);

        // Extract more than remaining
        assert_eq!(node.extract(10), 2);
        assert_eq!(node.remaining, 0);
        assert!(node.is_depleted());
        assert_eq!(node.extract(1), 0);
    }

    #[test]
    fn test_default_yields() {
        let bush = ResourceNode::new(ResourceId(0), ResourceKind::BerryBush, Cell::new(1, 1));
        assert_eq!(bush.remaining, 15);
        assert_eq!(bush.max_yield, 15);
        assert_eq!(ResourceKind::Tree.default_yield(), 25);
    }

    #[test]
    fn test_harvester_load_unload() {
        let mut harvester = Harvester::new(10);
        assert!(harvester.is_empty());
        assert_eq!(harvester.harvest_amount(), 1);

        assert_eq!(harvester.load(ResourceKind::Tree, 4), 4);
        assert_eq!(harvester.role, HarvestRole::WoodGatherer);
        assert!(!harvester.can_harvest(ResourceKind::BerryBush));
        assert_eq!(harvester.load(ResourceKind::BerryBush, 1), 0);

        // Try to overload
        assert_eq!(harvester.load(ResourceKind::Tree, 60), 6);
        assert!(harvester.is_full());
        assert_eq!(harvester.harvest_amount(), 0);

        assert_eq!(harvester.unload(), Some((Commodity::Wood, 10)));
        assert!(harvester.is_empty());
        assert_eq!(harvester.role, HarvestRole::Plain);
        assert_eq!(harvester.unload(), None);
    }

    #[test]
    fn test_economy_counters_never_decrease() {
        let mut economy = ResourceEconomy::new();
        economy.add(Commodity::Gold, 5);
        economy.add(Commodity::Gold, u32::MAX);
        assert_eq!(economy.gold, u32::MAX);

        let points = economy.deposit(Commodity::Food, 7);
        assert_eq!(points, Points::from_whole(7));
        assert_eq!(economy.stock(Commodity::Food), 7);

        economy.reset();
        assert_eq!(economy, ResourceEconomy::default());
    }

    #[test]
    fn test_economy_system_gathering() {
        let mut harvester = Harvester::new(10);
        let mut harvesters = BTreeMap::from([(7u64, &mut harvester)]);
        let mut nodes = BTreeMap::from([(ResourceId(1), tree(1, 25))]);
        let mut economy = ResourceEconomy::new();

        let intents = [EconomyIntent::Harvest {
            entity: 7,
            node: ResourceId(1),
            amount: 1,
        }];
        let events = economy_system(&intents, &mut harvesters, &mut nodes, &mut economy);

        assert_eq!(
            events,
            vec![EconomyEvent::ResourceGathered {
                harvester: 7,
                node: ResourceId(1),
                amount: 1
            }]
        );
        assert_eq!(harvesters[&7].carried, 1);
        assert_eq!(nodes[&ResourceId(1)].remaining, 24);
    }

    #[test]
    fn test_economy_system_last_unit_race() {
        let mut first = Harvester::new(10);
        let mut second = Harvester::new(10);
        let mut harvesters = BTreeMap::from([(1u64, &mut first), (2u64, &mut second)]);
        let mut nodes = BTreeMap::from([(ResourceId(0), tree(0, 1))]);
        let mut economy = ResourceEconomy::new();

        let intents = [
            EconomyIntent::Harvest {
                entity: 1,
                node: ResourceId(0),
                amount: 1,
            },
            EconomyIntent::Harvest {
                entity: 2,
                node: ResourceId(0),
                amount: 1,
            },
        ];
        let events = economy_system(&intents, &mut harvesters, &mut nodes, &mut economy);

        assert_eq!(harvesters[&1].carried, 1);
        assert_eq!(harvesters[&2].carried, 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, EconomyEvent::NodeDepleted { node: ResourceId(0) })));
        assert_eq!(nodes[&ResourceId(0)].remaining, 0);
    }

    #[test]
    fn test_economy_system_depositing() {
        let mut harvester = Harvester::new(10);
        harvester.load(ResourceKind::Tree, 10);
        let mut harvesters = BTreeMap::from([(3u64, &mut harvester)]);
        let mut nodes = BTreeMap::new();
        let mut economy = ResourceEconomy::new();

        let events = economy_system(
            &[EconomyIntent::Deposit { entity: 3 }],
            &mut harvesters,
            &mut nodes,
            &mut economy,
        );

        assert_eq!(
            events,
            vec![EconomyEvent::ResourceDeposited {
                harvester: 3,
                commodity: Commodity::Wood,
                amount: 10,
                points: Points::from_whole(12),
            }]
        );
        assert_eq!(harvesters[&3].carried, 0);
        assert_eq!(economy.wood, 10);
        assert_eq!(economy.score, Points::from_whole(12));
    }

    #[test]
    fn test_economy_system_empty_deposit_is_noop() {
        let mut harvester = Harvester::new(10);
        let mut harvesters = BTreeMap::from([(3u64, &mut harvester)]);
        let mut nodes = BTreeMap::new();
        let mut economy = ResourceEconomy::new();

        let events = economy_system(
            &[EconomyIntent::Deposit { entity: 3 }],
            &mut harvesters,
            &mut nodes,
            &mut economy,
        );
        assert!(events.is_empty());
        assert_eq!(economy, ResourceEconomy::new());
    }
}
