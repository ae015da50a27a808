//! Entity component definitions.
//!
//! Components are pure data with little behavior. An [`Entity`](crate::simulation::Entity)
//! is a fixed set of these plus optional capabilities selected at spawn time.

use serde::{Deserialize, Serialize};

use crate::economy::ResourceId;
use crate::math::{Fixed, Vec2Fixed};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Maximum health of every mobile entity.
pub const MAX_HEALTH: u32 = 100;

/// What kind of unit an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Harvests resources and carries them home.
    Villager,
    /// Explores and reports resource nodes; never harvests.
    Scout,
}

impl EntityKind {
    /// Lowercase display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Villager => "villager",
            Self::Scout => "scout",
        }
    }
}

/// Movement intention on the 4-connected grid.
///
/// Declaration order of the cardinal variants is the tie-break order used
/// throughout the simulation (up, down, left, right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Heading {
    /// Negative y.
    Up,
    /// Positive y.
    Down,
    /// Negative x.
    Left,
    /// Positive x.
    Right,
    /// Standing still.
    #[default]
    Idle,
}

impl Heading {
    /// The four movement directions in tie-break order.
    pub const CARDINALS: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit direction vector in pixel space.
    #[must_use]
    pub fn unit_vector(self) -> Vec2Fixed {
        let (dx, dy) = self.delta();
        Vec2Fixed::new(Fixed::from_num(dx), Fixed::from_num(dy))
    }

    /// `(dx, dy)` step, which is also `(dcol, drow)` on the grid.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Idle => (0, 0),
        }
    }

    /// Heading after a collision bounce.
    ///
    /// The x axis is checked before the y axis; idle stays idle.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::Idle => Self::Idle,
        }
    }

    /// Whether this heading moves the entity.
    #[must_use]
    pub const fn is_moving(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Heading for a signed step along one axis, `Idle` for zero.
    #[must_use]
    pub fn from_axis_step(horizontal: bool, sign: i64) -> Self {
        match (horizontal, sign.signum()) {
            (true, 1) => Self::Right,
            (true, -1) => Self::Left,
            (false, 1) => Self::Down,
            (false, -1) => Self::Up,
            _ => Self::Idle,
        }
    }

    /// Lowercase display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Idle => "idle",
        }
    }
}

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(MAX_HEALTH)
    }
}

/// Who decides where an entity goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityControl {
    /// Random wandering on a reroll timer.
    #[default]
    Autonomous,
    /// Directed by the target selector.
    Agent,
    /// Directed by [`ManualInput`].
    Manual,
}

/// One tick of manual control for an entity under [`EntityControl::Manual`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManualInput {
    /// New movement intention; `None` keeps the current one.
    pub heading: Option<Heading>,
    /// Start harvesting the adjacent resource, or stop if already harvesting.
    pub toggle_action: bool,
    /// Drop off carried goods when next to home.
    pub drop_off: bool,
}

impl ManualInput {
    /// Input that only changes heading.
    #[must_use]
    pub const fn steer(heading: Heading) -> Self {
        Self {
            heading: Some(heading),
            toggle_action: false,
            drop_off: false,
        }
    }
}

/// Scout capability: the resource nodes this scout has bumped into.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoutLog {
    discovered: Vec<ResourceId>,
}

impl ScoutLog {
    /// Record a discovery. Returns `false` if already known.
    pub fn record(&mut self, id: ResourceId) -> bool {
        if self.discovered.contains(&id) {
            return false;
        }
        self.discovered.push(id);
        true
    }

    /// Discoveries in the order they happened.
    #[must_use]
    pub fn discovered(&self) -> &[ResourceId] {
        &self.discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_reversal() {
        assert_eq!(Heading::Right.reversed(), Heading::Left);
        assert_eq!(Heading::Left.reversed(), Heading::Right);
        assert_eq!(Heading::Down.reversed(), Heading::Up);
        assert_eq!(Heading::Up.reversed(), Heading::Down);
        assert_eq!(Heading::Idle.reversed(), Heading::Idle);
    }

    #[test]
    fn test_heading_vectors() {
        assert_eq!(Heading::Right.unit_vector(), Vec2Fixed::from_pixels(1, 0));
        assert_eq!(Heading::Up.unit_vector(), Vec2Fixed::from_pixels(0, -1));
        assert_eq!(Heading::Idle.unit_vector(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_heading_from_axis_step() {
        assert_eq!(Heading::from_axis_step(true, 7), Heading::Right);
        assert_eq!(Heading::from_axis_step(true, -1), Heading::Left);
        assert_eq!(Heading::from_axis_step(false, 3), Heading::Down);
        assert_eq!(Heading::from_axis_step(false, -9), Heading::Up);
        assert_eq!(Heading::from_axis_step(false, 0), Heading::Idle);
    }

    #[test]
    fn test_health_saturates() {
        let mut health = Health::default();
        assert_eq!(health.apply_damage(30), 30);
        assert_eq!(health.current, 70);
        assert_eq!(health.apply_damage(500), 70);
        assert!(health.is_dead());
    }

    #[test]
    fn test_scout_log_deduplicates() {
        let mut log = ScoutLog::default();
        assert!(log.record(ResourceId(4)));
        assert!(log.record(ResourceId(1)));
        assert!(!log.record(ResourceId(4)));
        assert_eq!(log.discovered(), &[ResourceId(4), ResourceId(1)]);
    }
}
