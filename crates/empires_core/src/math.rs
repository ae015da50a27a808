//! Fixed-point math utilities for deterministic simulation.
//!
//! Positions live in pixel space but are stored as fixed-point numbers so
//! that sub-tile movement is exact and identical across platforms.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector (pixel space, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from whole pixel coordinates.
    #[must_use]
    pub fn from_pixels(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Whole-pixel coordinates, rounded toward negative infinity.
    #[must_use]
    pub fn to_pixels(self) -> (i64, i64) {
        (
            self.x.floor().to_num::<i64>(),
            self.y.floor().to_num::<i64>(),
        )
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Axis-aligned bounding box in pixel space.
///
/// Intersection is strict: boxes that only share an edge do not collide,
/// so an entity standing on the tile next to a tree is not touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Top-left corner.
    pub min: Vec2Fixed,
    /// Bottom-right corner.
    pub max: Vec2Fixed,
}

impl Rect {
    /// Build a square box of side `size` centred on `center`.
    #[must_use]
    pub fn centered(center: Vec2Fixed, size: Fixed) -> Self {
        let half = size / Fixed::from_num(2);
        Self {
            min: Vec2Fixed::new(center.x - half, center.y - half),
            max: Vec2Fixed::new(center.x + half, center.y + half),
        }
    }

    /// Box covering `[0, width] x [0, height]`.
    #[must_use]
    pub fn from_size(width: Fixed, height: Fixed) -> Self {
        Self {
            min: Vec2Fixed::ZERO,
            max: Vec2Fixed::new(width, height),
        }
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> Fixed {
        self.max.x - self.min.x
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> Fixed {
        self.max.y - self.min.y
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        let two = Fixed::from_num(2);
        Vec2Fixed::new(
            self.min.x + self.width() / two,
            self.min.y + self.height() / two,
        )
    }

    /// Strict overlap test.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Whether this box lies fully inside `bounds`.
    #[must_use]
    pub fn is_within(&self, bounds: &Self) -> bool {
        self.min.x >= bounds.min.x
            && self.min.y >= bounds.min.y
            && self.max.x <= bounds.max.x
            && self.max.y <= bounds.max.y
    }

    /// Shift this box so it lies inside `bounds`.
    ///
    /// A box larger than `bounds` is aligned to the top-left corner.
    #[must_use]
    pub fn clamped_into(&self, bounds: &Self) -> Self {
        let shift_x = axis_shift(self.min.x, self.max.x, bounds.min.x, bounds.max.x);
        let shift_y = axis_shift(self.min.y, self.max.y, bounds.min.y, bounds.max.y);
        let shift = Vec2Fixed::new(shift_x, shift_y);
        Self {
            min: self.min + shift,
            max: self.max + shift,
        }
    }
}

fn axis_shift(min: Fixed, max: Fixed, lo: Fixed, hi: Fixed) -> Fixed {
    if min < lo {
        lo - min
    } else if max > hi {
        (hi - max).max(lo - min)
    } else {
        Fixed::ZERO
    }
}
