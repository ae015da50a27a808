//! Static tile map.
//!
//! The grid is built once from a [`MapDefinition`] and never changes.
//! Resource nodes start on its obstacle tiles but live in the simulation;
//! the grid only remembers what each tile was labelled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::economy::ResourceKind;
use crate::error::{GameError, Result};
use crate::math::{Fixed, Rect, Vec2Fixed};

/// Integer grid coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Cell {
    /// Row index, grows downward.
    pub row: u32,
    /// Column index, grows rightward.
    pub col: u32,
}

impl Cell {
    /// Create a cell.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Manhattan distance in cells.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Whether `other` shares an edge with this cell.
    #[must_use]
    pub const fn is_adjacent4(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }

    /// Cell one step away by `(dcol, drow)`, if it does not underflow.
    #[must_use]
    pub fn offset(self, dcol: i32, drow: i32) -> Option<Self> {
        let row = self.row.checked_add_signed(drow)?;
        let col = self.col.checked_add_signed(dcol)?;
        Some(Self { row, col })
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Classification of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    /// Walkable ground.
    #[default]
    Open,
    /// A resource node starts here; impassable while it lives.
    Obstacle(ResourceKind),
    /// The drop-off point.
    Home,
}

impl TileKind {
    /// Decode a map label. Returns `None` for unknown labels.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "grass" | "open" => Some(Self::Open),
            "tree" => Some(Self::Obstacle(ResourceKind::Tree)),
            "berry_bush" | "bush" => Some(Self::Obstacle(ResourceKind::BerryBush)),
            "home" => Some(Self::Home),
            _ => None,
        }
    }

    /// Canonical label, the inverse of [`TileKind::from_label`].
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "grass",
            Self::Obstacle(kind) => kind.label(),
            Self::Home => "home",
        }
    }
}

/// Serialized map description, as found in RON map files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapDefinition {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// World width in pixels.
    pub width: u32,
    /// World height in pixels.
    pub height: u32,
    /// Side of one square tile in pixels.
    pub tile_size: u32,
    /// Tile labels, row by row.
    #[serde(default)]
    pub world_map: Option<Vec<Vec<String>>>,
}

/// Immutable tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldGrid {
    rows: u32,
    cols: u32,
    tile_size: u32,
    /// Tiles in row-major order.
    tiles: Vec<TileKind>,
    home: Option<Cell>,
}

impl WorldGrid {
    /// All-open grid.
    pub fn open(rows: u32, cols: u32, tile_size: u32) -> Result<Self> {
        let count = rows as usize * cols as usize;
        Self::from_tiles(rows, cols, tile_size, vec![TileKind::Open; count])
    }

    /// Build from a rectangular matrix of tiles.
    ///
    /// Fails when rows differ in length.
    pub fn from_rows(tile_size: u32, rows: Vec<Vec<TileKind>>) -> Result<Self> {
        let row_count = rows.len() as u32;
        let col_count = rows.first().map_or(0, |r| r.len() as u32);
        if rows.iter().any(|r| r.len() as u32 != col_count) {
            return Err(GameError::InvalidMap("ragged tile matrix".into()));
        }
        let tiles = rows.into_iter().flatten().collect();
        Self::from_tiles(row_count, col_count, tile_size, tiles)
    }

    fn from_tiles(rows: u32, cols: u32, tile_size: u32, tiles: Vec<TileKind>) -> Result<Self> {
        if tile_size == 0 {
            return Err(GameError::InvalidMap("tile_size must be positive".into()));
        }
        debug_assert_eq!(tiles.len(), rows as usize * cols as usize);

        let mut home = None;
        for (index, tile) in tiles.iter().enumerate() {
            if *tile != TileKind::Home {
                continue;
            }
            let cell = Cell::new(index as u32 / cols, index as u32 % cols);
            match home {
                None => home = Some(cell),
                Some(first) => {
                    tracing::warn!(%cell, home = %first, "Extra home tile ignored for drop-off");
                }
            }
        }

        Ok(Self {
            rows,
            cols,
            tile_size,
            tiles,
            home,
        })
    }

    /// Decode a map definition.
    ///
    /// An absent, empty or ragged label matrix falls back to an all-open grid
    /// of `height / tile_size` rows by `width / tile_size` columns.
    pub fn from_definition(def: &MapDefinition) -> Result<Self> {
        if def.tile_size == 0 {
            return Err(GameError::InvalidMap(format!(
                "map '{}' has tile_size 0",
                def.name
            )));
        }

        let matrix = match &def.world_map {
            Some(rows) if is_rectangular(rows) => Some(rows),
            Some(_) => {
                tracing::warn!(map = %def.name, "Map matrix is empty or ragged, using open grid");
                None
            }
            None => {
                tracing::debug!(map = %def.name, "Map has no matrix, using open grid");
                None
            }
        };

        let Some(labels) = matrix else {
            return Self::open(def.height / def.tile_size, def.width / def.tile_size, def.tile_size);
        };

        let tiles = labels
            .iter()
            .enumerate()
            .map(|(row, line)| {
                line.iter()
                    .enumerate()
                    .map(|(col, label)| {
                        TileKind::from_label(label).unwrap_or_else(|| {
                            tracing::warn!(row, col, label = %label, "Unknown tile label, treating as open");
                            TileKind::Open
                        })
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(def.tile_size, tiles)
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Tile side in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tile side as a fixed-point length.
    #[must_use]
    pub fn tile_len(&self) -> Fixed {
        Fixed::from_num(self.tile_size)
    }

    /// Check if a cell is within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Tile at `cell`, `None` when out of bounds.
    #[must_use]
    pub fn tile_at(&self, cell: Cell) -> Option<TileKind> {
        if !self.in_bounds(cell) {
            return None;
        }
        let index = cell.row as usize * self.cols as usize + cell.col as usize;
        self.tiles.get(index).copied()
    }

    /// The world rectangle `[0, cols*tile] x [0, rows*tile]`.
    #[must_use]
    pub fn world_bounds(&self) -> Rect {
        let tile = i64::from(self.tile_size);
        Rect::from_size(
            Fixed::from_num(i64::from(self.cols) * tile),
            Fixed::from_num(i64::from(self.rows) * tile),
        )
    }

    /// Cell containing a pixel point, `None` outside the world rectangle.
    #[must_use]
    pub fn cell_of_point(&self, point: Vec2Fixed) -> Option<Cell> {
        let (x, y) = point.to_pixels();
        if x < 0 || y < 0 {
            return None;
        }
        let tile = i64::from(self.tile_size);
        let col = x / tile;
        let row = y / tile;
        if col < i64::from(self.cols) && row < i64::from(self.rows) {
            Some(Cell::new(row as u32, col as u32))
        } else {
            None
        }
    }

    /// Cell containing a pixel point, clamped into the grid.
    ///
    /// A point on the far edge of the world maps into the last row/column.
    #[must_use]
    pub fn clamped_cell_of_point(&self, point: Vec2Fixed) -> Cell {
        let (x, y) = point.to_pixels();
        let tile = i64::from(self.tile_size);
        let clamp = |v: i64, count: u32| (v / tile).clamp(0, i64::from(count.saturating_sub(1))) as u32;
        Cell::new(clamp(y.max(0), self.rows), clamp(x.max(0), self.cols))
    }

    /// Pixel centre of a cell: `col * tile + tile / 2` (integer halving).
    #[must_use]
    pub fn point_center_of_cell(&self, cell: Cell) -> Vec2Fixed {
        let tile = i64::from(self.tile_size);
        let half = tile / 2;
        Vec2Fixed::new(
            Fixed::from_num(i64::from(cell.col) * tile + half),
            Fixed::from_num(i64::from(cell.row) * tile + half),
        )
    }

    /// Bounding box of a cell.
    #[must_use]
    pub fn cell_rect(&self, cell: Cell) -> Rect {
        let tile = i64::from(self.tile_size);
        let min = Vec2Fixed::new(
            Fixed::from_num(i64::from(cell.col) * tile),
            Fixed::from_num(i64::from(cell.row) * tile),
        );
        Rect {
            min,
            max: min + Vec2Fixed::new(self.tile_len(), self.tile_len()),
        }
    }

    /// Whether the tile was labelled as a resource.
    #[must_use]
    pub fn is_obstacle(&self, cell: Cell) -> bool {
        matches!(self.tile_at(cell), Some(TileKind::Obstacle(_)))
    }

    /// Obstacle or Home; impassable for path planning.
    #[must_use]
    pub fn is_blocked(&self, cell: Cell) -> bool {
        matches!(
            self.tile_at(cell),
            Some(TileKind::Obstacle(_) | TileKind::Home)
        )
    }

    /// The drop-off cell, if the map has one.
    #[must_use]
    pub const fn home_cell(&self) -> Option<Cell> {
        self.home
    }

    /// In-bounds 4-neighbours in up, down, left, right order.
    pub fn neighbors4(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        crate::components::Heading::CARDINALS
            .into_iter()
            .filter_map(move |heading| {
                let (dcol, drow) = heading.delta();
                cell.offset(dcol, drow)
            })
            .filter(|c| self.in_bounds(*c))
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Cell::new(row, col)))
    }

    /// Number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.tiles.len()
    }

    /// Resource tiles in row-major order.
    pub fn resource_tiles(&self) -> impl Iterator<Item = (Cell, ResourceKind)> + '_ {
        self.cells().filter_map(|cell| match self.tile_at(cell) {
            Some(TileKind::Obstacle(kind)) => Some((cell, kind)),
            _ => None,
        })
    }
}

fn is_rectangular(rows: &[Vec<String>]) -> bool {
    match rows.first() {
        Some(first) if !first.is_empty() => rows.iter().all(|r| r.len() == first.len()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| (*s).to_string()).collect())
            .collect()
    }

    fn definition(world_map: Option<Vec<Vec<String>>>) -> MapDefinition {
        MapDefinition {
            name: "test".into(),
            width: 256,
            height: 192,
            tile_size: 64,
            world_map,
        }
    }

    #[test]
    fn test_from_definition_labels() {
        let grid = WorldGrid::from_definition(&definition(Some(labels(&[
            &["grass", "tree", "grass"],
            &["bush", "home", "open"],
        ]))))
        .unwrap();

        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert_eq!(
            grid.tile_at(Cell::new(0, 1)),
            Some(TileKind::Obstacle(ResourceKind::Tree))
        );
        assert_eq!(
            grid.tile_at(Cell::new(1, 0)),
            Some(TileKind::Obstacle(ResourceKind::BerryBush))
        );
        assert_eq!(grid.home_cell(), Some(Cell::new(1, 1)));
        assert_eq!(grid.tile_at(Cell::new(2, 0)), None);
    }

    #[test]
    fn test_unknown_label_is_open() {
        let grid =
            WorldGrid::from_definition(&definition(Some(labels(&[&["lava", "grass"]])))).unwrap();
        assert_eq!(grid.tile_at(Cell::new(0, 0)), Some(TileKind::Open));
    }

    #[test]
    fn test_fallback_dimensions() {
        let absent = WorldGrid::from_definition(&definition(None)).unwrap();
        assert_eq!((absent.rows(), absent.cols()), (3, 4));
        assert!(absent.home_cell().is_none());

        let ragged = WorldGrid::from_definition(&definition(Some(labels(&[
            &["grass", "tree"],
            &["grass"],
        ]))))
        .unwrap();
        assert_eq!((ragged.rows(), ragged.cols()), (3, 4));
        assert!(ragged.cells().all(|c| ragged.tile_at(c) == Some(TileKind::Open)));

        let empty = WorldGrid::from_definition(&definition(Some(Vec::new()))).unwrap();
        assert_eq!(empty.cell_count(), 12);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let mut def = definition(None);
        def.tile_size = 0;
        assert!(matches!(
            WorldGrid::from_definition(&def),
            Err(GameError::InvalidMap(_))
        ));
    }

    #[test]
    fn test_empty_grid_allowed() {
        let grid = WorldGrid::open(0, 0, 32).unwrap();
        assert_eq!(grid.cells().count(), 0);
        assert_eq!(grid.cell_of_point(Vec2Fixed::ZERO), None);
    }

    #[test]
    fn test_first_home_wins() {
        let grid = WorldGrid::from_rows(
            16,
            vec![
                vec![TileKind::Open, TileKind::Home],
                vec![TileKind::Home, TileKind::Open],
            ],
        )
        .unwrap();
        assert_eq!(grid.home_cell(), Some(Cell::new(0, 1)));
        assert!(grid.is_blocked(Cell::new(1, 0)));
        assert!(!grid.is_obstacle(Cell::new(1, 0)));
    }

    #[test]
    fn test_point_cell_conversion() {
        let grid = WorldGrid::open(11, 20, 64).unwrap();

        assert_eq!(grid.point_center_of_cell(Cell::new(5, 14)), Vec2Fixed::from_pixels(928, 352));
        assert_eq!(
            grid.cell_of_point(Vec2Fixed::from_pixels(928, 352)),
            Some(Cell::new(5, 14))
        );
        assert_eq!(grid.cell_of_point(Vec2Fixed::from_pixels(63, 0)), Some(Cell::new(0, 0)));
        assert_eq!(grid.cell_of_point(Vec2Fixed::from_pixels(64, 0)), Some(Cell::new(0, 1)));

        // Far edge is outside for the strict query but clamps inward.
        let corner = Vec2Fixed::from_pixels(1280, 704);
        assert_eq!(grid.cell_of_point(corner), None);
        assert_eq!(grid.clamped_cell_of_point(corner), Cell::new(10, 19));
        assert_eq!(
            grid.clamped_cell_of_point(Vec2Fixed::from_pixels(-5, -5)),
            Cell::new(0, 0)
        );
    }

    #[test]
    fn test_odd_tile_center_halves_down() {
        let grid = WorldGrid::open(2, 2, 5).unwrap();
        assert_eq!(grid.point_center_of_cell(Cell::new(1, 1)), Vec2Fixed::from_pixels(7, 7));
    }

    #[test]
    fn test_neighbors_order_and_bounds() {
        let grid = WorldGrid::open(3, 3, 10).unwrap();
        let middle: Vec<_> = grid.neighbors4(Cell::new(1, 1)).collect();
        assert_eq!(
            middle,
            vec![Cell::new(0, 1), Cell::new(2, 1), Cell::new(1, 0), Cell::new(1, 2)]
        );

        let corner: Vec<_> = grid.neighbors4(Cell::new(0, 0)).collect();
        assert_eq!(corner, vec![Cell::new(1, 0), Cell::new(0, 1)]);
    }

    #[test]
    fn test_resource_tiles_row_major() {
        let tree = TileKind::Obstacle(ResourceKind::Tree);
        let bush = TileKind::Obstacle(ResourceKind::BerryBush);
        let grid = WorldGrid::from_rows(
            8,
            vec![vec![TileKind::Open, bush], vec![tree, TileKind::Open]],
        )
        .unwrap();
        let found: Vec<_> = grid.resource_tiles().collect();
        assert_eq!(
            found,
            vec![
                (Cell::new(0, 1), ResourceKind::BerryBush),
                (Cell::new(1, 0), ResourceKind::Tree),
            ]
        );
    }

    #[test]
    fn test_cell_rect_matches_center() {
        let grid = WorldGrid::open(4, 4, 48).unwrap();
        let cell = Cell::new(2, 3);
        assert_eq!(grid.cell_rect(cell).center(), grid.point_center_of_cell(cell));
        assert!(grid.cell_rect(cell).is_within(&grid.world_bounds()));
    }
}
