//! Fog of war.
//!
//! A cell becomes revealed once any entity stands on it or bumps into the
//! obstacle on it. Revealed cells never return to fog until the world resets.

use serde::{Deserialize, Serialize};

use crate::economy::ResourceNode;
use crate::grid::{Cell, WorldGrid};

/// Per-cell revealed flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogOfWar {
    rows: u32,
    cols: u32,
    revealed: Vec<bool>,
    revealed_count: usize,
}

impl FogOfWar {
    /// Fully fogged map matching the grid's dimensions.
    #[must_use]
    pub fn new(grid: &WorldGrid) -> Self {
        let count = grid.cell_count();
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            revealed: vec![false; count],
            revealed_count: 0,
        }
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        (cell.row < self.rows && cell.col < self.cols)
            .then(|| cell.row as usize * self.cols as usize + cell.col as usize)
    }

    /// Reveal a cell. Returns `true` only the first time.
    pub fn reveal(&mut self, cell: Cell) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        if self.revealed[index] {
            return false;
        }
        self.revealed[index] = true;
        self.revealed_count += 1;
        true
    }

    /// Whether a cell has been revealed. Out-of-bounds cells never are.
    #[must_use]
    pub fn is_revealed(&self, cell: Cell) -> bool {
        self.index(cell).is_some_and(|i| self.revealed[i])
    }

    /// Number of revealed cells.
    #[must_use]
    pub const fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    /// Whether every cell is revealed.
    #[must_use]
    pub fn is_fully_revealed(&self) -> bool {
        self.revealed_count == self.revealed.len()
    }

    /// Lift the fog everywhere.
    pub fn reveal_all(&mut self) {
        self.revealed.fill(true);
        self.revealed_count = self.revealed.len();
    }

    /// Return every cell to fog.
    pub fn clear(&mut self) {
        self.revealed.fill(false);
        self.revealed_count = 0;
    }

    /// Revealed cells in row-major order.
    pub fn revealed_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols.max(1);
        self.revealed
            .iter()
            .enumerate()
            .filter(|(_, revealed)| **revealed)
            .map(move |(i, _)| Cell::new(i as u32 / cols, i as u32 % cols))
    }

    /// Whether a renderer should draw this resource.
    #[must_use]
    pub fn resource_visible(&self, node: &ResourceNode) -> bool {
        self.is_revealed(node.cell)
    }
}
