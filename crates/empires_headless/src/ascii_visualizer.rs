//! ASCII rendering of world snapshots and BFS paths.
//!
//! One character per cell:
//!
//! | char | meaning                         |
//! |------|---------------------------------|
//! | `#`  | fog                             |
//! | `.`  | open ground                     |
//! | `T`  | tree                            |
//! | `B`  | berry bush                      |
//! | `H`  | home                            |
//! | `v`  | villager (`V` when carrying)    |
//! | `A`  | villager under agent control    |
//! | `m`  | manually controlled entity      |
//! | `s`  | scout                           |
//! | `*`  | planned path                    |

use std::fmt::Write;

use empires_core::components::{EntityControl, EntityKind};
use empires_core::economy::ResourceKind;
use empires_core::grid::{Cell, TileKind, WorldGrid};
use empires_core::snapshot::{EntitySnapshot, WorldSnapshot};

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Hide unrevealed cells.
    pub show_fog: bool,
    /// Append counters below the map.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_fog: true,
            show_legend: true,
            use_color: false,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

fn entity_char(entity: &EntitySnapshot) -> char {
    match (entity.kind, entity.control) {
        (_, EntityControl::Manual) => 'm',
        (EntityKind::Villager, EntityControl::Agent) => 'A',
        (EntityKind::Villager, _) if entity.carried > 0 => 'V',
        (EntityKind::Villager, _) => 'v',
        (EntityKind::Scout, _) => 's',
    }
}

fn color_of(ch: char) -> Option<&'static str> {
    match ch {
        'T' => Some(colors::GREEN),
        'B' => Some(colors::MAGENTA),
        'H' => Some(colors::YELLOW),
        'v' | 'V' | 'A' | 'm' | 's' => Some(colors::CYAN),
        '#' => Some(colors::GRAY),
        _ => None,
    }
}

fn char_grid(snapshot: &WorldSnapshot, config: &AsciiConfig) -> Vec<Vec<char>> {
    let mut grid = vec![vec!['.'; snapshot.cols as usize]; snapshot.rows as usize];
    let mut put = |cell: Cell, ch: char| {
        if let Some(slot) = grid
            .get_mut(cell.row as usize)
            .and_then(|row| row.get_mut(cell.col as usize))
        {
            *slot = ch;
        }
    };

    if let Some(home) = snapshot.home {
        put(home, 'H');
    }
    for node in &snapshot.resources {
        let ch = match node.kind {
            ResourceKind::Tree => 'T',
            ResourceKind::BerryBush => 'B',
        };
        put(node.cell, ch);
    }
    if config.show_fog {
        for row in 0..snapshot.rows {
            for col in 0..snapshot.cols {
                let cell = Cell::new(row, col);
                if !snapshot.is_revealed(cell) {
                    put(cell, '#');
                }
            }
        }
    }
    for entity in &snapshot.entities {
        put(entity.cell, entity_char(entity));
    }
    grid
}

fn push_rows(output: &mut String, rows: &[Vec<char>], use_color: bool) {
    for row in rows {
        for &ch in row {
            match color_of(ch).filter(|_| use_color) {
                Some(color) => {
                    let _ = write!(output, "{color}{ch}{}", colors::RESET);
                }
                None => output.push(ch),
            }
        }
        output.push('\n');
    }
}

/// Render a snapshot as ASCII art.
#[must_use]
pub fn render_ascii(snapshot: &WorldSnapshot, config: &AsciiConfig) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "tick {} ({} ms)  {}x{} cells",
        snapshot.tick, snapshot.time_ms, snapshot.cols, snapshot.rows
    );

    push_rows(&mut output, &char_grid(snapshot, config), config.use_color);

    if config.show_legend {
        let economy = &snapshot.economy;
        let _ = writeln!(
            output,
            "score {}  wood {}  food {}  gold {}  revealed {}/{}  discovered {}",
            economy.score,
            economy.wood,
            economy.food,
            economy.gold,
            snapshot.revealed_count,
            u64::from(snapshot.rows) * u64::from(snapshot.cols),
            snapshot.discovered.len()
        );
        for entity in &snapshot.entities {
            let _ = writeln!(
                output,
                "  #{} {} at {} {} hp {} carrying {}/{}",
                entity.id,
                entity.kind.label(),
                entity.cell,
                entity.state.name(),
                entity.health,
                entity.carried,
                entity.capacity
            );
        }
    }
    output
}

/// Draw a cell path over the static map: `S` start, `G` goal, `*` between.
///
/// An empty path is reported on the line below the map.
#[must_use]
pub fn render_path(grid: &WorldGrid, path: &[Cell]) -> String {
    let mut rows: Vec<Vec<char>> = (0..grid.rows())
        .map(|row| {
            (0..grid.cols())
                .map(|col| match grid.tile_at(Cell::new(row, col)) {
                    Some(tile) => tile_char(tile),
                    None => '?',
                })
                .collect()
        })
        .collect();

    let last = path.len().saturating_sub(1);
    for (i, cell) in path.iter().enumerate() {
        let ch = match i {
            0 => 'S',
            i if i == last => 'G',
            _ => '*',
        };
        if let Some(slot) = rows
            .get_mut(cell.row as usize)
            .and_then(|r| r.get_mut(cell.col as usize))
        {
            *slot = ch;
        }
    }

    let mut output = String::new();
    push_rows(&mut output, &rows, false);
    if path.is_empty() {
        output.push_str("no path\n");
    } else {
        let _ = writeln!(output, "{} steps", path.len() - 1);
    }
    output
}

fn tile_char(tile: TileKind) -> char {
    match tile {
        TileKind::Open => '.',
        TileKind::Obstacle(ResourceKind::Tree) => 'T',
        TileKind::Obstacle(ResourceKind::BerryBush) => 'B',
        TileKind::Home => 'H',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use empires_core::config::SimConfig;
    use empires_core::math::Vec2Fixed;
    use empires_core::pathfinding::find_cell_path;
    use empires_core::simulation::Simulation;
    use empires_test_utils::fixtures::{parse_ascii_map, TILE, VILLAGE};
    use std::collections::HashSet;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            ..AsciiConfig::default()
        }
    }

    #[test]
    fn test_fogged_world_is_hidden() {
        let sim = Simulation::new(parse_ascii_map(TILE, VILLAGE), SimConfig::default()).unwrap();
        let output = render_ascii(&sim.snapshot(), &plain());
        let map: Vec<&str> = output.lines().skip(1).collect();
        assert_eq!(map.len(), 5);
        assert!(map.iter().all(|line| line.chars().all(|c| c == '#')));
    }

    #[test]
    fn test_revealed_world_shows_tiles() {
        let config = SimConfig {
            fog_disabled: true,
            agent_enabled: false,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(parse_ascii_map(TILE, VILLAGE), config).unwrap();
        sim.spawn_scout(Vec2Fixed::from_pixels(16, 16));
        let output = render_ascii(&sim.snapshot(), &plain());
        let map: Vec<&str> = output.lines().skip(1).collect();
        assert_eq!(
            map,
            vec![
                "s........",
                ".T......B",
                "....H....",
                "B.....T..",
                ".........",
            ]
        );
    }

    #[test]
    fn test_legend_lists_entities() {
        let mut sim = Simulation::new(parse_ascii_map(TILE, VILLAGE), SimConfig::default()).unwrap();
        sim.spawn_villager(Vec2Fixed::from_pixels(16, 16));
        let output = render_ascii(&sim.snapshot(), &AsciiConfig::default());
        assert!(output.contains("score 0.0"));
        assert!(output.contains("#1 villager at (0, 0) wandering"));
    }

    #[test]
    fn test_render_path_overlay() {
        let grid = parse_ascii_map(
            TILE,
            "
            ...
            .T.
            ...
            ",
        );
        let path = find_cell_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &HashSet::new());
        let output = render_path(&grid, &path);
        assert_eq!(output, "S..\n*T.\n**G\n4 steps\n");
    }

    #[test]
    fn test_render_missing_path() {
        let grid = parse_ascii_map(TILE, "..T");
        let output = render_path(&grid, &[]);
        assert!(output.ends_with("no path\n"));
    }
}
