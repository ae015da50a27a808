//! Test fixtures and helpers.
//!
//! Worlds are written as ASCII art, one character per tile:
//!
//! | char | tile        |
//! |------|-------------|
//! | `.`  | open ground |
//! | `T`  | tree        |
//! | `B`  | berry bush  |
//! | `H`  | home        |
//!
//! Blank lines and surrounding whitespace are ignored.

use empires_core::config::SimConfig;
use empires_core::grid::{Cell, MapDefinition, TileKind, WorldGrid};
use empires_core::math::Vec2Fixed;
use empires_core::economy::ResourceKind;
use empires_core::simulation::{Simulation, TickEvents};

/// Tile edge used by fixtures unless a test needs something else.
pub const TILE: u32 = 32;

/// A small village: two trees, two bushes, home near the middle.
pub const VILLAGE: &str = "
    .........
    .T......B
    ....H....
    B.....T..
    .........
";

/// Home fenced in by trees on three sides, open to the west.
pub const FENCED_HOME: &str = "
    .....
    ..T..
    ..HT.
    ..T..
    .....
";

fn tile_of(ch: char) -> TileKind {
    match ch {
        '.' => TileKind::Open,
        'T' => TileKind::Obstacle(ResourceKind::Tree),
        'B' => TileKind::Obstacle(ResourceKind::BerryBush),
        'H' => TileKind::Home,
        other => panic!("unknown map character {other:?}"),
    }
}

fn ascii_rows(src: &str) -> Vec<Vec<TileKind>> {
    src.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().map(tile_of).collect())
        .collect()
}

/// Parse an ASCII map into a grid.
///
/// # Panics
///
/// Panics on unknown characters or ragged rows.
#[must_use]
pub fn parse_ascii_map(tile_size: u32, src: &str) -> WorldGrid {
    WorldGrid::from_rows(tile_size, ascii_rows(src)).expect("fixture map must be rectangular")
}

/// The same map as a label-based definition, as map files store it.
#[must_use]
pub fn ascii_definition(tile_size: u32, src: &str) -> MapDefinition {
    let rows = ascii_rows(src);
    let height = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let width = rows
        .first()
        .map_or(0, |r| u32::try_from(r.len()).unwrap_or(u32::MAX));
    MapDefinition {
        name: "fixture".into(),
        width: width * tile_size,
        height: height * tile_size,
        tile_size,
        world_map: Some(
            rows.iter()
                .map(|row| row.iter().map(|t| t.label().to_string()).collect())
                .collect(),
        ),
    }
}

/// Decode a RON map definition.
///
/// # Panics
///
/// Panics if the text is not a valid definition.
#[must_use]
pub fn definition_from_ron(src: &str) -> MapDefinition {
    ron::from_str(src).expect("fixture RON must parse")
}

/// Default config with the agent switched off, so only scripted commands
/// steer villagers.
#[must_use]
pub fn quiet_config(seed: u64) -> SimConfig {
    SimConfig {
        agent_enabled: false,
        ..SimConfig::with_seed(seed)
    }
}

/// Build a world from ASCII art.
///
/// # Panics
///
/// Panics on a bad map or config.
#[must_use]
pub fn sim_from_ascii(src: &str, config: SimConfig) -> Simulation {
    let grid = parse_ascii_map(TILE, src);
    tracing::debug!(rows = grid.rows(), cols = grid.cols(), "Fixture world");
    Simulation::new(grid, config).expect("fixture config must be valid")
}

/// Pixel centre of a cell in `sim`'s grid.
#[must_use]
pub fn cell_center(sim: &Simulation, row: u32, col: u32) -> Vec2Fixed {
    sim.grid().point_center_of_cell(Cell::new(row, col))
}

/// Tick until `done` holds, at most `max_ticks` times.
///
/// Returns how many ticks ran, or `None` if `done` never held.
pub fn run_until<F>(sim: &mut Simulation, max_ticks: u64, mut done: F) -> Option<u64>
where
    F: FnMut(&Simulation, &TickEvents) -> bool,
{
    for n in 1..=max_ticks {
        let events = sim.tick();
        if done(sim, &events) {
            return Some(n);
        }
    }
    None
}

/// Tick `ticks` times and keep every tick's events.
pub fn collect_events(sim: &mut Simulation, ticks: u64) -> Vec<TickEvents> {
    (0..ticks).map(|_| sim.tick()).collect()
}
