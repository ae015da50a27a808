//! Scenario loading and configuration.
//!
//! A scenario names a map, a simulation config and a starting population.
//! Maps are either bundled with the crate, loaded from a RON file or given
//! inline.

use std::path::{Path, PathBuf};

use empires_core::components::{EntityControl, EntityKind};
use empires_core::config::SimConfig;
use empires_core::error::GameError;
use empires_core::grid::{Cell, MapDefinition};
use empires_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// No bundled map with that name.
    #[error("Unknown bundled map: {0}")]
    UnknownMap(String),
    /// The world could not be built.
    #[error("Failed to build world: {0}")]
    World(#[from] GameError),
}

/// Maps shipped with the runner, by name.
pub const BUNDLED_MAPS: &[(&str, &str)] = &[
    ("village", include_str!("../maps/village.ron")),
    ("woodland", include_str!("../maps/woodland.ron")),
    ("plains", include_str!("../maps/plains.ron")),
    ("orchard", include_str!("../maps/orchard.ron")),
];

/// Decode a bundled map.
pub fn bundled_map(name: &str) -> Result<MapDefinition, ScenarioError> {
    let (_, src) = BUNDLED_MAPS
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| ScenarioError::UnknownMap(name.to_string()))?;
    Ok(ron::from_str(src)?)
}

/// Load a map definition from a RON file.
pub fn load_map<P: AsRef<Path>>(path: P) -> Result<MapDefinition, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(ron::from_str(&contents)?)
}

/// Load a map by bundled name, falling back to a file path.
pub fn resolve_map(name_or_path: &str) -> Result<MapDefinition, ScenarioError> {
    match bundled_map(name_or_path) {
        Err(ScenarioError::UnknownMap(_)) => load_map(name_or_path),
        other => other,
    }
}

/// Where a scenario's map comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapSource {
    /// One of [`BUNDLED_MAPS`].
    Bundled(String),
    /// A RON file, relative to the working directory.
    File(PathBuf),
    /// Defined in the scenario itself.
    Inline(MapDefinition),
}

impl Default for MapSource {
    fn default() -> Self {
        Self::Bundled("village".to_string())
    }
}

impl MapSource {
    /// Decode the map.
    pub fn load(&self) -> Result<MapDefinition, ScenarioError> {
        match self {
            Self::Bundled(name) => bundled_map(name),
            Self::File(path) => load_map(path),
            Self::Inline(def) => Ok(def.clone()),
        }
    }
}

/// One entity placed by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Villager or scout.
    pub kind: EntityKind,
    /// Cell row.
    pub row: u32,
    /// Cell column.
    pub col: u32,
    /// Starting controller.
    #[serde(default)]
    pub control: EntityControl,
}

/// Starting population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Population {
    /// Villager, scout, villager on random cells.
    Reset,
    /// These kinds at the spawn point next to home.
    NearHome(Vec<EntityKind>),
    /// Exact placements.
    Placed(Vec<Placement>),
}

impl Default for Population {
    fn default() -> Self {
        Self::Reset
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Map to play on.
    pub map: MapSource,
    /// Simulation parameters.
    pub config: SimConfig,
    /// Who starts in the world.
    pub population: Population,
    /// Default run length.
    pub ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Village".to_string(),
            description: "Two villagers and a scout on the village map".to_string(),
            map: MapSource::default(),
            config: SimConfig::default(),
            population: Population::Reset,
            ticks: 3600,
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Default scenario on another map.
    #[must_use]
    pub fn on_map(map: MapDefinition) -> Self {
        Self {
            name: map.name.clone(),
            map: MapSource::Inline(map),
            ..Self::default()
        }
    }

    /// Build the world and place the starting population.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let def = self.map.load()?;
        let mut sim = Simulation::from_definition(&def, self.config.clone())?;

        match &self.population {
            Population::Reset => {
                sim.reset_population();
            }
            Population::NearHome(kinds) => {
                for kind in kinds {
                    sim.spawn_near_home(*kind)?;
                }
            }
            Population::Placed(placements) => {
                for p in placements {
                    let cell = Cell::new(p.row, p.col);
                    if !sim.grid().in_bounds(cell) {
                        return Err(GameError::NoSpawnCell(format!("{cell} is off the map")).into());
                    }
                    let position = sim.grid().point_center_of_cell(cell);
                    let id = sim.spawn(p.kind, position);
                    sim.set_control(id, p.control)?;
                }
            }
        }

        tracing::info!(
            scenario = %self.name,
            map = %def.name,
            entities = sim.entities().len(),
            "Scenario loaded"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bundled_maps_decode() {
        for (name, _) in BUNDLED_MAPS {
            let def = bundled_map(name).unwrap();
            assert_eq!(def.name, *name);
            assert!(def.world_map.is_some());
        }
    }

    #[test]
    fn test_village_map_shape() {
        let sim = Scenario::default().build().unwrap();
        assert_eq!((sim.grid().rows(), sim.grid().cols()), (11, 20));
        assert_eq!(sim.grid().tile_size(), 64);
        assert_eq!(sim.grid().home_cell(), Some(Cell::new(5, 15)));
        assert_eq!(sim.entities().len(), 3);
    }

    #[test]
    fn test_unknown_map() {
        assert!(matches!(
            bundled_map("atlantis"),
            Err(ScenarioError::UnknownMap(_))
        ));
        assert!(matches!(
            resolve_map("no/such/map.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_scenario_from_ron() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "drill",
                map: Bundled("plains"),
                config: (seed: 7, boundary: (health_penalty: 5)),
                population: Placed([
                    (kind: Villager, row: 5, col: 14),
                    (kind: Scout, row: 0, col: 0, control: Manual),
                ]),
                ticks: 10,
            )"#,
        )
        .unwrap();
        assert_eq!(scenario.config.seed, 7);
        assert_eq!(scenario.config.boundary.health_penalty, 5);

        let sim = scenario.build().unwrap();
        let controls: Vec<_> = sim.entities().iter_sorted().map(|e| e.control).collect();
        assert_eq!(controls, vec![EntityControl::Autonomous, EntityControl::Manual]);
    }

    #[test]
    fn test_near_home_population() {
        let scenario = Scenario {
            population: Population::NearHome(vec![EntityKind::Villager, EntityKind::Scout]),
            ..Scenario::default()
        };
        let sim = scenario.build().unwrap();
        let home = sim.grid().home_cell().unwrap();
        for entity in sim.entities().iter_sorted() {
            assert_eq!(entity.cell(sim.grid()), Cell::new(home.row, home.col - 1));
        }
    }

    #[test]
    fn test_placement_off_map_fails() {
        let scenario = Scenario {
            population: Population::Placed(vec![Placement {
                kind: EntityKind::Scout,
                row: 99,
                col: 0,
                control: EntityControl::Autonomous,
            }]),
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.build(),
            Err(ScenarioError::World(GameError::NoSpawnCell(_)))
        ));
    }

    #[test]
    fn test_sample_scenarios_build() {
        let harvest = Scenario::from_ron_str(include_str!("../scenarios/harvest.ron")).unwrap();
        let sim = harvest.build().unwrap();
        assert_eq!(sim.entities().len(), 4);
        assert_eq!(sim.config().boundary.health_penalty, 5);

        let drill = Scenario::from_ron_str(include_str!("../scenarios/drill.ron")).unwrap();
        let sim = drill.build().unwrap();
        assert!(!sim.config().agent_enabled);
        let manual = sim
            .entities()
            .iter_sorted()
            .filter(|e| e.control == EntityControl::Manual)
            .count();
        assert_eq!(manual, 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"(name: "file", ticks: 5)"#).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.name, "file");
        assert_eq!(scenario.ticks, 5);
        assert_eq!(scenario.map, MapSource::default());
    }
}
