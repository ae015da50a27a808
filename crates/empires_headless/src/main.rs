//! Headless village runner.
//!
//! Runs the simulation without graphics. Frames and reports go to stdout,
//! logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Default scenario, a frame every 600 ticks
//! cargo run -p empires_headless -- run --ascii-every 600
//!
//! # A scenario file, JSON summary at the end
//! cargo run -p empires_headless -- run --scenario scenarios/harvest.ron --json
//!
//! # BFS route on a bundled map
//! cargo run -p empires_headless -- path --map plains --from 0,0 --to 10,26
//!
//! # Sixteen seeds in parallel
//! cargo run -p empires_headless -- batch --map orchard --seeds 16 --ticks 7200
//! ```

use std::collections::HashSet;
use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use empires_core::grid::{Cell, WorldGrid};
use empires_core::pathfinding::find_cell_path;
use empires_headless::{
    ascii_visualizer::{render_path, AsciiConfig},
    batch::{run_batch, BatchConfig},
    runner::{HeadlessRunner, RunConfig},
    scenario::{bundled_map, resolve_map, Scenario, ScenarioError, BUNDLED_MAPS},
};

#[derive(Parser)]
#[command(name = "empires_headless")]
#[command(about = "Headless village simulation runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one world and report on it
    Run {
        /// Scenario file to load
        #[arg(short, long, conflicts_with = "map")]
        scenario: Option<String>,

        /// Bundled map name or map file, with the default population
        #[arg(short, long)]
        map: Option<String>,

        /// Ticks to run (defaults to the scenario's)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// World seed
        #[arg(long)]
        seed: Option<u64>,

        /// Health lost per boundary hit
        #[arg(long)]
        boundary_penalty: Option<u32>,

        /// Print an ASCII frame every K ticks
        #[arg(long, value_name = "K")]
        ascii_every: Option<u64>,

        /// Show the whole map instead of the fogged view
        #[arg(long)]
        no_fog: bool,

        /// Colored frames
        #[arg(long)]
        color: bool,

        /// Print the final summary and snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the BFS route between two cells
    Path {
        /// Bundled map name or map file
        #[arg(short, long, default_value = "village")]
        map: String,

        /// Start cell as ROW,COL
        #[arg(long, value_parser = parse_cell)]
        from: Cell,

        /// Goal cell as ROW,COL
        #[arg(long, value_parser = parse_cell)]
        to: Cell,
    },

    /// List bundled maps
    Maps,

    /// Run one world per seed in parallel
    Batch {
        /// Bundled map name or map file
        #[arg(short, long, default_value = "village")]
        map: String,

        /// Number of seeds
        #[arg(short, long, default_value = "16")]
        seeds: u32,

        /// First seed
        #[arg(long, default_value = "0")]
        seed_start: u64,

        /// Ticks per world
        #[arg(short, long, default_value = "3600")]
        ticks: u64,

        /// Parallel worlds (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,
    },
}

fn parse_cell(s: &str) -> Result<Cell, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("bad coordinate '{v}': {e}"))
    };
    Ok(Cell::new(parse(row)?, parse(col)?))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries frames and JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            map,
            ticks,
            seed,
            boundary_penalty,
            ascii_every,
            no_fog,
            color,
            json,
        } => {
            let overrides = RunOverrides {
                ticks,
                seed,
                boundary_penalty,
                ascii_every,
                no_fog,
                color,
                json,
            };
            cmd_run(scenario, map, &overrides)
        }
        Commands::Path { map, from, to } => cmd_path(&map, from, to),
        Commands::Maps => {
            cmd_maps();
            Ok(())
        }
        Commands::Batch {
            map,
            seeds,
            seed_start,
            ticks,
            parallel,
        } => cmd_batch(
            &map,
            &BatchConfig {
                seeds,
                seed_start,
                ticks,
                parallel,
            },
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

struct RunOverrides {
    ticks: Option<u64>,
    seed: Option<u64>,
    boundary_penalty: Option<u32>,
    ascii_every: Option<u64>,
    no_fog: bool,
    color: bool,
    json: bool,
}

fn load_scenario(scenario: Option<String>, map: Option<String>) -> Result<Scenario, ScenarioError> {
    match (scenario, map) {
        (Some(path), _) => Scenario::load(path),
        (None, Some(map)) => Ok(Scenario::on_map(resolve_map(&map)?)),
        (None, None) => Ok(Scenario::default()),
    }
}

/// Run a single world
fn cmd_run(
    scenario: Option<String>,
    map: Option<String>,
    overrides: &RunOverrides,
) -> Result<(), ScenarioError> {
    let mut scenario = load_scenario(scenario, map)?;
    if let Some(seed) = overrides.seed {
        scenario.config.seed = seed;
    }
    if let Some(penalty) = overrides.boundary_penalty {
        scenario.config.boundary.health_penalty = penalty;
    }

    let config = RunConfig {
        ticks: overrides.ticks.unwrap_or(scenario.ticks),
        ascii_every: overrides.ascii_every,
        ascii: AsciiConfig {
            show_fog: !overrides.no_fog,
            show_legend: true,
            use_color: overrides.color,
        },
    };

    let mut runner = HeadlessRunner::from_scenario(&scenario)?;
    let summary = runner.run(&config, &mut io::stdout().lock())?;

    if overrides.json {
        let report = serde_json::json!({
            "summary": summary,
            "snapshot": runner.simulation().snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        println!(
            "{}: {} ticks, score {}, wood {}, food {}, {} discoveries, {}/{} cells revealed",
            summary.name,
            summary.ticks,
            summary.score,
            summary.wood,
            summary.food,
            summary.discovered,
            summary.revealed,
            summary.cells
        );
    }
    Ok(())
}

/// Print a BFS route overlay
fn cmd_path(map: &str, from: Cell, to: Cell) -> Result<(), ScenarioError> {
    let def = resolve_map(map)?;
    let grid = WorldGrid::from_definition(&def)?;
    let path = find_cell_path(&grid, from, to, &HashSet::new());
    tracing::debug!(%from, %to, steps = path.len().saturating_sub(1), "Path computed");
    print!("{}", render_path(&grid, &path));
    Ok(())
}

/// List bundled maps
fn cmd_maps() {
    for (name, _) in BUNDLED_MAPS {
        match bundled_map(name)
            .and_then(|def| WorldGrid::from_definition(&def).map_err(ScenarioError::from))
        {
            Ok(grid) => println!(
                "{name:<10} {}x{} cells, tile {} px, {} resource tiles",
                grid.cols(),
                grid.rows(),
                grid.tile_size(),
                grid.resource_tiles().count()
            ),
            Err(e) => println!("{name:<10} unreadable: {e}"),
        }
    }
}

/// Run one world per seed
fn cmd_batch(map: &str, config: &BatchConfig) -> Result<(), ScenarioError> {
    let scenario = Scenario::on_map(resolve_map(map)?);
    let results = run_batch(&scenario, config);

    for error in &results.errors {
        tracing::warn!(seed = error.seed, "{}", error.message);
    }
    tracing::info!(mean_score = results.mean_score(), "Batch summary");

    let rows: Vec<serde_json::Value> = results
        .runs
        .iter()
        .map(|run| {
            serde_json::json!({
                "seed": run.seed,
                "score": run.score.to_string(),
                "wood": run.wood,
                "food": run.food,
                "gold": run.gold,
                "discovered": run.discovered,
                "revealed": run.revealed,
                "state_hash": format!("{:016x}", run.state_hash),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
    Ok(())
}
