//! Headless terrain runner: streams tiles along a scripted viewer path, or
//! generates a single tile and dumps it as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use relief_core::erosion::ErosionSimulator;
use relief_core::{build_height_map, build_mesh, StreamingController, TerrainConfig, TileCoord, TileEvent, Vec2};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "relief", about = "Procedural terrain generation and streaming")]
struct Args {
    /// JSON terrain config; built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move a viewer in a straight line and stream tiles around it.
    Stream {
        #[arg(long, default_value = "40")]
        ticks: u32,

        /// World units the viewer moves per tick.
        #[arg(long, default_value = "20")]
        speed: f32,

        /// Heading in degrees, 0 = +x.
        #[arg(long, default_value = "0")]
        heading: f32,

        /// Wait for all generation work after every tick.
        #[arg(long)]
        settle: bool,

        /// Seconds to wait for outstanding work at the end.
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Generate one tile and write its height grid (and optional mesh) as JSON.
    Tile {
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        x: i32,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        y: i32,

        /// Also build the mesh at this LOD.
        #[arg(long)]
        lod: Option<usize>,

        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective config as JSON.
    Config,
}

#[derive(Serialize)]
struct TileDump<'a> {
    coord: TileCoord,
    sample_center: Vec2,
    world_size: f32,
    height_map: &'a relief_core::HeightGrid,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<relief_core::MeshData>,
}

fn load_config(path: Option<&PathBuf>) -> Result<TerrainConfig> {
    match path {
        Some(p) => TerrainConfig::load(p).with_context(|| format!("Cannot load config {}", p.display())),
        None => Ok(TerrainConfig::default()),
    }
}

fn event_kind(event: &TileEvent) -> &'static str {
    match event {
        TileEvent::VisibilityChanged { visible: true, .. } => "shown",
        TileEvent::VisibilityChanged { visible: false, .. } => "hidden",
        TileEvent::MeshDisplayed { .. } => "mesh",
        TileEvent::ColliderAssigned { .. } => "collider",
        TileEvent::GenerationFailed { .. } => "failed",
        TileEvent::Evicted { .. } => "evicted",
    }
}

fn run_stream(config: &TerrainConfig, ticks: u32, speed: f32, heading: f32, settle: bool, timeout: u64) -> Result<()> {
    let mut controller = StreamingController::new(config).context("Cannot start streaming")?;
    let step = Vec2::new(heading.to_radians().cos(), heading.to_radians().sin()) * speed;
    let wait = Duration::from_secs(timeout);
    let mut totals: BTreeMap<&'static str, usize> = BTreeMap::new();
    let start = Instant::now();

    eprintln!(
        "Streaming {ticks} ticks, {} tiles each way, tile size {:.1}",
        controller.tiles_in_view(),
        controller.store().world_size()
    );

    let mut viewer = Vec2::ZERO;
    for _ in 0..ticks {
        let report = controller.tick(viewer);
        if settle {
            controller.wait_idle(wait);
        }
        let events = controller.drain_events();
        for e in &events {
            *totals.entry(event_kind(e)).or_default() += 1;
            if let TileEvent::GenerationFailed { coord, stage, reason } = e {
                eprintln!("  [warn] ({}, {}) {stage:?} failed: {reason}", coord.x, coord.y);
            }
        }
        println!(
            "tick {:>4}  viewer ({:>8.1}, {:>8.1})  tiles {:>4}  visible {:>3}  in flight {:>3}  applied {:>3}  events {:>3}{}",
            report.tick,
            viewer.x,
            viewer.y,
            report.tiles,
            report.visible,
            report.in_flight,
            report.drained.applied,
            events.len(),
            if report.refreshed { "  *" } else { "" },
        );
        viewer = viewer + step;
    }

    let last = controller.wait_idle(wait);
    for e in controller.drain_events() {
        *totals.entry(event_kind(&e)).or_default() += 1;
    }
    if controller.store().in_flight() > 0 {
        bail!("{} generation tasks still running after {timeout}s", controller.store().in_flight());
    }

    eprintln!(
        "Done in {:.2}s: {} tiles, {} visible, {} late completions",
        start.elapsed().as_secs_f64(),
        controller.store().len(),
        controller.store().visible().len(),
        last.applied
    );
    for (kind, n) in totals {
        eprintln!("  {kind:<9} {n}");
    }
    Ok(())
}

fn run_tile(config: &TerrainConfig, coord: TileCoord, lod: Option<usize>, output: Option<&PathBuf>) -> Result<()> {
    let size = config.mesh.num_vertices_per_line();
    let world_size = config.mesh.mesh_world_size();
    let sample_center = coord.center(world_size) * (1.0 / config.mesh.mesh_scale);

    let mut erosion = ErosionSimulator::new(config.erosion.clone());
    let start = Instant::now();
    let grid = build_height_map(size, &config.height_map, Some(&mut erosion), sample_center);
    eprintln!(
        "Tile ({}, {}): {size}×{size} in {:.1} ms, range [{:.3}, {:.3}]",
        coord.x,
        coord.y,
        start.elapsed().as_secs_f64() * 1e3,
        grid.min_value,
        grid.max_value
    );

    let mesh = lod.map(|lod| {
        let mesh = build_mesh(&grid, &config.mesh, lod);
        eprintln!("  LOD {lod}: {} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count());
        mesh
    });

    let dump = TileDump { coord, sample_center, world_size, height_map: &grid, mesh };
    let json = serde_json::to_string(&dump).context("Cannot serialise tile")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Write failed: {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Stream { ticks, speed, heading, settle, timeout } => {
            run_stream(&config, ticks, speed, heading, settle, timeout)
        }
        Command::Tile { x, y, lod, output } => {
            if lod.is_some_and(|l| l >= relief_core::mesh::NUM_SUPPORTED_LODS) {
                bail!("LOD must be below {}", relief_core::mesh::NUM_SUPPORTED_LODS);
            }
            run_tile(&config, TileCoord::new(x, y), lod, output.as_ref())
        }
        Command::Config => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}
