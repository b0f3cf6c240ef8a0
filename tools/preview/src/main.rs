//! Preview renderer: writes grayscale PNGs of one tile's generation stages.
//! Not part of the main pipeline; no tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use relief_core::erosion::{ErosionParams, ErosionSimulator};
use relief_core::heightmap::build_height_map;
use relief_core::noise::falloff::generate_falloff_map;
use relief_core::noise::generate_noise_map;
use relief_core::{HeightGrid, HeightMapSettings, TerrainConfig, Vec2};

#[derive(Parser, Debug)]
#[command(name = "preview", about = "Render tile generation stages to PNG")]
struct Args {
    /// JSON terrain config; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grid side in cells.
    #[arg(long, default_value = "256")]
    size: usize,

    /// Overrides the config's noise seed.
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i32>,

    /// Overrides the config's droplet count.
    #[arg(long)]
    iterations: Option<u32>,

    #[arg(short, long, default_value = "data/preview")]
    out: PathBuf,
}

// ── Image helpers ─────────────────────────────────────────────────────────────

/// Stretch the grid's own range over 0-255.
fn to_gray(grid: &HeightGrid) -> image::GrayImage {
    let min = grid.data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = grid.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = (max - min).max(1e-6);
    image::GrayImage::from_fn(grid.width as u32, grid.height as u32, |c, r| {
        let v = (grid.get(r as usize, c as usize) - min) / range;
        image::Luma([(v.clamp(0.0, 1.0) * 255.0) as u8])
    })
}

/// Erosion difference: red where material was removed, blue where it was laid down.
fn to_diff(before: &HeightGrid, after: &HeightGrid) -> image::RgbImage {
    let peak = before
        .data
        .iter()
        .zip(&after.data)
        .map(|(a, b)| (b - a).abs())
        .fold(0.0f32, f32::max)
        .max(1e-6);
    image::RgbImage::from_fn(before.width as u32, before.height as u32, |c, r| {
        let d = (after.get(r as usize, c as usize) - before.get(r as usize, c as usize)) / peak;
        let t = (d.abs().sqrt() * 255.0) as u8;
        if d < 0.0 {
            image::Rgb([255, 255 - t, 255 - t])
        } else {
            image::Rgb([255 - t, 255 - t, 255])
        }
    })
}

fn save_gray(img: &image::GrayImage, dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    img.save(&path).with_context(|| format!("Failed to save {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(p) => TerrainConfig::load(p).with_context(|| format!("Cannot load config {}", p.display()))?,
        None => TerrainConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.height_map.noise.seed = seed;
    }
    if let Some(n) = args.iterations {
        config.erosion.iteration_count = n;
    }
    fs::create_dir_all(&args.out).with_context(|| format!("Cannot create {}", args.out.display()))?;
    let size = args.size;

    println!("Noise map ({size}×{size}, seed {})…", config.height_map.noise.seed);
    let noise = generate_noise_map(size, size, &config.height_map.noise, Vec2::ZERO);
    save_gray(&to_gray(&noise), &args.out, "noise.png")?;

    println!("Falloff map…");
    save_gray(&to_gray(&generate_falloff_map(size)), &args.out, "falloff.png")?;

    let plain_settings = HeightMapSettings { erode: false, ..config.height_map.clone() };
    let plain = build_height_map(size, &plain_settings, None, Vec2::ZERO);
    save_gray(&to_gray(&plain), &args.out, "height.png")?;

    let params: ErosionParams = config.erosion.clone();
    println!("Eroding with {} droplets…", params.validated().iteration_count);
    let mut sim = ErosionSimulator::new(params);
    let mut eroded = plain.clone();
    let stats = sim.erode(&mut eroded, config.height_map.noise.seed);
    println!("  eroded {:.2}, deposited {:.2}", stats.eroded, stats.deposited);
    save_gray(&to_gray(&eroded), &args.out, "eroded.png")?;

    let path = args.out.join("erosion_diff.png");
    to_diff(&plain, &eroded)
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    println!("Wrote {}", path.display());

    println!("Done.");
    Ok(())
}
