use std::time::Duration;

use relief_core::erosion::{ErosionParams, ErosionSimulator};
use relief_core::heightmap::build_height_map;
use relief_core::noise::generate_noise_map;
use relief_core::streaming::{LodInfo, LodThresholds};
use relief_core::{build_mesh, build_terrain_tile, HeightMapSettings, MeshSettings, StreamingController, TerrainConfig, TileCoord, TileEvent, Vec2};

#[test]
fn tile_to_mesh_at_every_lod() {
    let mesh_settings = MeshSettings::default();
    let size = mesh_settings.num_vertices_per_line();
    let height = HeightMapSettings { erode: true, ..HeightMapSettings::default() };
    let erosion = ErosionParams { iteration_count: 5_000, ..ErosionParams::default() };
    let grid = build_terrain_tile(size, &height, &erosion, Vec2::new(50.0, 0.0));
    assert_eq!(grid.size(), size);
    assert!(grid.data.iter().all(|v| v.is_finite()));

    for lod in 0..relief_core::mesh::NUM_SUPPORTED_LODS {
        let mesh = build_mesh(&grid, &mesh_settings, lod);
        assert!(mesh.triangle_count() > 0);
        assert!(mesh.normals.iter().all(|n| n.y > 0.0), "lod {lod}");
    }
}

#[test]
fn brush_is_reused_across_tiles() {
    let settings = HeightMapSettings { erode: true, ..HeightMapSettings::default() };
    let mut sim = ErosionSimulator::new(ErosionParams { iteration_count: 500, ..ErosionParams::default() });
    for x in 0..3 {
        build_height_map(53, &settings, Some(&mut sim), Vec2::new(x as f32 * 50.0, 0.0));
    }
    assert_eq!(sim.brush_builds(), 1);
}

#[test]
fn neighbouring_tiles_share_an_edge_in_global_mode() {
    let mut settings = HeightMapSettings::default();
    settings.noise.normalize_mode = relief_core::noise::params::NormalizeMode::Global;
    // Tiles of 50 cells: the last column of one is the first of the next,
    // shifted by the tile width in sample space.
    let a = generate_noise_map(51, 51, &settings.noise, Vec2::ZERO);
    let b = generate_noise_map(51, 51, &settings.noise, Vec2::new(50.0, 0.0));
    for r in 0..51 {
        assert!((a.get(r, 50) - b.get(r, 0)).abs() < 1e-4);
    }
}

#[test]
fn neighbouring_tile_meshes_meet_across_lods() {
    let mesh_settings = MeshSettings::default();
    let n = mesh_settings.num_vertices_per_line();
    let mut settings = HeightMapSettings::default();
    settings.noise.normalize_mode = relief_core::noise::params::NormalizeMode::Global;

    let left = build_height_map(n, &settings, None, Vec2::ZERO);
    let right = build_height_map(n, &settings, None, Vec2::new((n - 3) as f32, 0.0));
    let left_mesh = build_mesh(&left, &mesh_settings, 1);
    let right_mesh = build_mesh(&right, &mesh_settings, 2);

    // Heights along one vertical tile edge, ordered by uv.y.
    let column = |mesh: &relief_core::MeshData, u: f32| {
        let mut edge: Vec<(f32, f32)> = mesh
            .uvs
            .iter()
            .zip(&mesh.vertices)
            .filter(|(uv, _)| uv.x == u)
            .map(|(uv, v)| (uv.y, v.y))
            .collect();
        edge.sort_by(|a, b| a.0.total_cmp(&b.0));
        edge
    };
    let a = column(&left_mesh, 1.0);
    let b = column(&right_mesh, 0.0);
    assert_eq!(a.len(), n - 2);
    assert_eq!(a.len(), b.len());
    for ((va, ha), (vb, hb)) in a.iter().zip(&b) {
        assert_eq!(va, vb);
        assert!((ha - hb).abs() < 1e-3, "v {va}: {ha} vs {hb}");
    }
}

#[test]
fn streaming_session_from_json_config() {
    let json = r#"{
        "height_map": { "height_scale": 30.0, "erode": true },
        "erosion": { "iteration_count": 2000 },
        "streaming": { "worker_threads": 2 }
    }"#;
    let mut config = TerrainConfig::from_json_str(json).unwrap();
    config.streaming.detail_levels = LodThresholds::new(vec![LodInfo::new(0, 80.0), LodInfo::new(2, 150.0)]);

    let mut controller = StreamingController::new(&config).unwrap();
    controller.tick(Vec2::ZERO);
    controller.wait_idle(Duration::from_secs(120));
    controller.tick(Vec2::ZERO);

    let origin = controller.store().tile(TileCoord::new(0, 0)).unwrap();
    assert!(origin.is_visible());
    let mesh = origin.displayed_mesh().unwrap();
    assert_eq!(mesh.vertex_count(), 51 * 51);

    let events = controller.drain_events();
    assert!(events.iter().any(|e| matches!(e, TileEvent::MeshDisplayed { coord, .. } if *coord == TileCoord::new(0, 0))));
    assert!(!events.iter().any(|e| matches!(e, TileEvent::GenerationFailed { .. })));
}

#[test]
fn shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/terrain.json");
    let config = TerrainConfig::load(path).unwrap();
    assert_eq!(config.mesh.num_vertices_per_line(), 101);
    assert_eq!(config.streaming.detail_levels.len(), 3);
    assert!(config.height_map.height_curve.is_monotonic());
}
