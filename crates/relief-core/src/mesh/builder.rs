//! Mesh construction from a bordered height grid.
//!
//! Grid cells are addressed `(x, y)` with `x` the column; the height of a
//! vertex is `grid.get(y, x)`.
use tracing::warn;

use super::data::{MeshBuffers, MeshData};
use super::{skip_increment, MeshSettings, NUM_SUPPORTED_LODS};
use crate::heightfield::HeightGrid;
use crate::math::{Vec2, Vec3};

/// Marks grid cells that produce no vertex at this LOD.
const SKIPPED: i32 = i32::MIN;

/// How a grid cell takes part in the mesh at a given LOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexKind {
    /// Ring 0: only used for normals.
    Border,
    /// Ring 1: the visible tile edge, always at full resolution.
    MeshEdge,
    /// On the coarse lattice of this LOD.
    Main,
    /// Ring 2 or ring `n-3` vertex between two main vertices.
    EdgeConnection,
    Skipped,
}

struct Layout {
    n: usize,
    skip: usize,
}

impl Layout {
    fn kind(&self, x: usize, y: usize) -> VertexKind {
        let n = self.n;
        let skip = self.skip;
        if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
            return VertexKind::Border;
        }
        if x == 1 || y == 1 || x == n - 2 || y == n - 2 {
            return VertexKind::MeshEdge;
        }
        let on_lattice = (x - 2) % skip == 0 && (y - 2) % skip == 0;
        if on_lattice {
            return VertexKind::Main;
        }
        if x == 2 || y == 2 || x == n - 3 || y == n - 3 {
            return VertexKind::EdgeConnection;
        }
        VertexKind::Skipped
    }
}

/// Build the mesh for `grid` at detail level `lod`.
///
/// `grid` must be square with side `settings.num_vertices_per_line()`;
/// any other grid gives an empty mesh. At LOD 0 every non-border cell becomes
/// a vertex; at LOD `k > 0` only every `2k`-th interior cell does, with the
/// outer two rings kept so the tile edge matches every other LOD exactly.
/// `lod` is clamped to the coarsest supported level.
pub fn build_mesh(grid: &HeightGrid, settings: &MeshSettings, lod: usize) -> MeshData {
    let n = settings.num_vertices_per_line();
    if grid.width != n || grid.height != n {
        warn!(width = grid.width, height = grid.height, expected = n, "height grid does not match mesh settings");
        return MeshData::default();
    }
    let lod = lod.min(NUM_SUPPORTED_LODS - 1);
    let layout = Layout { n, skip: skip_increment(lod) };
    let skip = layout.skip;
    let world_size = settings.mesh_world_size();
    let top_left = Vec2::new(-1.0, 1.0) * (world_size / 2.0);

    // ── Vertex ids ──────────────────────────────────────────────────────────
    let mut ids = vec![SKIPPED; n * n];
    let mut next_mesh = 0i32;
    let mut next_border = -1i32;
    for y in 0..n {
        for x in 0..n {
            match layout.kind(x, y) {
                VertexKind::Border => {
                    ids[y * n + x] = next_border;
                    next_border -= 1;
                }
                VertexKind::Skipped => {}
                _ => {
                    ids[y * n + x] = next_mesh;
                    next_mesh += 1;
                }
            }
        }
    }
    let id = |x: usize, y: usize| ids[y * n + x];

    let mut buffers = MeshBuffers::new(next_mesh as usize, (-next_border - 1) as usize);

    // ── Vertices and triangles ──────────────────────────────────────────────
    for y in 0..n {
        for x in 0..n {
            let kind = layout.kind(x, y);
            if kind == VertexKind::Skipped {
                continue;
            }
            let vertex = id(x, y);
            let percent = Vec2::new((x as f32 - 1.0) / (n - 3) as f32, (y as f32 - 1.0) / (n - 3) as f32);
            let mut height = grid.get(y, x);

            if kind == VertexKind::EdgeConnection {
                let vertical = x == 2 || x == n - 3;
                let dst_a = (if vertical { y - 2 } else { x - 2 }) % skip;
                let dst_b = skip - dst_a;
                let t = dst_a as f32 / skip as f32;
                let (ax, ay) = if vertical { (x, y - dst_a) } else { (x - dst_a, y) };
                let (bx, by) = if vertical { (x, y + dst_b) } else { (x + dst_b, y) };

                height = grid.get(ay, ax) * (1.0 - t) + grid.get(by, bx) * t;
                buffers.add_averaged_normal(vertex, id(ax, ay), id(bx, by), t);
            }

            let position = Vec3::new(top_left.x + percent.x * world_size, height, top_left.y - percent.y * world_size);
            buffers.add_vertex(vertex, position, percent);

            let emits_quad = x < n - 1
                && y < n - 1
                && (kind != VertexKind::EdgeConnection || (x != 2 && y != 2));
            if emits_quad {
                let step = if kind == VertexKind::Main && x != n - 3 && y != n - 3 { skip } else { 1 };
                let a = vertex;
                let b = id(x + step, y);
                let c = id(x, y + step);
                let d = id(x + step, y + step);
                buffers.add_triangle(a, d, c);
                buffers.add_triangle(d, a, b);
            }
        }
    }

    buffers.bake()
}
