//! Mesh buffers and normal baking.
use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec3};

/// A finished, renderable tile mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle list into `vertices`.
    pub indices: Vec<u32>,
    /// One unit normal per vertex.
    pub normals: Vec<Vec3>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Edge-connection vertex whose normal is blended from two main vertices.
#[derive(Debug, Clone, Copy)]
struct AveragedNormal {
    vertex: u32,
    a: u32,
    b: u32,
    weight_of_b: f32,
}

/// Scratch buffers filled by the builder.
///
/// Vertex ids are signed: `id >= 0` is a mesh vertex, `id < 0` is border
/// vertex `-id - 1`. Border geometry is dropped by [`MeshBuffers::bake`].
#[derive(Debug)]
pub(crate) struct MeshBuffers {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
    border_vertices: Vec<Vec3>,
    border_indices: Vec<i32>,
    averaged_normals: Vec<AveragedNormal>,
}

impl MeshBuffers {
    pub fn new(mesh_vertices: usize, border_vertices: usize) -> Self {
        Self {
            vertices: vec![Vec3::ZERO; mesh_vertices],
            uvs: vec![Vec2::ZERO; mesh_vertices],
            indices: Vec::new(),
            border_vertices: vec![Vec3::ZERO; border_vertices],
            border_indices: Vec::new(),
            averaged_normals: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, id: i32, position: Vec3, uv: Vec2) {
        if id < 0 {
            self.border_vertices[(-id - 1) as usize] = position;
        } else {
            self.vertices[id as usize] = position;
            self.uvs[id as usize] = uv;
        }
    }

    pub fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.border_indices.extend_from_slice(&[a, b, c]);
        } else {
            self.indices.extend_from_slice(&[a as u32, b as u32, c as u32]);
        }
    }

    /// Both endpoints must be mesh vertices.
    pub fn add_averaged_normal(&mut self, vertex: i32, a: i32, b: i32, weight_of_b: f32) {
        debug_assert!(vertex >= 0 && a >= 0 && b >= 0);
        self.averaged_normals.push(AveragedNormal {
            vertex: vertex as u32,
            a: a as u32,
            b: b as u32,
            weight_of_b,
        });
    }

    fn position(&self, id: i32) -> Vec3 {
        if id < 0 {
            self.border_vertices[(-id - 1) as usize]
        } else {
            self.vertices[id as usize]
        }
    }

    fn face_normal(&self, a: i32, b: i32, c: i32) -> Vec3 {
        let pa = self.position(a);
        (self.position(b) - pa).cross(self.position(c) - pa)
    }

    /// Compute normals and drop border geometry.
    ///
    /// Face normals are accumulated unnormalized, so larger triangles weigh
    /// more. Edge-connection vertices then take the blend of their two main
    /// vertices' normals, matching how their heights were placed.
    pub fn bake(mut self) -> MeshData {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as i32, tri[1] as i32, tri[2] as i32);
            let n = self.face_normal(a, b, c);
            for v in [a, b, c] {
                normals[v as usize] += n;
            }
        }
        for tri in self.border_indices.chunks_exact(3) {
            let n = self.face_normal(tri[0], tri[1], tri[2]);
            for &v in tri {
                if v >= 0 {
                    normals[v as usize] += n;
                }
            }
        }
        for n in &mut normals {
            *n = n.normalize();
        }

        self.averaged_normals.sort_by_key(|e| e.vertex);
        for e in &self.averaged_normals {
            let blended = normals[e.a as usize] * (1.0 - e.weight_of_b) + normals[e.b as usize] * e.weight_of_b;
            normals[e.vertex as usize] = blended;
        }

        MeshData {
            vertices: self.vertices,
            uvs: self.uvs,
            indices: self.indices,
            normals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_triangles_are_kept_out_of_the_index_list() {
        let mut buf = MeshBuffers::new(2, 1);
        buf.add_vertex(0, Vec3::new(0.0, 0.0, 0.0), Vec2::ZERO);
        buf.add_vertex(1, Vec3::new(1.0, 0.0, 0.0), Vec2::ZERO);
        buf.add_vertex(-1, Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO);
        buf.add_triangle(0, 1, -1);
        let mesh = buf.bake();
        assert!(mesh.indices.is_empty());
        assert_eq!(mesh.vertex_count(), 2);
        // Border faces still light the mesh vertices.
        assert_eq!(mesh.normals[0], Vec3::UP);
        assert_eq!(mesh.normals[1], Vec3::UP);
    }
}
