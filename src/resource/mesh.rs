//! Triangle mesh resource and the helpers the readers share to build one.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use tracing::warn;

use crate::util::canonical_bits;

/// Interleaved vertex as stored in the container.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

/// Number of floats in a [`Vertex`].
pub const VERTEX_FLOATS: usize = 11;

/// Size of a [`Vertex`] in bytes.
pub const VERTEX_SIZE: usize = std::mem::size_of::<Vertex>();

impl Vertex {
    /// Hash key with exact-equality semantics (`-0.0 == 0.0`).
    fn key(&self) -> [u32; VERTEX_FLOATS] {
        let floats: [f32; VERTEX_FLOATS] = bytemuck::cast(*self);
        floats.map(canonical_bits)
    }
}

/// Contiguous vertex/index range drawn with one material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submesh {
    pub vertex_start: u64,
    pub vertex_count: u64,
    pub index_start: u64,
    pub index_count: u64,
    pub material: Option<String>,
}

/// Corner range of an unindexed triangle list that shares one material.
#[derive(Clone, Debug, PartialEq)]
pub struct CornerGroup {
    pub start: usize,
    pub count: usize,
    pub material: Option<String>,
}

/// Mesh resource. `indices` may be empty, in which case vertices form a plain
/// triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrbMesh {
    pub material: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
}

impl OrbMesh {
    /// Build a mesh from triangle corners, unifying identical vertices.
    ///
    /// When no two corners are equal, the index buffer is dropped and each
    /// group becomes a vertex range; otherwise each group becomes an index
    /// range over the shared vertex pool.
    pub fn from_corners(corners: Vec<Vertex>, groups: Vec<CornerGroup>) -> Self {
        let mut lookup: HashMap<[u32; VERTEX_FLOATS], u32> = HashMap::with_capacity(corners.len());
        let mut vertices = Vec::with_capacity(corners.len());
        let mut indices = Vec::with_capacity(corners.len());

        for corner in &corners {
            let index = *lookup.entry(corner.key()).or_insert_with(|| {
                vertices.push(*corner);
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }

        let material = groups.iter().find_map(|g| g.material.clone());

        if vertices.len() == corners.len() {
            let submeshes = groups
                .into_iter()
                .map(|g| Submesh {
                    vertex_start: g.start as u64,
                    vertex_count: g.count as u64,
                    index_start: 0,
                    index_count: 0,
                    material: g.material,
                })
                .collect();
            return Self {
                material,
                vertices: corners,
                indices: Vec::new(),
                submeshes,
            };
        }

        let vertex_count = vertices.len() as u64;
        let submeshes = groups
            .into_iter()
            .map(|g| Submesh {
                vertex_start: 0,
                vertex_count,
                index_start: g.start as u64,
                index_count: g.count as u64,
                material: g.material,
            })
            .collect();
        Self {
            material,
            vertices,
            indices,
            submeshes,
        }
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Number of triangles described by the mesh.
    pub fn triangle_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len() / 3
        } else {
            self.vertices.len() / 3
        }
    }
}

/// Fan-triangulate a polygon: `(p0, p1, p2), (p0, p2, p3), ...`.
pub fn fan_triangulate<T: Copy>(polygon: &[T]) -> impl Iterator<Item = [T; 3]> + '_ {
    (1..polygon.len().saturating_sub(1)).map(move |i| [polygon[0], polygon[i], polygon[i + 1]])
}

/// What to do with polygons of more than three corners.
///
/// One policy lives per reader, so the triangulation warning is printed once
/// per input file.
#[derive(Clone, Debug)]
pub struct NgonPolicy {
    triangulate: bool,
    warned: bool,
}

impl NgonPolicy {
    pub fn new(triangulate: bool) -> Self {
        Self { triangulate, warned: false }
    }

    /// Whether a polygon with `corners` corners may be stored. Triangles always
    /// pass; larger polygons pass only when triangulation is enabled.
    pub fn accept(&mut self, source: &str, corners: usize) -> bool {
        if corners <= 3 {
            return true;
        }
        if self.triangulate && !self.warned {
            warn!("{}: polygons with more than 3 vertices are fan-triangulated", source);
            self.warned = true;
        }
        self.triangulate
    }
}
