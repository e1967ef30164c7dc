//! Bake a `Geometry` node into an [`OrbMesh`].
//!
//! Layer elements (normals, tangents, UVs, material slots) are resolved
//! through their mapping and reference modes. Normals and tangents are
//! accumulated per control point and renormalized; a control point that
//! carries several UVs is split into one vertex per distinct UV.

use std::collections::HashMap;

use glam::Vec3;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::tree::{FbxNode, FbxProperty};
use crate::resource::{fan_triangulate, NgonPolicy, OrbMesh, Submesh, Vertex};
use crate::util::{canonical_bits, Error, Result};

/// How a layer element's values are attached to the geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapping {
    ByControlPoint,
    ByPolygonVertex,
    ByPolygon,
    AllSame,
}

impl Mapping {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ByVertex" | "ByVertice" | "ByControlPoint" => Some(Self::ByControlPoint),
            "ByPolygonVertex" => Some(Self::ByPolygonVertex),
            "ByPolygon" => Some(Self::ByPolygon),
            "AllSame" => Some(Self::AllSame),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reference {
    Direct,
    IndexToDirect,
}

impl Reference {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Direct" => Some(Self::Direct),
            "IndexToDirect" | "Index" => Some(Self::IndexToDirect),
            _ => None,
        }
    }
}

/// Where a polygon corner sits, for layer element lookups.
#[derive(Clone, Copy, Debug)]
struct Corner {
    control_point: usize,
    polygon_vertex: usize,
    polygon: usize,
}

/// A decoded `LayerElement*` node.
#[derive(Clone, Debug)]
pub struct LayerElement {
    pub mapping: Mapping,
    pub reference: Reference,
    pub values: Vec<f64>,
    pub indices: Vec<i32>,
    pub width: usize,
}

impl LayerElement {
    /// Read `element` (e.g. `LayerElementNormal`) from a geometry. Unknown
    /// mapping or reference modes drop the element.
    pub fn read(
        geometry: &FbxNode,
        element: &str,
        values: &str,
        index: &str,
        width: usize,
    ) -> Result<Option<Self>> {
        let Some(node) = geometry.child(element) else {
            return Ok(None);
        };
        let mapping_name = node.child_str("MappingInformationType").unwrap_or("ByPolygonVertex");
        let reference_name = node.child_str("ReferenceInformationType").unwrap_or("Direct");
        let (Some(mapping), Some(reference)) = (Mapping::parse(mapping_name), Reference::parse(reference_name))
        else {
            debug!(element, mapping_name, reference_name, "unsupported layer element mode");
            return Ok(None);
        };

        let values = node
            .child(values)
            .and_then(|n| n.property(0))
            .and_then(FbxProperty::to_f64_vec)
            .ok_or_else(|| Error::corrupted(format!("{} without {} array", element, values)))?;
        let indices = node
            .child(index)
            .and_then(|n| n.property(0))
            .and_then(FbxProperty::to_i32_vec)
            .unwrap_or_default();
        if reference == Reference::IndexToDirect && indices.is_empty() {
            return Err(Error::corrupted(format!("{} is IndexToDirect without {}", element, index)));
        }

        Ok(Some(Self { mapping, reference, values, indices, width }))
    }

    fn len(&self) -> usize {
        self.values.len() / self.width
    }

    fn value(&self, corner: Corner) -> Result<&[f64]> {
        let slot = match self.mapping {
            Mapping::ByControlPoint => corner.control_point,
            Mapping::ByPolygonVertex => corner.polygon_vertex,
            Mapping::ByPolygon => corner.polygon,
            Mapping::AllSame => 0,
        };
        let index = match self.reference {
            Reference::Direct => slot,
            Reference::IndexToDirect => {
                let raw = *self.indices.get(slot).ok_or_else(|| {
                    Error::corrupted(format!("layer element index {} out of range", slot))
                })?;
                usize::try_from(raw)
                    .map_err(|_| Error::corrupted(format!("negative layer element index {}", raw)))?
            }
        };
        if index >= self.len() {
            return Err(Error::corrupted(format!(
                "layer element value {} out of range (0..{})",
                index,
                self.len()
            )));
        }
        Ok(&self.values[index * self.width..(index + 1) * self.width])
    }

    fn vec3(&self, corner: Corner) -> Result<Vec3> {
        let v = self.value(corner)?;
        Ok(Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32))
    }
}

/// `LayerElementMaterial`: a material slot per polygon or for all of them.
#[derive(Clone, Debug)]
struct MaterialSlots {
    mapping: Mapping,
    slots: Vec<i32>,
}

impl MaterialSlots {
    fn read(geometry: &FbxNode) -> Option<Self> {
        let node = geometry.child("LayerElementMaterial")?;
        let mapping = Mapping::parse(node.child_str("MappingInformationType").unwrap_or("AllSame"))?;
        let slots = node.child("Materials")?.property(0)?.to_i32_vec()?;
        Some(Self { mapping, slots })
    }

    fn slot(&self, polygon: usize) -> i32 {
        match self.mapping {
            Mapping::ByPolygon => self.slots.get(polygon).copied().unwrap_or(0),
            _ => self.slots.first().copied().unwrap_or(0),
        }
    }
}

/// Control point indices of one polygon.
pub type Polygon = SmallVec<[usize; 4]>;

/// Split polygons out of `PolygonVertexIndex`, where a negative value `v`
/// closes the polygon and stands for control point `!v`.
pub fn split_polygons(indices: &[i32]) -> Vec<Polygon> {
    let mut polygons = Vec::new();
    let mut current = Polygon::new();
    for &raw in indices {
        if raw < 0 {
            current.push(!raw as usize);
            polygons.push(std::mem::take(&mut current));
        } else {
            current.push(raw as usize);
        }
    }
    if !current.is_empty() {
        trace!(corners = current.len(), "unterminated trailing polygon");
        polygons.push(current);
    }
    polygons
}

/// Bake `geometry` into a mesh named `name`.
///
/// `materials` lists the material names connected to the owning model, in
/// slot order. Returns `None` for geometry without control points or faces.
pub fn bake_mesh(
    name: &str,
    geometry: &FbxNode,
    materials: &[String],
    unit_scale: f32,
    policy: &mut NgonPolicy,
) -> Result<Option<OrbMesh>> {
    let Some(positions) = geometry
        .child("Vertices")
        .and_then(|n| n.property(0))
        .and_then(FbxProperty::to_f64_vec)
    else {
        debug!(name, "geometry without vertices");
        return Ok(None);
    };
    let polygon_indices = geometry
        .child("PolygonVertexIndex")
        .and_then(|n| n.property(0))
        .and_then(FbxProperty::to_i32_vec)
        .unwrap_or_default();

    let control_points: Vec<Vec3> = positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) * unit_scale)
        .collect();
    if control_points.is_empty() || polygon_indices.is_empty() {
        return Ok(None);
    }

    let normals = LayerElement::read(geometry, "LayerElementNormal", "Normals", "NormalsIndex", 3)?;
    let tangents = LayerElement::read(geometry, "LayerElementTangent", "Tangents", "TangentsIndex", 3)?;
    let uvs = LayerElement::read(geometry, "LayerElementUV", "UV", "UVIndex", 2)?;
    let slots = MaterialSlots::read(geometry);

    let mut normal_sum = vec![Vec3::ZERO; control_points.len()];
    let mut tangent_sum = vec![Vec3::ZERO; control_points.len()];

    // Vertex pool starts as one vertex per control point; UV splits append.
    let mut source: Vec<usize> = (0..control_points.len()).collect();
    let mut uv_of: Vec<Option<[f32; 2]>> = vec![None; control_points.len()];
    let mut split: HashMap<(usize, [u32; 2]), u32> = HashMap::new();

    // Triangles grouped by material slot, in order of first use.
    let mut groups: Vec<(i32, Vec<u32>)> = Vec::new();

    let mut polygon_vertex = 0usize;
    for (polygon, cps) in split_polygons(&polygon_indices).into_iter().enumerate() {
        let mut face: SmallVec<[u32; 4]> = SmallVec::with_capacity(cps.len());
        for &control_point in &cps {
            if control_point >= control_points.len() {
                return Err(Error::corrupted(format!(
                    "mesh '{}' references control point {} of {}",
                    name,
                    control_point,
                    control_points.len()
                )));
            }
            let corner = Corner { control_point, polygon_vertex, polygon };
            polygon_vertex += 1;

            if let Some(layer) = &normals {
                normal_sum[control_point] += layer.vec3(corner)?;
            }
            if let Some(layer) = &tangents {
                tangent_sum[control_point] += layer.vec3(corner)?;
            }

            let vertex = match &uvs {
                Some(layer) => {
                    let v = layer.value(corner)?;
                    let uv = [v[0] as f32, v[1] as f32];
                    assign_uv(control_point, uv, &mut uv_of, &mut source, &mut split)
                }
                None => control_point as u32,
            };
            face.push(vertex);
        }

        if face.len() < 3 {
            trace!(name, polygon, corners = face.len(), "skipping degenerate polygon");
            continue;
        }
        if !policy.accept(name, face.len()) {
            return Err(Error::UnsupportedPolygon { mesh: name.to_string(), corners: face.len() });
        }

        let slot = slots.as_ref().map_or(0, |s| s.slot(polygon));
        let group = match groups.iter().position(|(s, _)| *s == slot) {
            Some(i) => i,
            None => {
                groups.push((slot, Vec::new()));
                groups.len() - 1
            }
        };
        for tri in fan_triangulate(&face) {
            groups[group].1.extend_from_slice(&tri);
        }
    }

    if groups.is_empty() {
        debug!(name, "geometry has no triangles");
        return Ok(None);
    }

    let vertices: Vec<Vertex> = source
        .iter()
        .zip(&uv_of)
        .map(|(&cp, uv)| Vertex {
            position: control_points[cp].to_array(),
            normal: normal_sum[cp].normalize_or_zero().to_array(),
            tangent: tangent_sum[cp].normalize_or_zero().to_array(),
            uv: uv.unwrap_or([0.0, 0.0]),
        })
        .collect();

    let vertex_count = vertices.len() as u64;
    let mut indices = Vec::new();
    let mut submeshes = Vec::with_capacity(groups.len());
    for (slot, triangles) in groups {
        let material = usize::try_from(slot).ok().and_then(|s| materials.get(s)).cloned();
        submeshes.push(Submesh {
            vertex_start: 0,
            vertex_count,
            index_start: indices.len() as u64,
            index_count: triangles.len() as u64,
            material,
        });
        indices.extend(triangles);
    }

    debug!(
        name,
        vertices = vertices.len(),
        triangles = indices.len() / 3,
        submeshes = submeshes.len(),
        "baked FBX geometry"
    );
    Ok(Some(OrbMesh {
        material: submeshes.iter().find_map(|s| s.material.clone()),
        vertices,
        indices,
        submeshes,
    }))
}

/// Vertex for `control_point` carrying `uv`, duplicating the control point
/// when it already carries a different UV.
fn assign_uv(
    control_point: usize,
    uv: [f32; 2],
    uv_of: &mut Vec<Option<[f32; 2]>>,
    source: &mut Vec<usize>,
    split: &mut HashMap<(usize, [u32; 2]), u32>,
) -> u32 {
    let key = (control_point, uv.map(canonical_bits));
    match uv_of[control_point] {
        None => {
            uv_of[control_point] = Some(uv);
            split.insert(key, control_point as u32);
            control_point as u32
        }
        Some(existing) if existing.map(canonical_bits) == key.1 => control_point as u32,
        Some(_) => *split.entry(key).or_insert_with(|| {
            source.push(control_point);
            uv_of.push(Some(uv));
            (source.len() - 1) as u32
        }),
    }
}
