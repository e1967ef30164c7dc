//! FBX to intermediate conversion.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::geometry::bake_mesh;
use super::scene::{p70_f64, p70_vec3, FbxData, FbxObjectKind, FbxScene};
use super::tree::{FbxNode, FbxTree};
use crate::config::ConvertOptions;
use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::resource::{NgonPolicy, OrbMaterial, OrbTexture};
use crate::util::{sigmoid, Result};

/// Roughness sources, most specific first.
const ROUGHNESS_PROPERTIES: [&str; 4] = [
    "Maya|specularRoughness",
    "Roughness",
    "ShininessExponent",
    "Shininess",
];

/// Reads binary FBX files into an [`OrbIntermediate`].
#[derive(Debug)]
pub struct FbxReader {
    unit_scale: f32,
    triangulate: bool,
}

impl FbxReader {
    pub fn new(options: &ConvertOptions) -> Self {
        Self {
            unit_scale: options.fbx_unit_scale,
            triangulate: options.triangulate,
        }
    }

    /// Convert one file. Textures, materials and meshes are appended in that
    /// order; the extracted scene (including lights) is returned.
    pub fn read_file(&self, path: impl AsRef<Path>, out: &mut OrbIntermediate) -> Result<FbxScene> {
        let path = path.as_ref();
        let tree = FbxTree::open(path)?;
        self.read_tree(&path.display().to_string(), &tree, out)
    }

    /// Convert an already parsed tree. `source` names the input in logs.
    pub fn read_tree(&self, source: &str, tree: &FbxTree, out: &mut OrbIntermediate) -> Result<FbxScene> {
        let data = FbxData::load(tree)?;
        let scene = FbxScene::build(tree.version, &data);
        let mut policy = NgonPolicy::new(self.triangulate);

        // FBX id -> unique intermediate name
        let mut names: HashMap<i64, String> = HashMap::new();

        // (texture name, file) -> intermediate name
        let mut texture_names: HashMap<(String, String), String> = HashMap::new();
        for texture in data.objects_of(FbxObjectKind::Texture) {
            let Some(file) = texture_path(texture.node) else {
                debug!(texture = %texture.name, "texture without a file name");
                continue;
            };
            let key = (texture.name.clone(), file);
            if let Some(existing) = texture_names.get(&key) {
                names.insert(texture.id, existing.clone());
                continue;
            }
            let name = out.unique_name(&texture.name);
            out.append_object(name.clone(), OrbValue::Texture(OrbTexture::reference(key.1.clone())))?;
            texture_names.insert(key, name.clone());
            names.insert(texture.id, name);
        }

        for material in data.objects_of(FbxObjectKind::Material) {
            let mut value = read_material(material.node);
            for (channel, texture_id) in scene.material_textures.get(&material.id).into_iter().flatten() {
                if let Some(texture) = names.get(texture_id) {
                    value.set_texture(*channel, texture.clone());
                }
            }
            let name = out.unique_name(&material.name);
            out.append_object(name.clone(), OrbValue::Material(value))?;
            names.insert(material.id, name);
        }

        let mut meshes = 0usize;
        for model in &scene.models {
            let materials: Vec<String> = model
                .materials
                .iter()
                .filter_map(|id| names.get(id).cloned())
                .collect();
            for geometry_id in &model.geometries {
                let Some(geometry) = data.get(*geometry_id) else {
                    continue;
                };
                if geometry.class != "Mesh" {
                    debug!(class = %geometry.class, "skipping non-mesh geometry");
                    continue;
                }
                let Some(mesh) = bake_mesh(&model.name, geometry.node, &materials, self.unit_scale, &mut policy)?
                else {
                    continue;
                };
                let name = out.unique_name(&model.name);
                out.append_object(name, OrbValue::Mesh(mesh))?;
                meshes += 1;
            }
        }

        for light in &scene.lights {
            debug!(model = %light.model, kind = ?light.light_type, "light has no container representation");
        }
        if !scene.lights.is_empty() {
            warn!("{}: {} light(s) not converted", source, scene.lights.len());
        }
        info!(
            "{}: FBX {} with {} model(s), {} mesh(es)",
            source,
            tree.version,
            scene.models.len(),
            meshes
        );
        Ok(scene)
    }
}

fn texture_path(node: &FbxNode) -> Option<String> {
    ["RelativeFilename", "FileName"]
        .iter()
        .filter_map(|key| node.child_str(key))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Material values from `Properties70`.
fn read_material(node: &FbxNode) -> OrbMaterial {
    let mut material = OrbMaterial::default();

    if let Some(color) = p70_vec3(node, "DiffuseColor") {
        let factor = p70_f64(node, "DiffuseFactor").map_or(1.0, |f| f.clamp(0.0, 1.0) as f32);
        let alpha = match p70_f64(node, "Opacity") {
            Some(opacity) => opacity as f32,
            None => p70_f64(node, "TransparencyFactor").map_or(1.0, |t| 1.0 - t as f32),
        };
        material.diffuse = (color * factor).extend(alpha);
    }
    if let Some(color) = p70_vec3(node, "SpecularColor") {
        let factor = p70_f64(node, "SpecularFactor").unwrap_or(1.0) as f32;
        material.specular = (color * factor).extend(1.0);
    }
    if let Some(raw) = ROUGHNESS_PROPERTIES.iter().find_map(|p| p70_f64(node, p)) {
        material.roughness = sigmoid(raw as f32);
    }
    material
}
