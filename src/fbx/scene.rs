//! Object graph layered over the FBX node tree.
//!
//! `Objects` children become [`FbxObject`]s keyed by their 64-bit id and
//! `Connections` become typed edges. Edges whose endpoints were never loaded
//! (the scene root, unsupported object kinds) are skipped.

use std::collections::HashMap;

use glam::Vec3;
use tracing::{debug, trace};

use super::format::object_name;
use super::tree::{FbxNode, FbxProperty, FbxTree};
use crate::resource::TextureChannel;
use crate::util::{Error, Result};

/// Object kinds the converter understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FbxObjectKind {
    Model,
    Attribute,
    Geometry,
    Material,
    Texture,
}

impl FbxObjectKind {
    /// Load order, and the node name of each kind under `Objects`.
    pub const LOAD_ORDER: [(FbxObjectKind, &'static str); 5] = [
        (FbxObjectKind::Model, "Model"),
        (FbxObjectKind::Attribute, "NodeAttribute"),
        (FbxObjectKind::Geometry, "Geometry"),
        (FbxObjectKind::Material, "Material"),
        (FbxObjectKind::Texture, "Texture"),
    ];
}

/// An object from the `Objects` section.
#[derive(Clone, Debug)]
pub struct FbxObject<'a> {
    pub id: i64,
    pub kind: FbxObjectKind,
    pub name: String,
    /// Subclass string (`"Mesh"`, `"Light"`, ...).
    pub class: String,
    pub node: &'a FbxNode,
}

/// Edge type of a connection record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    ObjectObject,
    ObjectProperty,
    PropertyObject,
    PropertyProperty,
}

impl ConnectionKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "OO" => Some(Self::ObjectObject),
            "OP" => Some(Self::ObjectProperty),
            "PO" => Some(Self::PropertyObject),
            "PP" => Some(Self::PropertyProperty),
            _ => None,
        }
    }
}

/// Connection from `child` (source) to `parent` (destination).
#[derive(Clone, Debug, PartialEq)]
pub struct FbxConnection {
    pub kind: ConnectionKind,
    pub child: i64,
    pub parent: i64,
    pub property: Option<String>,
}

/// Objects and connections of one file, borrowing the parsed tree.
#[derive(Debug, Default)]
pub struct FbxData<'a> {
    objects: Vec<FbxObject<'a>>,
    by_id: HashMap<i64, usize>,
    pub connections: Vec<FbxConnection>,
}

impl<'a> FbxData<'a> {
    /// Load objects (models, attributes, geometries, materials, textures, in
    /// that order) and then connections.
    pub fn load(tree: &'a FbxTree) -> Result<Self> {
        let objects_node = tree
            .find_child("Objects", 0)
            .ok_or_else(|| Error::corrupted("FBX file has no Objects section"))?;

        let mut data = FbxData::default();
        for (kind, node_name) in FbxObjectKind::LOAD_ORDER {
            for node in objects_node.children_named(node_name) {
                data.load_object(kind, node)?;
            }
        }

        if let Some(connections) = tree.find_child("Connections", 0) {
            for record in connections.children_named("C") {
                if let Some(c) = parse_connection(record) {
                    data.connections.push(c);
                } else {
                    trace!("skipping malformed connection record");
                }
            }
        }
        debug!(
            objects = data.objects.len(),
            connections = data.connections.len(),
            "loaded FBX object graph"
        );
        Ok(data)
    }

    fn load_object(&mut self, kind: FbxObjectKind, node: &'a FbxNode) -> Result<()> {
        let id = node
            .property(0)
            .and_then(FbxProperty::as_i64)
            .ok_or_else(|| Error::corrupted(format!("{} object without an id", node.name)))?;
        let name = node
            .property(1)
            .and_then(FbxProperty::as_str)
            .map(|s| object_name(s).to_string())
            .unwrap_or_default();
        let class = node
            .property(2)
            .and_then(FbxProperty::as_str)
            .unwrap_or_default()
            .to_string();

        self.by_id.insert(id, self.objects.len());
        self.objects.push(FbxObject { id, kind, name, class, node });
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<&FbxObject<'a>> {
        self.by_id.get(&id).map(|&i| &self.objects[i])
    }

    /// Objects in load order.
    pub fn objects(&self) -> &[FbxObject<'a>] {
        &self.objects
    }

    pub fn objects_of(&self, kind: FbxObjectKind) -> impl Iterator<Item = &FbxObject<'a>> {
        self.objects.iter().filter(move |o| o.kind == kind)
    }
}

fn parse_connection(record: &FbxNode) -> Option<FbxConnection> {
    let kind = ConnectionKind::parse(record.property(0)?.as_str()?)?;
    let child = record.property(1)?.as_i64()?;
    let parent = record.property(2)?.as_i64()?;
    let property = record
        .property(3)
        .and_then(FbxProperty::as_str)
        .map(str::to_string);
    Some(FbxConnection { kind, child, parent, property })
}

/// A model with everything connected to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FbxModel {
    pub id: i64,
    pub name: String,
    pub parent: Option<i64>,
    pub children: Vec<i64>,
    pub geometries: Vec<i64>,
    pub materials: Vec<i64>,
    pub attributes: Vec<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FbxLightType {
    Point,
    Directional,
    Spot,
    Area,
    Volume,
}

impl FbxLightType {
    fn from_fbx(value: i64) -> Self {
        match value {
            1 => Self::Directional,
            2 => Self::Spot,
            3 => Self::Area,
            4 => Self::Volume,
            _ => Self::Point,
        }
    }
}

/// Light attribute attached to a model.
#[derive(Clone, Debug, PartialEq)]
pub struct FbxLight {
    pub model: String,
    pub light_type: FbxLightType,
    pub color: Vec3,
    pub intensity: f32,
    pub falloff: f32,
    /// Outer cone angle in degrees (spot lights).
    pub angle: f32,
}

/// Resolved scene: models, material texture links and lights.
#[derive(Clone, Debug, Default)]
pub struct FbxScene {
    pub version: u32,
    pub models: Vec<FbxModel>,
    /// Material id -> (channel, texture id), in connection order.
    pub material_textures: HashMap<i64, Vec<(TextureChannel, i64)>>,
    pub lights: Vec<FbxLight>,
    model_index: HashMap<i64, usize>,
}

impl FbxScene {
    /// Classify every connection by the kinds of its endpoints.
    pub fn build(version: u32, data: &FbxData<'_>) -> Self {
        let mut scene = FbxScene { version, ..Default::default() };

        for model in data.objects_of(FbxObjectKind::Model) {
            scene.model_entry(model.id, &model.name);
        }

        for connection in &data.connections {
            let (Some(child), Some(parent)) = (data.get(connection.child), data.get(connection.parent))
            else {
                trace!(child = connection.child, parent = connection.parent, "dangling connection");
                continue;
            };

            match (child.kind, parent.kind) {
                (FbxObjectKind::Model, FbxObjectKind::Model) => {
                    scene.model_entry(child.id, &child.name).parent = Some(parent.id);
                    scene.model_entry(parent.id, &parent.name).children.push(child.id);
                }
                (FbxObjectKind::Attribute, FbxObjectKind::Model) => {
                    scene.model_entry(parent.id, &parent.name).attributes.push(child.id);
                    if child.class == "Light" {
                        scene.lights.push(read_light(&parent.name, child.node));
                    } else {
                        trace!(class = %child.class, "ignoring node attribute");
                    }
                }
                (FbxObjectKind::Geometry, FbxObjectKind::Model) => {
                    scene.model_entry(parent.id, &parent.name).geometries.push(child.id);
                }
                (FbxObjectKind::Material, FbxObjectKind::Model) => {
                    scene.model_entry(parent.id, &parent.name).materials.push(child.id);
                }
                (FbxObjectKind::Texture, FbxObjectKind::Material) => {
                    let property = connection.property.as_deref().unwrap_or("");
                    match classify_texture_channel(property) {
                        Some(channel) => scene
                            .material_textures
                            .entry(parent.id)
                            .or_default()
                            .push((channel, child.id)),
                        None => debug!(property, "texture bound to unsupported material channel"),
                    }
                }
                _ => trace!(?child.kind, ?parent.kind, "ignoring connection"),
            }
        }
        scene
    }

    /// Fetch the model for `id`, inserting an empty one on first use.
    fn model_entry(&mut self, id: i64, name: &str) -> &mut FbxModel {
        let index = match self.model_index.get(&id) {
            Some(&i) => i,
            None => {
                self.models.push(FbxModel {
                    id,
                    name: name.to_string(),
                    ..Default::default()
                });
                self.model_index.insert(id, self.models.len() - 1);
                self.models.len() - 1
            }
        };
        &mut self.models[index]
    }

    pub fn model(&self, id: i64) -> Option<&FbxModel> {
        self.model_index.get(&id).map(|&i| &self.models[i])
    }
}

/// Map a material property name (FBX or Maya naming) to a texture channel.
pub fn classify_texture_channel(property: &str) -> Option<TextureChannel> {
    let p = property.to_ascii_lowercase();
    if p.contains("normal") || p.contains("bump") {
        Some(TextureChannel::Normal)
    } else if p.contains("rough") || p.contains("shininess") || p.contains("gloss") {
        Some(TextureChannel::Roughness)
    } else if p.contains("occlusion") || p.contains("ambient") || p.ends_with("ao_map") {
        Some(TextureChannel::Occlusion)
    } else if p.contains("specular")
        || p.contains("emissive")
        || p.contains("transparen")
        || p.contains("reflection")
    {
        None
    } else if p.contains("diffuse") || p.contains("color") || p.contains("albedo") {
        Some(TextureChannel::Color)
    } else {
        None
    }
}

/// Values of a `Properties70` entry (the properties after name, type, label
/// and flags).
pub fn p70_values<'n>(node: &'n FbxNode, name: &str) -> Option<&'n [FbxProperty]> {
    node.child("Properties70")?
        .children_named("P")
        .find(|p| p.property(0).and_then(FbxProperty::as_str) == Some(name))
        .map(|p| p.properties.get(4..).unwrap_or(&[]))
}

/// Scalar `Properties70` value.
pub fn p70_f64(node: &FbxNode, name: &str) -> Option<f64> {
    p70_values(node, name)?.first()?.as_f64()
}

/// Three-component `Properties70` value (colors, vectors).
pub fn p70_vec3(node: &FbxNode, name: &str) -> Option<Vec3> {
    let values = p70_values(node, name)?;
    let x = values.first()?.as_f64()?;
    let y = values.get(1)?.as_f64()?;
    let z = values.get(2)?.as_f64()?;
    Some(Vec3::new(x as f32, y as f32, z as f32))
}

fn read_light(model: &str, node: &FbxNode) -> FbxLight {
    let light_type = p70_values(node, "LightType")
        .and_then(|v| v.first())
        .and_then(FbxProperty::as_i64)
        .map_or(FbxLightType::Point, FbxLightType::from_fbx);
    let falloff = p70_f64(node, "FarAttenuationEnd")
        .or_else(|| p70_f64(node, "DecayStart"))
        .unwrap_or(0.0);
    let angle = p70_f64(node, "OuterAngle")
        .or_else(|| p70_f64(node, "Cone angle"))
        .unwrap_or(0.0);
    FbxLight {
        model: model.to_string(),
        light_type,
        color: p70_vec3(node, "Color").unwrap_or(Vec3::ONE),
        intensity: p70_f64(node, "Intensity").unwrap_or(100.0) as f32,
        falloff: falloff as f32,
        angle: angle as f32,
    }
}
