//! In-memory collection of named resources awaiting serialization.
//!
//! Readers append objects in the order they encounter them; the container
//! writer consumes the whole sequence once. Cross references between objects
//! are by name and become relative offsets (`target - referrer`) in the file.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::resource::*;
use crate::util::{Error, Result};

/// Payload of an [`OrbObject`].
#[derive(Clone, Debug, PartialEq)]
pub enum OrbValue {
    Material(OrbMaterial),
    Mesh(OrbMesh),
    Texture(OrbTexture),
    ShaderCode(OrbShaderCode),
    InputLayout(OrbInputLayout),
    PipelineState(OrbPipelineState),
    ShaderBinary(OrbShaderBinary),
    RasterizerState(OrbRasterizerState),
    BlendState(OrbBlendState),
    SamplerState(OrbSamplerState),
}

impl OrbValue {
    /// Container type tag for this payload.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Material(_) => ResourceType::Material,
            Self::Mesh(_) => ResourceType::Mesh,
            Self::Texture(t) if t.only_reference => ResourceType::TextureReference,
            Self::Texture(_) => ResourceType::Texture,
            Self::ShaderCode(s) if s.compile.is_some() => ResourceType::ShaderBinary,
            Self::ShaderCode(_) => ResourceType::ShaderCode,
            Self::InputLayout(_) => ResourceType::InputLayout,
            Self::PipelineState(_) => ResourceType::PipelineState,
            Self::ShaderBinary(_) => ResourceType::ShaderBinary,
            Self::RasterizerState(_) => ResourceType::RasterizerState,
            Self::BlendState(_) => ResourceType::BlendState,
            Self::SamplerState(_) => ResourceType::SamplerState,
        }
    }

    /// Names of other resources this payload refers to.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Material(m) => TextureChannel::ALL.iter().filter_map(|c| m.texture(*c)).collect(),
            Self::Mesh(m) => m
                .material
                .as_deref()
                .into_iter()
                .chain(m.submeshes.iter().filter_map(|s| s.material.as_deref()))
                .collect(),
            Self::PipelineState(p) => p
                .bindings()
                .into_iter()
                .flatten()
                .chain(p.samplers.iter().map(String::as_str))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A named resource. Equality and ordering consider the name only.
#[derive(Clone, Debug)]
pub struct OrbObject {
    pub name: String,
    pub value: OrbValue,
}

impl OrbObject {
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.value.resource_type()
    }
}

impl PartialEq for OrbObject {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for OrbObject {}

impl PartialOrd for OrbObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrbObject {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// Ordered, name-indexed resource collection for one conversion run.
#[derive(Debug, Default)]
pub struct OrbIntermediate {
    objects: Vec<OrbObject>,
    by_name: HashMap<String, usize>,
}

impl OrbIntermediate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object. Names must be unique within the intermediate.
    pub fn append_object(&mut self, name: impl Into<String>, value: OrbValue) -> Result<usize> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        let index = self.objects.len();
        self.by_name.insert(name.clone(), index);
        self.objects.push(OrbObject { name, value });
        Ok(index)
    }

    /// Return `base` if unused, otherwise the first free `base.N`.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}.{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn objects(&self) -> &[OrbObject] {
        &self.objects
    }

    pub fn get(&self, name: &str) -> Option<&OrbObject> {
        self.index_of(name).map(|i| &self.objects[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut OrbObject> {
        let index = self.index_of(name)?;
        Some(&mut self.objects[index])
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Container type of the object at `index`.
    pub fn object_type(&self, index: usize) -> Option<ResourceType> {
        self.objects.get(index).map(OrbObject::resource_type)
    }

    /// Signed distance from the object at `from` to the object named `name`.
    pub fn offset_from_name(&self, from: usize, name: &str) -> Option<i64> {
        self.index_of(name).map(|target| target as i64 - from as i64)
    }
}
