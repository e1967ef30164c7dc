//! Fixed-function pipeline state resources.

use glam::Vec4;

use super::types::{
    AddressMode, BlendFactor, BlendOperation, ColorWriteMask, CullMode, FillMode, FilterMode,
    FormatType, InputClassification, PrimitiveTopology,
};

/// One vertex input element.
#[derive(Clone, Debug, PartialEq)]
pub struct InputElement {
    pub semantic: String,
    pub format: FormatType,
    pub classification: InputClassification,
    pub semantic_index: u32,
    pub slot: u32,
}

impl InputElement {
    pub fn new(semantic: impl Into<String>, format: FormatType) -> Self {
        Self {
            semantic: semantic.into(),
            format,
            classification: InputClassification::PerVertex,
            semantic_index: 0,
            slot: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrbInputLayout {
    pub elements: Vec<InputElement>,
}

/// Complete pipeline description. Every binding is a resource name.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbPipelineState {
    pub vertex_shader: Option<String>,
    pub pixel_shader: Option<String>,
    pub geometry_shader: Option<String>,
    pub hull_shader: Option<String>,
    pub domain_shader: Option<String>,
    pub input_layout: Option<String>,
    pub rasterizer_state: Option<String>,
    pub blend_state: Option<String>,
    pub topology: PrimitiveTopology,
    pub samplers: Vec<String>,
}

impl Default for OrbPipelineState {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            pixel_shader: None,
            geometry_shader: None,
            hull_shader: None,
            domain_shader: None,
            input_layout: None,
            rasterizer_state: None,
            blend_state: None,
            topology: PrimitiveTopology::TriangleList,
            samplers: Vec::new(),
        }
    }
}

impl OrbPipelineState {
    /// The eight stage/state bindings in container order.
    pub fn bindings(&self) -> [Option<&str>; 8] {
        [
            self.vertex_shader.as_deref(),
            self.pixel_shader.as_deref(),
            self.geometry_shader.as_deref(),
            self.hull_shader.as_deref(),
            self.domain_shader.as_deref(),
            self.input_layout.as_deref(),
            self.rasterizer_state.as_deref(),
            self.blend_state.as_deref(),
        ]
    }
}

/// Names of the pipeline bindings in container order.
pub const PIPELINE_BINDING_NAMES: [&str; 8] = [
    "vertex_shader",
    "pixel_shader",
    "geometry_shader",
    "hull_shader",
    "domain_shader",
    "input_layout",
    "rasterizer_state",
    "blend_state",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrbRasterizerState {
    pub fill: FillMode,
    pub cull: CullMode,
}

impl Default for OrbRasterizerState {
    fn default() -> Self {
        Self {
            fill: FillMode::Solid,
            cull: CullMode::Back,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbBlendState {
    pub enabled: bool,
    pub alpha_to_coverage: bool,
    /// Constant blend factor, if the state sets one.
    pub factor: Option<Vec4>,
    pub mask: ColorWriteMask,
    pub src_blend: BlendFactor,
    pub dst_blend: BlendFactor,
    pub blend_op: BlendOperation,
    pub src_blend_alpha: BlendFactor,
    pub dst_blend_alpha: BlendFactor,
    pub blend_op_alpha: BlendOperation,
}

impl Default for OrbBlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha_to_coverage: false,
            factor: None,
            mask: ColorWriteMask::ALL,
            src_blend: BlendFactor::One,
            dst_blend: BlendFactor::Zero,
            blend_op: BlendOperation::Add,
            src_blend_alpha: BlendFactor::One,
            dst_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrbSamplerState {
    pub filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
}

impl Default for OrbSamplerState {
    fn default() -> Self {
        Self {
            filter: FilterMode::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
        }
    }
}
