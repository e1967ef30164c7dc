//! Resource payload encoding and decoding.

use std::fmt;
use std::io::{Read, Seek, Write};

use glam::Vec4;

use super::format::NO_REFERENCE;
use super::stream::{IStream, OStream};
use crate::resource::*;
use crate::util::{Error, Result};

/// Resolves resource names to relative offsets for one object of a batch.
pub trait ReferenceResolver {
    /// Offset to `name`, or [`NO_REFERENCE`] for `None`.
    fn offset(&self, name: Option<&str>) -> Result<i64>;
}

pub fn write_material<W: Write + Seek>(
    out: &mut OStream<W>,
    material: &OrbMaterial,
    refs: &impl ReferenceResolver,
) -> Result<()> {
    out.write_vec4(material.diffuse)?;
    out.write_vec4(material.specular)?;
    out.write_f32(material.roughness)?;
    out.write_u32(material.flags())?;
    for channel in TextureChannel::ALL {
        out.write_i64(refs.offset(material.texture(channel))?)?;
    }
    Ok(())
}

pub fn write_mesh<W: Write + Seek>(
    out: &mut OStream<W>,
    mesh: &OrbMesh,
    refs: &impl ReferenceResolver,
) -> Result<()> {
    out.write_i64(refs.offset(mesh.material.as_deref())?)?;
    out.write_u64(mesh.indices.len() as u64)?;
    out.write_u64(mesh.vertices.len() as u64)?;
    for &index in &mesh.indices {
        out.write_u32(index)?;
    }
    for &value in bytemuck::cast_slice::<Vertex, f32>(&mesh.vertices) {
        out.write_f32(value)?;
    }
    out.write_u32(mesh.submeshes.len() as u32)?;
    for submesh in &mesh.submeshes {
        out.write_u64(submesh.vertex_start)?;
        out.write_u64(submesh.vertex_count)?;
        out.write_u64(submesh.index_start)?;
        out.write_u64(submesh.index_count)?;
        out.write_i64(refs.offset(submesh.material.as_deref())?)?;
    }
    Ok(())
}

pub fn write_texture<W: Write + Seek>(out: &mut OStream<W>, texture: &OrbTexture) -> Result<()> {
    if texture.only_reference {
        out.write_len_prefixed(texture.path.as_bytes())
    } else {
        out.write_u64(texture.data.len() as u64)?;
        out.write_bytes(&texture.data)
    }
}

/// Shader payload shared by source and bytecode resources.
pub fn write_shader<W: Write + Seek>(
    out: &mut OStream<W>,
    shader_type: ShaderType,
    data: &ShaderSource,
) -> Result<()> {
    out.write_u8(shader_type.code())?;
    out.write_u8(data.storage_code())?;
    out.write_len_prefixed(data.bytes())
}

pub fn write_input_layout<W: Write + Seek>(out: &mut OStream<W>, layout: &OrbInputLayout) -> Result<()> {
    out.write_u32(layout.elements.len() as u32)?;
    for element in &layout.elements {
        out.write_len_prefixed(element.semantic.as_bytes())?;
        out.write_u8(element.format.code())?;
        out.write_u8(element.classification.code())?;
        out.write_u32(element.semantic_index)?;
        out.write_u32(element.slot)?;
    }
    Ok(())
}

pub fn write_pipeline_state<W: Write + Seek>(
    out: &mut OStream<W>,
    state: &OrbPipelineState,
    refs: &impl ReferenceResolver,
) -> Result<()> {
    for binding in state.bindings() {
        out.write_i64(refs.offset(binding)?)?;
    }
    out.write_u8(state.topology.code())?;
    out.write_u32(state.samplers.len() as u32)?;
    for sampler in &state.samplers {
        out.write_i64(refs.offset(Some(sampler))?)?;
    }
    Ok(())
}

pub fn write_rasterizer_state<W: Write + Seek>(out: &mut OStream<W>, state: &OrbRasterizerState) -> Result<()> {
    out.write_u8(state.fill.code())?;
    out.write_u8(state.cull.code())
}

/// Bit 0 of the `enabled` byte.
pub const BLEND_ENABLED: u8 = 1 << 0;
/// Bit 1 of the `enabled` byte.
pub const BLEND_ALPHA_TO_COVERAGE: u8 = 1 << 1;

pub fn write_blend_state<W: Write + Seek>(out: &mut OStream<W>, state: &OrbBlendState) -> Result<()> {
    let mut enabled = 0;
    if state.enabled {
        enabled |= BLEND_ENABLED;
    }
    if state.alpha_to_coverage {
        enabled |= BLEND_ALPHA_TO_COVERAGE;
    }
    out.write_u8(enabled)?;
    match state.factor {
        Some(factor) => {
            out.write_u8(1)?;
            out.write_vec4(factor)?;
        }
        None => out.write_u8(0)?,
    }
    out.write_u8(state.mask.0)?;
    for code in [
        state.src_blend.code(),
        state.dst_blend.code(),
        state.blend_op.code(),
        state.src_blend_alpha.code(),
        state.dst_blend_alpha.code(),
        state.blend_op_alpha.code(),
    ] {
        out.write_u8(code)?;
    }
    Ok(())
}

pub fn write_sampler_state<W: Write + Seek>(out: &mut OStream<W>, state: &OrbSamplerState) -> Result<()> {
    out.write_u8(state.filter.code())?;
    out.write_u8(state.address_u.code())?;
    out.write_u8(state.address_v.code())?;
    out.write_u8(state.address_w.code())
}

/// Submesh as stored, with its material as a relative offset.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmeshRecord {
    pub vertex_start: u64,
    pub vertex_count: u64,
    pub index_start: u64,
    pub index_count: u64,
    pub material: i64,
}

/// A decoded payload. References stay relative offsets.
#[derive(Clone, Debug, PartialEq)]
pub enum OrbPayload {
    Material {
        diffuse: Vec4,
        specular: Vec4,
        roughness: f32,
        flags: u32,
        /// Color, normal, roughness and occlusion texture offsets.
        textures: [i64; 4],
    },
    Mesh {
        material: i64,
        indices: Vec<u32>,
        vertices: Vec<Vertex>,
        submeshes: Vec<SubmeshRecord>,
    },
    Texture {
        data: Vec<u8>,
    },
    TextureReference {
        path: String,
    },
    /// Shader source (`SHADER_CODE`) or bytecode (`SHADER_BINARY`).
    Shader {
        binary: bool,
        shader_type: ShaderType,
        data: ShaderSource,
    },
    InputLayout(OrbInputLayout),
    PipelineState {
        /// VS, PS, GS, HS, DS, input layout, rasterizer, blend.
        bindings: [i64; 8],
        topology: PrimitiveTopology,
        samplers: Vec<i64>,
    },
    RasterizerState(OrbRasterizerState),
    BlendState(OrbBlendState),
    SamplerState(OrbSamplerState),
}

impl OrbPayload {
    /// Decode a payload of type `ty` at the stream's position.
    pub fn read<R: Read + Seek>(input: &mut IStream<R>, ty: ResourceType) -> Result<Self> {
        let payload = match ty {
            ResourceType::Material => {
                let diffuse = input.read_vec4()?;
                let specular = input.read_vec4()?;
                let roughness = input.read_f32()?;
                let flags = input.read_u32()?;
                let mut textures = [0i64; 4];
                for t in &mut textures {
                    *t = input.read_i64()?;
                }
                Self::Material { diffuse, specular, roughness, flags, textures }
            }
            ResourceType::Mesh => {
                let material = input.read_i64()?;
                let index_count = input.read_u64()?;
                let vertex_count = input.read_u64()?;
                let index_bytes = input.read_bytes(index_count.saturating_mul(4))?;
                let indices = index_bytes
                    .chunks_exact(4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                let vertex_bytes = input.read_bytes(vertex_count.saturating_mul(VERTEX_SIZE as u64))?;
                let floats: Vec<f32> = vertex_bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                let vertices = bytemuck::cast_slice::<f32, Vertex>(&floats).to_vec();
                let submesh_count = input.read_u32()?;
                let mut submeshes = Vec::with_capacity(submesh_count.min(1024) as usize);
                for _ in 0..submesh_count {
                    submeshes.push(SubmeshRecord {
                        vertex_start: input.read_u64()?,
                        vertex_count: input.read_u64()?,
                        index_start: input.read_u64()?,
                        index_count: input.read_u64()?,
                        material: input.read_i64()?,
                    });
                }
                Self::Mesh { material, indices, vertices, submeshes }
            }
            ResourceType::Texture => {
                let len = input.read_u64()?;
                Self::Texture { data: input.read_bytes(len)? }
            }
            ResourceType::TextureReference => Self::TextureReference { path: input.read_string()? },
            ResourceType::ShaderCode | ResourceType::ShaderBinary => {
                let shader_type = ShaderType::from_code(input.read_u8()?)?;
                let storage = input.read_u8()?;
                let bytes = input.read_len_prefixed()?;
                let data = match storage {
                    0 => ShaderSource::Inline(bytes),
                    1 => ShaderSource::Reference(String::from_utf8(bytes)?),
                    other => return Err(Error::InvalidEnum { what: "shader storage", value: other as u32 }),
                };
                Self::Shader { binary: ty == ResourceType::ShaderBinary, shader_type, data }
            }
            ResourceType::InputLayout => {
                let count = input.read_u32()?;
                let mut layout = OrbInputLayout::default();
                for _ in 0..count {
                    let semantic = input.read_string()?;
                    let format = FormatType::from_code(input.read_u8()?)?;
                    let mut element = InputElement::new(semantic, format);
                    element.classification = InputClassification::from_code(input.read_u8()?)?;
                    element.semantic_index = input.read_u32()?;
                    element.slot = input.read_u32()?;
                    layout.elements.push(element);
                }
                Self::InputLayout(layout)
            }
            ResourceType::PipelineState => {
                let mut bindings = [0i64; 8];
                for b in &mut bindings {
                    *b = input.read_i64()?;
                }
                let topology = PrimitiveTopology::from_code(input.read_u8()?)?;
                let count = input.read_u32()?;
                let mut samplers = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    samplers.push(input.read_i64()?);
                }
                Self::PipelineState { bindings, topology, samplers }
            }
            ResourceType::RasterizerState => Self::RasterizerState(OrbRasterizerState {
                fill: FillMode::from_code(input.read_u8()?)?,
                cull: CullMode::from_code(input.read_u8()?)?,
            }),
            ResourceType::BlendState => {
                let enabled = input.read_u8()?;
                let factor = if input.read_u8()? != 0 { Some(input.read_vec4()?) } else { None };
                let mask = ColorWriteMask(input.read_u8()?);
                Self::BlendState(OrbBlendState {
                    enabled: enabled & BLEND_ENABLED != 0,
                    alpha_to_coverage: enabled & BLEND_ALPHA_TO_COVERAGE != 0,
                    factor,
                    mask,
                    src_blend: BlendFactor::from_code(input.read_u8()?)?,
                    dst_blend: BlendFactor::from_code(input.read_u8()?)?,
                    blend_op: BlendOperation::from_code(input.read_u8()?)?,
                    src_blend_alpha: BlendFactor::from_code(input.read_u8()?)?,
                    dst_blend_alpha: BlendFactor::from_code(input.read_u8()?)?,
                    blend_op_alpha: BlendOperation::from_code(input.read_u8()?)?,
                })
            }
            ResourceType::SamplerState => Self::SamplerState(OrbSamplerState {
                filter: FilterMode::from_code(input.read_u8()?)?,
                address_u: AddressMode::from_code(input.read_u8()?)?,
                address_v: AddressMode::from_code(input.read_u8()?)?,
                address_w: AddressMode::from_code(input.read_u8()?)?,
            }),
        };
        Ok(payload)
    }
}

struct Offset(i64);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == NO_REFERENCE {
            f.write_str("none")
        } else {
            write!(f, "{:+}", self.0)
        }
    }
}

fn vec4(v: Vec4) -> String {
    format!("({}, {}, {}, {})", v.x, v.y, v.z, v.w)
}

impl fmt::Display for OrbPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material { diffuse, specular, roughness, flags, textures } => {
                writeln!(f, "  diffuse:   {}", vec4(*diffuse))?;
                writeln!(f, "  specular:  {}", vec4(*specular))?;
                writeln!(f, "  roughness: {}", roughness)?;
                writeln!(f, "  flags:     {:#06b}", flags)?;
                for (channel, offset) in TextureChannel::ALL.iter().zip(textures) {
                    writeln!(f, "  {} texture: {}", channel.as_str(), Offset(*offset))?;
                }
            }
            Self::Mesh { material, indices, vertices, submeshes } => {
                writeln!(f, "  material: {}", Offset(*material))?;
                writeln!(f, "  indices ({}):", indices.len())?;
                for tri in indices.chunks(3) {
                    writeln!(f, "    {:?}", tri)?;
                }
                writeln!(f, "  vertices ({}):", vertices.len())?;
                for (i, v) in vertices.iter().enumerate() {
                    writeln!(
                        f,
                        "    [{}] position {:?} normal {:?} tangent {:?} uv {:?}",
                        i, v.position, v.normal, v.tangent, v.uv
                    )?;
                }
                writeln!(f, "  submeshes ({}):", submeshes.len())?;
                for s in submeshes {
                    writeln!(
                        f,
                        "    vertices {}+{} indices {}+{} material {}",
                        s.vertex_start,
                        s.vertex_count,
                        s.index_start,
                        s.index_count,
                        Offset(s.material)
                    )?;
                }
            }
            Self::Texture { data } => writeln!(f, "  embedded data: {} bytes", data.len())?,
            Self::TextureReference { path } => writeln!(f, "  path: {}", path)?,
            Self::Shader { binary, shader_type, data } => {
                writeln!(f, "  stage:   {}", shader_type)?;
                match data {
                    ShaderSource::Inline(bytes) if *binary => writeln!(f, "  bytecode: {} bytes", bytes.len())?,
                    ShaderSource::Inline(bytes) => {
                        writeln!(f, "  source ({} bytes):", bytes.len())?;
                        for line in String::from_utf8_lossy(bytes).lines() {
                            writeln!(f, "    {}", line)?;
                        }
                    }
                    ShaderSource::Reference(path) => writeln!(f, "  reference: {}", path)?,
                }
            }
            Self::InputLayout(layout) => {
                writeln!(f, "  elements ({}):", layout.elements.len())?;
                for e in &layout.elements {
                    writeln!(
                        f,
                        "    {}{} {} {} slot {}",
                        e.semantic, e.semantic_index, e.format, e.classification, e.slot
                    )?;
                }
            }
            Self::PipelineState { bindings, topology, samplers } => {
                for (name, offset) in PIPELINE_BINDING_NAMES.iter().zip(bindings) {
                    writeln!(f, "  {}: {}", name, Offset(*offset))?;
                }
                writeln!(f, "  topology: {}", topology)?;
                let samplers: Vec<String> = samplers.iter().map(|s| Offset(*s).to_string()).collect();
                writeln!(f, "  samplers: [{}]", samplers.join(", "))?;
            }
            Self::RasterizerState(state) => {
                writeln!(f, "  fill: {}", state.fill)?;
                writeln!(f, "  cull: {}", state.cull)?;
            }
            Self::BlendState(state) => {
                writeln!(f, "  enabled:           {}", state.enabled)?;
                writeln!(f, "  alpha_to_coverage: {}", state.alpha_to_coverage)?;
                match state.factor {
                    Some(factor) => writeln!(f, "  factor:            {}", vec4(factor))?,
                    None => writeln!(f, "  factor:            none")?,
                }
                writeln!(f, "  mask:              {}", state.mask)?;
                writeln!(f, "  color:             {} {} {}", state.src_blend, state.blend_op, state.dst_blend)?;
                writeln!(
                    f,
                    "  alpha:             {} {} {}",
                    state.src_blend_alpha, state.blend_op_alpha, state.dst_blend_alpha
                )?;
            }
            Self::SamplerState(state) => {
                writeln!(f, "  filter:  {}", state.filter)?;
                writeln!(
                    f,
                    "  address: {} {} {}",
                    state.address_u, state.address_v, state.address_w
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    struct Names(HashMap<&'static str, i64>);

    impl ReferenceResolver for Names {
        fn offset(&self, name: Option<&str>) -> Result<i64> {
            Ok(name.map_or(NO_REFERENCE, |n| self.0[n]))
        }
    }

    fn decode(ty: ResourceType, write: impl FnOnce(&mut OStream<Cursor<Vec<u8>>>)) -> OrbPayload {
        let mut out = OStream::new(Cursor::new(Vec::new()));
        write(&mut out);
        let bytes = out.into_inner().unwrap().into_inner();
        let len = bytes.len() as u64;
        let mut input = IStream::new(Cursor::new(bytes)).unwrap();
        let payload = OrbPayload::read(&mut input, ty).unwrap();
        assert_eq!(input.pos(), len, "payload not fully consumed");
        payload
    }

    #[test]
    fn test_material_layout() {
        let mut material = OrbMaterial::default();
        material.set_texture(TextureChannel::Normal, "n");
        let refs = Names(HashMap::from([("n", -3)]));

        let mut out = OStream::new(Cursor::new(Vec::new()));
        write_material(&mut out, &material, &refs).unwrap();
        // diffuse + specular + roughness + flags + four offsets
        assert_eq!(out.pos(), 16 + 16 + 4 + 4 + 32);

        let payload = decode(ResourceType::Material, |o| write_material(o, &material, &refs).unwrap());
        let OrbPayload::Material { flags, textures, roughness, .. } = payload else {
            panic!("expected material");
        };
        assert_eq!(flags, material_flags::NORMAL_TEXTURE);
        assert_eq!(textures, [0, -3, 0, 0]);
        assert_eq!(roughness, 0.5);
    }

    #[test]
    fn test_mesh_layout() {
        let mesh = OrbMesh {
            material: Some("m".into()),
            vertices: vec![
                Vertex { position: [1.0, 2.0, 3.0], uv: [0.5, 0.25], ..Default::default() },
                Vertex::default(),
                Vertex::default(),
            ],
            indices: vec![0, 1, 2],
            submeshes: vec![Submesh {
                vertex_start: 0,
                vertex_count: 3,
                index_start: 0,
                index_count: 3,
                material: Some("m".into()),
            }],
        };
        let refs = Names(HashMap::from([("m", -1)]));
        let payload = decode(ResourceType::Mesh, |o| write_mesh(o, &mesh, &refs).unwrap());
        let OrbPayload::Mesh { material, indices, vertices, submeshes } = payload else {
            panic!("expected mesh");
        };
        assert_eq!(material, -1);
        assert_eq!(indices, mesh.indices);
        assert_eq!(vertices, mesh.vertices);
        assert_eq!(submeshes[0].material, -1);
        assert_eq!(submeshes[0].index_count, 3);
    }

    #[test]
    fn test_blend_state_bits() {
        let state = OrbBlendState {
            enabled: true,
            alpha_to_coverage: true,
            factor: Some(Vec4::splat(0.5)),
            mask: ColorWriteMask::RED | ColorWriteMask::ALPHA,
            src_blend: BlendFactor::SrcAlpha,
            ..Default::default()
        };
        let mut out = OStream::new(Cursor::new(Vec::new()));
        write_blend_state(&mut out, &state).unwrap();
        let bytes = out.into_inner().unwrap().into_inner();
        assert_eq!(bytes[0], BLEND_ENABLED | BLEND_ALPHA_TO_COVERAGE);
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[18], 9);
        assert_eq!(bytes.len(), 1 + 1 + 16 + 1 + 6);

        let payload = decode(ResourceType::BlendState, |o| write_blend_state(o, &state).unwrap());
        assert_eq!(payload, OrbPayload::BlendState(state));
    }

    #[test]
    fn test_shader_storage() {
        let data = ShaderSource::Reference("shaders/vs.cso".into());
        let payload = decode(ResourceType::ShaderBinary, |o| write_shader(o, ShaderType::Vertex, &data).unwrap());
        assert_eq!(
            payload,
            OrbPayload::Shader { binary: true, shader_type: ShaderType::Vertex, data }
        );
    }

    #[test]
    fn test_invalid_enum_code() {
        let mut input = IStream::new(Cursor::new(vec![9u8, 0])).unwrap();
        let err = OrbPayload::read(&mut input, ResourceType::RasterizerState).unwrap_err();
        assert!(matches!(err, Error::InvalidEnum { what: "fill mode", value: 9 }));
    }

    #[test]
    fn test_display_lists_fields() {
        let payload = OrbPayload::PipelineState {
            bindings: [-2, -1, 0, 0, 0, 3, 0, 0],
            topology: PrimitiveTopology::TriangleList,
            samplers: vec![1],
        };
        let text = payload.to_string();
        assert!(text.contains("vertex_shader: -2"));
        assert!(text.contains("geometry_shader: none"));
        assert!(text.contains("input_layout: +3"));
        assert!(text.contains("topology: TRIANGLE_LIST"));
        assert!(text.contains("samplers: [+1]"));
    }
}
