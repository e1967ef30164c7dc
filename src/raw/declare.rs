//! `new TYPE as "name" { ... }` declarations.

use glam::Vec4;
use tracing::trace;

use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::lexer::{Lexer, TokenKind};
use crate::resource::*;
use crate::util::{ParseErrorKind, Result};

/// Parse a declaration after its `new` keyword and append it to `out`.
///
/// `fallback` names inline declarations that omit `as "name"`; top-level
/// declarations pass `None` and must name themselves. Nested declarations are
/// appended before their parent.
pub(super) fn parse_new(
    lexer: &mut Lexer,
    out: &mut OrbIntermediate,
    fallback: Option<&str>,
) -> Result<(String, ResourceType)> {
    let ty: ResourceType = expect_keyword(lexer)?;
    let name = if lexer.matches_literal("as") {
        lexer.expect_string("Expected a resource name after 'as'")?
    } else if let Some(fallback) = fallback {
        fallback.to_string()
    } else {
        return Err(lexer.unexpected("Expected 'as'"));
    };
    let line = lexer.previous().line;

    lexer.expect(TokenKind::LCurly, "Expected '{'")?;
    let value = match ty {
        ResourceType::InputLayout => OrbValue::InputLayout(input_layout(lexer)?),
        ResourceType::PipelineState => OrbValue::PipelineState(pipeline_state(lexer, out, &name)?),
        ResourceType::RasterizerState => OrbValue::RasterizerState(rasterizer_state(lexer)?),
        ResourceType::BlendState => OrbValue::BlendState(blend_state(lexer)?),
        ResourceType::SamplerState => OrbValue::SamplerState(sampler_state(lexer)?),
        ResourceType::Material => OrbValue::Material(material(lexer)?),
        other => {
            return Err(lexer.error_at(
                ParseErrorKind::UnknownKeyword,
                line,
                format!("{} resources cannot be declared with 'new'", other),
            ))
        }
    };
    lexer.expect(TokenKind::RCurly, "Expected '}'")?;

    trace!(name = %name, ty = %ty, "declared resource");
    out.append_object(name.clone(), value)?;
    Ok((name, ty))
}

/// Consume a keyword literal of enum `T`.
pub(super) fn expect_keyword<T: Keyword>(lexer: &mut Lexer) -> Result<T> {
    let token = lexer
        .expect(TokenKind::Literal, &format!("Expected {}", T::WHAT))?
        .clone();
    T::parse_keyword(&token.lexeme).ok_or_else(|| {
        lexer.error_at(
            ParseErrorKind::UnknownKeyword,
            token.line,
            format!(
                "Unknown {} '{}', expected one of: {}",
                T::WHAT,
                token.lexeme,
                T::accepted()
            ),
        )
    })
}

/// `field = value;` pairs up to (not including) the closing `}`.
fn fields(
    lexer: &mut Lexer,
    mut field: impl FnMut(&mut Lexer, &str, u32) -> Result<()>,
) -> Result<()> {
    while !lexer.check(TokenKind::RCurly) {
        let name = lexer.expect_identifier("Expected a field name")?;
        let line = lexer.previous().line;
        lexer.expect(TokenKind::Equals, &format!("Expected '=' after '{}'", name))?;
        field(lexer, &name, line)?;
        lexer.expect(TokenKind::Semicolon, "Expected ';' after field value")?;
    }
    Ok(())
}

fn unknown_field(lexer: &Lexer, line: u32, ty: ResourceType, field: &str) -> crate::util::Error {
    lexer.error_at(
        ParseErrorKind::UnknownKeyword,
        line,
        format!("Unknown {} field '{}'", ty, field),
    )
}

fn expect_bool(lexer: &mut Lexer) -> Result<bool> {
    if lexer.matches_literal("true") {
        Ok(true)
    } else if lexer.matches_literal("false") {
        Ok(false)
    } else {
        Err(lexer.unexpected("Expected 'true' or 'false'"))
    }
}

/// `(x, y, z, w)`
fn expect_vec4(lexer: &mut Lexer) -> Result<Vec4> {
    lexer.expect(TokenKind::LParen, "Expected '('")?;
    let mut v = [0.0f32; 4];
    for (i, c) in v.iter_mut().enumerate() {
        if i > 0 {
            lexer.expect(TokenKind::Comma, "Expected ','")?;
        }
        *c = lexer.expect_number("Expected a number")?;
    }
    lexer.expect(TokenKind::RParen, "Expected ')'")?;
    Ok(Vec4::from_array(v))
}

fn expect_index(lexer: &mut Lexer, what: &str) -> Result<u32> {
    let line = lexer.current().line;
    let value = lexer.expect_integer(&format!("Expected {}", what))?;
    u32::try_from(value).map_err(|_| {
        lexer.error_at(
            ParseErrorKind::Semantic,
            line,
            format!("{} must be a non-negative integer, found {}", what, value),
        )
    })
}

/// `{ "SEMANTIC", FORMAT [, USAGE [, semantic_index [, slot]]] }` entries.
fn input_layout(lexer: &mut Lexer) -> Result<OrbInputLayout> {
    let mut layout = OrbInputLayout::default();
    while !lexer.check(TokenKind::RCurly) {
        lexer.expect(TokenKind::LCurly, "Expected '{' to start an input element")?;
        let semantic = lexer.expect_string("Expected a semantic name")?;
        lexer.expect(TokenKind::Comma, "Expected ',' after the semantic name")?;
        let mut element = InputElement::new(semantic, expect_keyword(lexer)?);
        if lexer.matches(TokenKind::Comma) {
            element.classification = expect_keyword(lexer)?;
            if lexer.matches(TokenKind::Comma) {
                element.semantic_index = expect_index(lexer, "a semantic index")?;
                if lexer.matches(TokenKind::Comma) {
                    element.slot = expect_index(lexer, "an input slot")?;
                }
            }
        }
        lexer.expect(TokenKind::RCurly, "Expected '}' to end the input element")?;
        layout.elements.push(element);
        if !lexer.matches(TokenKind::Comma) {
            lexer.matches(TokenKind::Semicolon);
        }
    }
    Ok(layout)
}

/// A name, or an inline declaration of type `expected` named `fallback`
/// unless it names itself.
fn reference(
    lexer: &mut Lexer,
    out: &mut OrbIntermediate,
    expected: ResourceType,
    fallback: &str,
) -> Result<String> {
    if lexer.check(TokenKind::String) {
        return lexer.expect_string("Expected a resource name");
    }
    if !lexer.matches_literal("new") {
        return Err(lexer.unexpected("Expected a resource name or 'new'"));
    }
    let line = lexer.previous().line;
    let (name, ty) = parse_new(lexer, out, Some(fallback))?;
    if ty != expected {
        return Err(lexer.error_at(
            ParseErrorKind::Semantic,
            line,
            format!("Expected a {} declaration, found {}", expected, ty),
        ));
    }
    Ok(name)
}

fn pipeline_state(lexer: &mut Lexer, out: &mut OrbIntermediate, parent: &str) -> Result<OrbPipelineState> {
    let mut state = OrbPipelineState::default();
    fields(lexer, |lexer, field, line| {
        let inline_name = format!("{}.{}", parent, field);
        match field {
            "vertex_shader" => state.vertex_shader = Some(lexer.expect_string("Expected a shader name")?),
            "pixel_shader" => state.pixel_shader = Some(lexer.expect_string("Expected a shader name")?),
            "geometry_shader" => state.geometry_shader = Some(lexer.expect_string("Expected a shader name")?),
            "hull_shader" => state.hull_shader = Some(lexer.expect_string("Expected a shader name")?),
            "domain_shader" => state.domain_shader = Some(lexer.expect_string("Expected a shader name")?),
            "input_layout" => {
                state.input_layout = Some(reference(lexer, out, ResourceType::InputLayout, &inline_name)?)
            }
            "rasterizer_state" => {
                state.rasterizer_state =
                    Some(reference(lexer, out, ResourceType::RasterizerState, &inline_name)?)
            }
            "blend_state" => {
                state.blend_state = Some(reference(lexer, out, ResourceType::BlendState, &inline_name)?)
            }
            "topology" => state.topology = expect_keyword(lexer)?,
            "samplers" => {
                lexer.expect(TokenKind::LCurly, "Expected '{' to start the sampler list")?;
                while !lexer.check(TokenKind::RCurly) {
                    let fallback = format!("{}.{}", inline_name, state.samplers.len());
                    let sampler = reference(lexer, out, ResourceType::SamplerState, &fallback)?;
                    state.samplers.push(sampler);
                    if !lexer.matches(TokenKind::Comma) {
                        break;
                    }
                }
                lexer.expect(TokenKind::RCurly, "Expected '}' to end the sampler list")?;
            }
            _ => return Err(unknown_field(lexer, line, ResourceType::PipelineState, field)),
        }
        Ok(())
    })?;
    Ok(state)
}

fn rasterizer_state(lexer: &mut Lexer) -> Result<OrbRasterizerState> {
    let mut state = OrbRasterizerState::default();
    fields(lexer, |lexer, field, line| {
        match field {
            "fill" => state.fill = expect_keyword(lexer)?,
            "cull" => state.cull = expect_keyword(lexer)?,
            _ => return Err(unknown_field(lexer, line, ResourceType::RasterizerState, field)),
        }
        Ok(())
    })?;
    Ok(state)
}

fn blend_state(lexer: &mut Lexer) -> Result<OrbBlendState> {
    let mut state = OrbBlendState::default();
    fields(lexer, |lexer, field, line| {
        match field {
            "enabled" => state.enabled = expect_bool(lexer)?,
            "alpha_to_coverage" => state.alpha_to_coverage = expect_bool(lexer)?,
            "factor" => state.factor = Some(expect_vec4(lexer)?),
            "mask" => {
                let mut mask = ColorWriteMask::NONE;
                loop {
                    let token = lexer.expect(TokenKind::Literal, "Expected a color channel")?.clone();
                    mask |= ColorWriteMask::from_keyword(&token.lexeme).ok_or_else(|| {
                        lexer.error_at(
                            ParseErrorKind::UnknownKeyword,
                            token.line,
                            format!(
                                "Unknown color channel '{}', expected one of: NONE, RED, GREEN, BLUE, ALPHA, ALL",
                                token.lexeme
                            ),
                        )
                    })?;
                    if !lexer.matches(TokenKind::Comma) {
                        break;
                    }
                }
                state.mask = mask;
            }
            "src_blend" => state.src_blend = expect_keyword(lexer)?,
            "dst_blend" => state.dst_blend = expect_keyword(lexer)?,
            "blend_op" => state.blend_op = expect_keyword(lexer)?,
            "src_blend_alpha" => state.src_blend_alpha = expect_keyword(lexer)?,
            "dst_blend_alpha" => state.dst_blend_alpha = expect_keyword(lexer)?,
            "blend_op_alpha" => state.blend_op_alpha = expect_keyword(lexer)?,
            _ => return Err(unknown_field(lexer, line, ResourceType::BlendState, field)),
        }
        Ok(())
    })?;
    Ok(state)
}

fn sampler_state(lexer: &mut Lexer) -> Result<OrbSamplerState> {
    let mut state = OrbSamplerState::default();
    fields(lexer, |lexer, field, line| {
        match field {
            "filter" => state.filter = expect_keyword(lexer)?,
            "address_u" => state.address_u = expect_keyword(lexer)?,
            "address_v" => state.address_v = expect_keyword(lexer)?,
            "address_w" => state.address_w = expect_keyword(lexer)?,
            _ => return Err(unknown_field(lexer, line, ResourceType::SamplerState, field)),
        }
        Ok(())
    })?;
    Ok(state)
}

fn material(lexer: &mut Lexer) -> Result<OrbMaterial> {
    let mut material = OrbMaterial::default();
    fields(lexer, |lexer, field, line| {
        let channel = match field {
            "diffuse" => {
                material.diffuse = expect_vec4(lexer)?;
                return Ok(());
            }
            "specular" => {
                material.specular = expect_vec4(lexer)?;
                return Ok(());
            }
            "roughness" => {
                material.roughness = lexer.expect_number("Expected a roughness value")?;
                return Ok(());
            }
            "diffuse_texture" => TextureChannel::Color,
            "normal_texture" => TextureChannel::Normal,
            "roughness_texture" => TextureChannel::Roughness,
            "occlusion_texture" => TextureChannel::Occlusion,
            _ => return Err(unknown_field(lexer, line, ResourceType::Material, field)),
        };
        material.set_texture(channel, lexer.expect_string("Expected a texture name")?);
        Ok(())
    })?;
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(source: &str) -> Result<OrbIntermediate> {
        let mut out = OrbIntermediate::new();
        let mut lexer = Lexer::new("test.raw", source);
        lexer.expect_literal("new")?;
        parse_new(&mut lexer, &mut out, None)?;
        Ok(out)
    }

    #[test]
    fn test_input_layout() {
        let out = declare(
            r#"new INPUT_LAYOUT as "layout" {
                { "POSITION", R32G32B32_FLOAT },
                { "TEXCOORD", R32G32_FLOAT, PER_INSTANCE, 1, 2 };
            }"#,
        )
        .unwrap();
        let OrbValue::InputLayout(layout) = &out.get("layout").unwrap().value else {
            panic!("expected input layout");
        };
        assert_eq!(layout.elements.len(), 2);
        assert_eq!(layout.elements[0].format, FormatType::R32G32B32Float);
        assert_eq!(layout.elements[0].classification, InputClassification::PerVertex);
        let uv = &layout.elements[1];
        assert_eq!(uv.classification, InputClassification::PerInstance);
        assert_eq!((uv.semantic_index, uv.slot), (1, 2));
    }

    #[test]
    fn test_blend_state() {
        let out = declare(
            r#"new BLEND_STATE as "alpha" {
                enabled = true;
                factor = (0.5, 0.5, 0.5, 1);
                mask = RED, GREEN;
                src_blend = SRC_ALPHA;
                dst_blend = INV_SRC_ALPHA;
                blend_op_alpha = MAX;
            }"#,
        )
        .unwrap();
        let OrbValue::BlendState(state) = &out.get("alpha").unwrap().value else {
            panic!("expected blend state");
        };
        assert!(state.enabled);
        assert!(!state.alpha_to_coverage);
        assert_eq!(state.factor, Some(Vec4::new(0.5, 0.5, 0.5, 1.0)));
        assert_eq!(state.mask, ColorWriteMask::RED | ColorWriteMask::GREEN);
        assert_eq!(state.dst_blend, BlendFactor::InvSrcAlpha);
        assert_eq!(state.blend_op_alpha, BlendOperation::Max);
    }

    #[test]
    fn test_pipeline_inline_declarations() {
        let out = declare(
            r#"new PIPELINE_STATE as "opaque" {
                vertex_shader = "vs";
                pixel_shader = "ps";
                rasterizer_state = new RASTERIZER_STATE { fill = WIREFRAME; cull = NONE; };
                blend_state = new BLEND_STATE as "no_blend" { };
                topology = LINE_LIST;
                samplers = { "shared", new SAMPLER_STATE { filter = POINT; } };
            }"#,
        )
        .unwrap();
        let names: Vec<&str> = out.objects().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["opaque.rasterizer_state", "no_blend", "opaque.samplers.1", "opaque"]
        );
        let OrbValue::PipelineState(state) = &out.get("opaque").unwrap().value else {
            panic!("expected pipeline state");
        };
        assert_eq!(state.vertex_shader.as_deref(), Some("vs"));
        assert_eq!(state.rasterizer_state.as_deref(), Some("opaque.rasterizer_state"));
        assert_eq!(state.blend_state.as_deref(), Some("no_blend"));
        assert_eq!(state.topology, PrimitiveTopology::LineList);
        assert_eq!(state.samplers, vec!["shared", "opaque.samplers.1"]);
        let OrbValue::RasterizerState(raster) = &out.objects()[0].value else {
            panic!("expected rasterizer state");
        };
        assert_eq!(raster.fill, FillMode::Wireframe);
        assert_eq!(raster.cull, CullMode::None);
    }

    #[test]
    fn test_material() {
        let out = declare(
            r#"new MATERIAL as "steel" {
                diffuse = (0.5, 0.5, 0.5, 1);
                roughness = 0.25;
                diffuse_texture = "steel_albedo";
                normal_texture = "steel_normal";
            }"#,
        )
        .unwrap();
        let OrbValue::Material(m) = &out.get("steel").unwrap().value else {
            panic!("expected material");
        };
        assert_eq!(m.roughness, 0.25);
        assert_eq!(m.texture(TextureChannel::Color), Some("steel_albedo"));
        assert_eq!(m.texture(TextureChannel::Normal), Some("steel_normal"));
    }

    #[test]
    fn test_unknown_keyword_names_token() {
        let err = declare(r#"new RASTERIZER_STATE as "r" { fill = DOTTED; }"#).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnknownKeyword));
        assert!(err.to_string().contains("'DOTTED'"));

        let err = declare(r#"new SAMPLER_STATE as "s" { anisotropy = 4; }"#).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnknownKeyword));
        assert!(err.to_string().contains("anisotropy"));

        let err = declare(r#"new BLENDING as "b" { }"#).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnknownKeyword));
    }

    #[test]
    fn test_inline_type_mismatch() {
        let err = declare(
            r#"new PIPELINE_STATE as "p" { blend_state = new SAMPLER_STATE { }; }"#,
        )
        .unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::Semantic));
    }

    #[test]
    fn test_top_level_requires_name() {
        let err = declare("new MATERIAL { }").unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnexpectedToken));
    }
}
