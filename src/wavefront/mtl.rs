//! Wavefront MTL material library reader.

use std::path::Path;

use glam::Vec4;
use tracing::{debug, info, trace};

use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::lexer::{Lexer, TokenKind};
use crate::resource::{OrbMaterial, OrbTexture, TextureChannel};
use crate::util::{ParseErrorKind, Result};

/// Reads `newmtl` blocks into materials. `map_*` paths become texture
/// references named after the path.
#[derive(Debug, Default)]
pub struct MtlReader {
    current: Option<(String, OrbMaterial)>,
    materials: usize,
}

impl MtlReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>, out: &mut OrbIntermediate) -> Result<usize> {
        let path = path.as_ref();
        let mut lexer = Lexer::open(path)?;
        let count = self.read(&mut lexer, out)?;
        info!("{}: {} material(s)", path.display(), count);
        Ok(count)
    }

    /// Read MTL text. Returns the number of materials appended; materials
    /// whose name already exists in `out` are kept as they are, so several
    /// OBJ files may share one library.
    pub fn read(&mut self, lexer: &mut Lexer, out: &mut OrbIntermediate) -> Result<usize> {
        self.materials = 0;
        while !lexer.at_end() {
            let directive = lexer.expect_identifier("Expected an MTL directive")?;
            let line = lexer.previous().line;
            match directive.as_str() {
                "newmtl" => {
                    self.flush(out)?;
                    let name = lexer.rest_of_line();
                    if name.is_empty() {
                        return Err(lexer.error_at(ParseErrorKind::Semantic, line, "newmtl without a name"));
                    }
                    self.current = Some((name, OrbMaterial::default()));
                }
                "Kd" | "Ks" => {
                    let color = read_color(lexer)?;
                    let material = self.material(lexer, line, &directive)?;
                    if directive == "Kd" {
                        material.diffuse = color;
                    } else {
                        material.specular = color;
                    }
                }
                "map_Kd" | "map_Bump" | "map_bump" | "bump" | "norm" => {
                    let path = unquote(&lexer.rest_of_line());
                    if path.is_empty() {
                        return Err(lexer.error_at(ParseErrorKind::Semantic, line, format!("{} without a path", directive)));
                    }
                    let channel = if directive == "map_Kd" {
                        TextureChannel::Color
                    } else {
                        TextureChannel::Normal
                    };
                    if !out.contains(&path) {
                        out.append_object(path.clone(), OrbValue::Texture(OrbTexture::reference(path.clone())))?;
                    }
                    self.material(lexer, line, &directive)?.set_texture(channel, path);
                }
                other => {
                    trace!(line, directive = other, "skipping MTL directive");
                    lexer.skip_line();
                }
            }
        }
        self.flush(out)?;
        Ok(self.materials)
    }

    fn material(&mut self, lexer: &Lexer, line: u32, directive: &str) -> Result<&mut OrbMaterial> {
        match self.current.as_mut() {
            Some((_, material)) => Ok(material),
            None => Err(lexer.error_at(
                ParseErrorKind::Semantic,
                line,
                format!("'{}' before any newmtl", directive),
            )),
        }
    }

    fn flush(&mut self, out: &mut OrbIntermediate) -> Result<()> {
        let Some((name, material)) = self.current.take() else {
            return Ok(());
        };
        if out.contains(&name) {
            debug!(material = %name, "material already defined, keeping the first definition");
            return Ok(());
        }
        out.append_object(name, OrbValue::Material(material))?;
        self.materials += 1;
        Ok(())
    }
}

/// `r g b [a]` on the current line.
fn read_color(lexer: &mut Lexer) -> Result<Vec4> {
    let line = lexer.previous().line;
    let r = lexer.expect_number("Expected red component")?;
    let g = lexer.expect_number("Expected green component")?;
    let b = lexer.expect_number("Expected blue component")?;
    let a = if lexer.check(TokenKind::Number) && lexer.current().line == line {
        lexer.expect_number("Expected alpha component")?
    } else {
        1.0
    };
    Ok(Vec4::new(r, g, b, a))
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}
