//! Raw scene description reader.
//!
//! A `.raw` file lists what goes into a container:
//!
//! ```text
//! read {
//!     "meshes/crate.fbx";
//!     "textures/crate.dds" as TEXTURE "crate_albedo";
//!     "textures/sky.dds" as TEXTURE "sky" reference();
//!     "shaders/basic.hlsl" as SHADER(VERTEX) "basic_vs" compile("main", "vs_5_0") ["SKINNED" = "1"];
//! };
//!
//! new PIPELINE_STATE as "basic" {
//!     vertex_shader = "basic_vs";
//!     rasterizer_state = new RASTERIZER_STATE { cull = NONE; };
//! };
//! ```
//!
//! Relative paths resolve against the directory of the `.raw` file.

mod declare;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ConvertOptions;
use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::lexer::{Lexer, TokenKind};
use crate::loader::{load_file, InputFormat};
use crate::resource::*;
use crate::util::{Error, ParseErrorKind, Result};

use declare::{expect_keyword, parse_new};

/// Reads raw scene descriptions, pulling in every file they list.
#[derive(Debug)]
pub struct RawReader<'a> {
    options: &'a ConvertOptions,
    /// Canonical paths of the raw files currently being read, outermost first.
    includes: Vec<PathBuf>,
}

/// What a `read` item turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemKind {
    Texture,
    Shader(ShaderType),
    ShaderBinary(ShaderType),
}

impl<'a> RawReader<'a> {
    pub fn new(options: &'a ConvertOptions) -> Self {
        Self { options, includes: Vec::new() }
    }

    pub fn read_file(&self, path: impl AsRef<Path>, out: &mut OrbIntermediate) -> Result<()> {
        let path = path.as_ref();
        let mut lexer = Lexer::open(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut includes = self.includes.clone();
        includes.push(std::fs::canonicalize(path).map_err(|e| Error::open(path, e))?);
        let reader = RawReader { options: self.options, includes };

        let before = out.len();
        reader.read(&mut lexer, base_dir, out)?;
        info!("{}: {} resource(s)", path.display(), out.len() - before);
        Ok(())
    }

    /// Read directives until end of input.
    pub fn read(&self, lexer: &mut Lexer, base_dir: &Path, out: &mut OrbIntermediate) -> Result<()> {
        while !lexer.at_end() {
            if lexer.matches_literal("read") {
                self.read_block(lexer, base_dir, out)?;
            } else if lexer.matches_literal("new") {
                parse_new(lexer, out, None)?;
            } else if lexer.check(TokenKind::Literal) {
                let token = lexer.current().clone();
                return Err(lexer.error_at(
                    ParseErrorKind::UnknownKeyword,
                    token.line,
                    format!("Unknown directive '{}', expected 'read' or 'new'", token.lexeme),
                ));
            } else {
                return Err(lexer.unexpected("Expected 'read' or 'new'"));
            }
            lexer.expect(TokenKind::Semicolon, "Expected ';' after directive")?;
        }
        Ok(())
    }

    fn read_block(&self, lexer: &mut Lexer, base_dir: &Path, out: &mut OrbIntermediate) -> Result<()> {
        lexer.expect(TokenKind::LCurly, "Expected '{' after 'read'")?;
        while !lexer.matches(TokenKind::RCurly) {
            let file = lexer.expect_string("Expected a file path")?;
            let line = lexer.previous().line;
            let path = base_dir.join(&file);

            if lexer.matches_literal("as") {
                self.read_item(lexer, &file, &path, line, out)?;
            } else if InputFormat::from_path(&path) == Some(InputFormat::Raw) {
                let target = std::fs::canonicalize(&path).map_err(|e| Error::open(&path, e))?;
                if self.includes.contains(&target) {
                    return Err(lexer.error_at(
                        ParseErrorKind::Semantic,
                        line,
                        format!("'{}' is already being read; raw files cannot include themselves", file),
                    ));
                }
                debug!(file = %path.display(), "reading nested raw file");
                self.read_file(&path, out)?;
            } else {
                debug!(file = %path.display(), "loading listed file");
                load_file(&path, out, self.options)?;
            }
            lexer.expect(TokenKind::Semicolon, "Expected ';' after read item")?;
        }
        Ok(())
    }

    /// `"file" as KIND "name" modifiers...`
    fn read_item(
        &self,
        lexer: &mut Lexer,
        file: &str,
        path: &Path,
        line: u32,
        out: &mut OrbIntermediate,
    ) -> Result<()> {
        let kind = read_kind(lexer)?;
        let name = lexer.expect_string("Expected a resource name")?;

        let mut reference: Option<String> = None;
        let mut compile: Option<CompileRequest> = None;
        loop {
            if lexer.matches_literal("reference") {
                lexer.expect(TokenKind::LParen, "Expected '(' after 'reference'")?;
                let target = if lexer.check(TokenKind::String) {
                    lexer.expect_string("Expected a reference path")?
                } else {
                    file.to_string()
                };
                lexer.expect(TokenKind::RParen, "Expected ')'")?;
                reference = Some(target);
            } else if lexer.matches_literal("compile") {
                compile = Some(read_compile(lexer)?);
            } else {
                break;
            }
        }

        let value = match kind {
            ItemKind::Texture => {
                if compile.is_some() {
                    return Err(lexer.error_at(ParseErrorKind::Semantic, line, "Textures cannot be compiled"));
                }
                match reference {
                    Some(target) => OrbValue::Texture(OrbTexture::reference(target)),
                    None => OrbValue::Texture(OrbTexture::embedded(file, read_bytes(path)?)),
                }
            }
            ItemKind::Shader(shader_type) => {
                let source = match (&reference, &compile) {
                    (Some(_), Some(_)) => {
                        return Err(lexer.error_at(
                            ParseErrorKind::Semantic,
                            line,
                            "A compiled shader cannot also be stored as a reference",
                        ))
                    }
                    (Some(target), None) => ShaderSource::Reference(target.clone()),
                    (None, _) => ShaderSource::Inline(read_bytes(path)?),
                };
                OrbValue::ShaderCode(OrbShaderCode {
                    shader_type,
                    source,
                    path: path.to_path_buf(),
                    compile,
                })
            }
            ItemKind::ShaderBinary(shader_type) => {
                if compile.is_some() {
                    return Err(lexer.error_at(
                        ParseErrorKind::Semantic,
                        line,
                        "SHADER_BINARY items are already compiled",
                    ));
                }
                let bytecode = match reference {
                    Some(target) => ShaderSource::Reference(target),
                    None => ShaderSource::Inline(read_bytes(path)?),
                };
                OrbValue::ShaderBinary(OrbShaderBinary { shader_type, bytecode })
            }
        };
        debug!(name = %name, kind = ?kind, "read item");
        out.append_object(name, value)?;
        Ok(())
    }
}

fn read_kind(lexer: &mut Lexer) -> Result<ItemKind> {
    let token = lexer.expect(TokenKind::Literal, "Expected TEXTURE, SHADER or SHADER_BINARY")?.clone();
    let stage = |lexer: &mut Lexer| -> Result<ShaderType> {
        lexer.expect(TokenKind::LParen, "Expected '(' and a shader stage")?;
        let stage = expect_keyword(lexer)?;
        lexer.expect(TokenKind::RParen, "Expected ')'")?;
        Ok(stage)
    };
    match token.lexeme.as_str() {
        "TEXTURE" => Ok(ItemKind::Texture),
        "SHADER" => Ok(ItemKind::Shader(stage(lexer)?)),
        "SHADER_BINARY" => Ok(ItemKind::ShaderBinary(stage(lexer)?)),
        other => Err(lexer.error_at(
            ParseErrorKind::UnknownKeyword,
            token.line,
            format!("Unknown item kind '{}', expected TEXTURE, SHADER or SHADER_BINARY", other),
        )),
    }
}

/// `("entry", "profile") [ "NAME" [= value], ... ]`
fn read_compile(lexer: &mut Lexer) -> Result<CompileRequest> {
    lexer.expect(TokenKind::LParen, "Expected '(' after 'compile'")?;
    let entry_point = lexer.expect_string("Expected an entry point")?;
    lexer.expect(TokenKind::Comma, "Expected ','")?;
    let profile = lexer.expect_string("Expected a shader profile")?;
    lexer.expect(TokenKind::RParen, "Expected ')'")?;

    let mut macros = Vec::new();
    if lexer.matches(TokenKind::LBracket) {
        while !lexer.check(TokenKind::RBracket) {
            let name = lexer.expect_string("Expected a macro name")?;
            let value = if lexer.matches(TokenKind::Equals) {
                if lexer.check(TokenKind::Number) {
                    Some(lexer.advance().lexeme.clone())
                } else {
                    Some(lexer.expect_string("Expected a macro value")?)
                }
            } else {
                None
            };
            macros.push(ShaderMacro { name, value });
            if !lexer.matches(TokenKind::Comma) {
                break;
            }
        }
        lexer.expect(TokenKind::RBracket, "Expected ']' to end the macro list")?;
    }
    Ok(CompileRequest { entry_point, profile, macros })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::open(path, e))
}
