//! Shader source and bytecode resources.

use std::path::PathBuf;

use super::types::ShaderType;

/// Where shader data lives.
#[derive(Clone, Debug, PartialEq)]
pub enum ShaderSource {
    /// Bytes stored in the container (HLSL text or bytecode).
    Inline(Vec<u8>),
    /// Path stored in the container; the runtime loads it.
    Reference(String),
}

impl ShaderSource {
    /// Container storage tag.
    pub const fn storage_code(&self) -> u8 {
        match self {
            Self::Inline(_) => 0,
            Self::Reference(_) => 1,
        }
    }

    /// Stored bytes: the data itself, or the reference path.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Inline(data) => data,
            Self::Reference(path) => path.as_bytes(),
        }
    }
}

/// Preprocessor definition passed to the shader compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderMacro {
    pub name: String,
    pub value: Option<String>,
}

/// Offline compilation request attached to shader source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRequest {
    pub entry_point: String,
    pub profile: String,
    pub macros: Vec<ShaderMacro>,
}

/// HLSL source resource. With a [`CompileRequest`] it is compiled while the
/// container is written and stored as bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbShaderCode {
    pub shader_type: ShaderType,
    pub source: ShaderSource,
    /// File the source was read from; handed to the compiler.
    pub path: PathBuf,
    pub compile: Option<CompileRequest>,
}

/// Precompiled shader bytecode resource.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbShaderBinary {
    pub shader_type: ShaderType,
    pub bytecode: ShaderSource,
}
