//! Offline shader compilation backends.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::ConvertOptions;
use crate::resource::{CompileRequest, OrbShaderCode, ShaderSource};
use crate::util::{Error, Result};

/// Turns HLSL source into bytecode while a container is written.
pub trait ShaderCompiler {
    fn compile(&self, shader: &OrbShaderCode, request: &CompileRequest) -> Result<Vec<u8>>;
}

/// Rejects every compile request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCompiler;

impl ShaderCompiler for NoCompiler {
    fn compile(&self, shader: &OrbShaderCode, request: &CompileRequest) -> Result<Vec<u8>> {
        Err(Error::ShaderCompile(format!(
            "{} ({} {}): no shader compiler configured",
            shader.path.display(),
            request.entry_point,
            request.profile
        )))
    }
}

/// Runs the external `fxc` executable synchronously.
///
/// Extra flags come first on the command line, followed by
/// `/nologo /T <profile> /E <entry> /D NAME[=VALUE]... /Fo <output> <source>`.
#[derive(Clone, Debug)]
pub struct FxcCompiler {
    executable: PathBuf,
    flags: Vec<String>,
}

impl FxcCompiler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            flags: Vec::new(),
        }
    }

    pub fn from_options(options: &ConvertOptions) -> Self {
        Self {
            executable: options.compiler.clone(),
            flags: options.compiler_flags.clone(),
        }
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    fn run(&self, source: &Path, request: &CompileRequest) -> Result<Vec<u8>> {
        let output = tempfile::Builder::new().prefix("orbtool").suffix(".cso").tempfile()?;

        let mut command = Command::new(&self.executable);
        command
            .args(&self.flags)
            .arg("/nologo")
            .arg("/T")
            .arg(&request.profile)
            .arg("/E")
            .arg(&request.entry_point);
        for define in &request.macros {
            let arg = match &define.value {
                Some(value) => format!("{}={}", define.name, value),
                None => define.name.clone(),
            };
            command.arg("/D").arg(arg);
        }
        command.arg("/Fo").arg(output.path()).arg(source);
        debug!(command = ?command, "running shader compiler");

        let result = command.output().map_err(|e| {
            Error::ShaderCompile(format!("cannot run {}: {}", self.executable.display(), e))
        })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::ShaderCompile(format!(
                "{} exited with {} compiling {}:\n{}",
                self.executable.display(),
                result.status,
                source.display(),
                stderr.trim_end()
            )));
        }

        let bytecode = std::fs::read(output.path())?;
        if bytecode.is_empty() {
            return Err(Error::ShaderCompile(format!(
                "{} produced no bytecode for {}",
                self.executable.display(),
                source.display()
            )));
        }
        Ok(bytecode)
    }
}

impl ShaderCompiler for FxcCompiler {
    fn compile(&self, shader: &OrbShaderCode, request: &CompileRequest) -> Result<Vec<u8>> {
        let bytecode = match &shader.source {
            ShaderSource::Reference(path) => {
                return Err(Error::ShaderCompile(format!(
                    "{} is stored as a reference and cannot be compiled",
                    path
                )))
            }
            // Compile the file on disk when it is still there, so includes resolve.
            ShaderSource::Inline(_) if shader.path.is_file() => self.run(&shader.path, request)?,
            ShaderSource::Inline(source) => {
                let mut file = tempfile::Builder::new().prefix("orbtool").suffix(".hlsl").tempfile()?;
                file.write_all(source)?;
                file.flush()?;
                self.run(file.path(), request)?
            }
        };
        info!(
            "{}: compiled {} ({}) to {} bytes",
            shader.path.display(),
            request.entry_point,
            request.profile,
            bytecode.len()
        );
        Ok(bytecode)
    }
}
