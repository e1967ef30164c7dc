//! Conversion options.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::{Error, Result};

/// Options threaded through every reader and the container writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Fan-triangulate polygons with more than three corners (warning once
    /// per file). When off, such polygons fail the conversion.
    pub triangulate: bool,
    /// Uniform scale applied to FBX positions (FBX files are in centimeters).
    pub fbx_unit_scale: f32,
    /// Shader compiler executable used for `compile(...)` shaders.
    pub compiler: PathBuf,
    /// Extra arguments passed to the shader compiler.
    pub compiler_flags: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            triangulate: false,
            fbx_unit_scale: 0.01,
            compiler: PathBuf::from("fxc"),
            compiler_flags: Vec::new(),
        }
    }
}

impl ConvertOptions {
    /// Per-user options file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("orbtool");
            p.push("options.json");
            p
        })
    }

    /// Load options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::open(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::other(format!("Invalid options file {}: {}", path.display(), e)))
    }

    /// Load the per-user options, falling back to defaults.
    pub fn load_or_default() -> Self {
        Self::default_path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }
}
