//! Input dispatch by file extension.

use std::path::Path;

use tracing::info;

use crate::config::ConvertOptions;
use crate::fbx::FbxReader;
use crate::intermediate::OrbIntermediate;
use crate::raw::RawReader;
use crate::util::{Error, Result};
use crate::wavefront::{MtlReader, ObjReader};

/// Input formats with a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Fbx,
    Obj,
    Mtl,
    Raw,
}

impl InputFormat {
    /// Format for `path`, by case-insensitive extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "fbx" => Some(Self::Fbx),
            "obj" => Some(Self::Obj),
            "mtl" => Some(Self::Mtl),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

/// Read `path` with the reader its extension selects, appending to `out`.
pub fn load_file(path: &Path, out: &mut OrbIntermediate, options: &ConvertOptions) -> Result<()> {
    let format = InputFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
    info!("loading {} as {:?}", path.display(), format);
    match format {
        InputFormat::Fbx => {
            FbxReader::new(options).read_file(path, out)?;
        }
        InputFormat::Obj => {
            ObjReader::new(options).read_file(path, out)?;
        }
        InputFormat::Mtl => {
            MtlReader::new().read_file(path, out)?;
        }
        InputFormat::Raw => RawReader::new(options).read_file(path, out)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a/b.FBX")), Some(InputFormat::Fbx));
        assert_eq!(InputFormat::from_path(Path::new("scene.raw")), Some(InputFormat::Raw));
        assert_eq!(InputFormat::from_path(Path::new("lib.Mtl")), Some(InputFormat::Mtl));
        assert_eq!(InputFormat::from_path(Path::new("mesh.glb")), None);
        assert_eq!(InputFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_unsupported_format() {
        let mut out = OrbIntermediate::new();
        let err = load_file(Path::new("mesh.glb"), &mut out, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref p) if p == &PathBuf::from("mesh.glb")));
    }

    #[test]
    fn test_load_obj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.OBJ");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mut out = OrbIntermediate::new();
        load_file(&path, &mut out, &ConvertOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let mut out = OrbIntermediate::new();
        let err = load_file(Path::new("/nonexistent/x.mtl"), &mut out, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
