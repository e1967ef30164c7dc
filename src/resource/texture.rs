//! Texture resources: either embedded bytes or a path the runtime resolves.

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrbTexture {
    /// Source path (stored as-is for references).
    pub path: String,
    /// Raw file contents, empty for references.
    pub data: Vec<u8>,
    /// Store only the path, not the bytes.
    pub only_reference: bool,
}

impl OrbTexture {
    /// Texture that the runtime loads from `path`.
    pub fn reference(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: Vec::new(),
            only_reference: true,
        }
    }

    /// Texture embedded in the container.
    pub fn embedded(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
            only_reference: false,
        }
    }
}
