//! Binary FBX input.
//!
//! - [`tree`] - generic node tree parser (magic, node records, typed and
//!   zlib-compressed array properties)
//! - [`scene`] - object graph: models, attributes, materials, textures and
//!   their connections
//! - [`geometry`] - geometry baking into [`OrbMesh`](crate::resource::OrbMesh)
//! - [`FbxReader`] - conversion into the intermediate

mod compression;
pub mod format;
pub mod geometry;
mod reader;
pub mod scene;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use reader::FbxReader;
pub use scene::{FbxLight, FbxLightType, FbxModel, FbxScene};
pub use tree::{FbxNode, FbxProperty, FbxTree};
