//! Resource data model produced by the readers and consumed by the container
//! writer.
//!
//! - [`types`] - closed engine enums with explicit container codes
//! - [`OrbMaterial`], [`OrbMesh`], [`OrbTexture`]
//! - [`OrbShaderCode`], [`OrbShaderBinary`]
//! - pipeline state descriptions in [`state`]

pub mod types;
mod material;
mod mesh;
mod shader;
pub mod state;
mod texture;

pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use state::*;
pub use texture::*;
pub use types::*;
