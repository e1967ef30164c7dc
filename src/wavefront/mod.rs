//! Wavefront OBJ/MTL input.

mod mtl;
mod obj;

pub use mtl::MtlReader;
pub use obj::ObjReader;
