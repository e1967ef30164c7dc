//! # Orbit assets
//!
//! Asset conversion pipeline for the Orbit engine. Source files (binary FBX,
//! Wavefront OBJ/MTL and the raw scene-description DSL) are read into an
//! [`OrbIntermediate`](intermediate::OrbIntermediate) of named resources,
//! which is then serialized into a single `.orb` container the runtime loads.
//!
//! ## Modules
//!
//! - [`util`] - errors and math re-exports
//! - [`config`] - conversion options
//! - [`lexer`] - tokenizer shared by the text readers
//! - [`fbx`] - binary FBX tree, scene graph and geometry baking
//! - [`wavefront`] - OBJ and MTL readers
//! - [`raw`] - raw scene-description reader
//! - [`resource`] - resource data model and engine enums
//! - [`intermediate`] - ordered, name-indexed resource collection
//! - [`orb`] - `.orb` container writer and reader
//! - [`loader`] - per-extension input dispatch
//!
//! ## Example
//!
//! ```ignore
//! use orbit_assets::prelude::*;
//!
//! let options = ConvertOptions::default();
//! let mut batch = OrbIntermediate::new();
//! load_file("crate.obj".as_ref(), &mut batch, &options)?;
//!
//! let mut writer = OrbWriter::create("crate.orb")?;
//! writer.write(&batch)?;
//! writer.finish()?;
//!
//! let mut file = OrbFile::open("crate.orb")?;
//! file.print_index(&mut std::io::stdout())?;
//! ```

pub mod util;
pub mod config;
pub mod lexer;
pub mod resource;
pub mod intermediate;
pub mod fbx;
pub mod wavefront;
pub mod raw;
pub mod orb;
pub mod loader;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ConvertOptions;
    pub use crate::intermediate::{OrbIntermediate, OrbObject, OrbValue};
    pub use crate::loader::load_file;
    pub use crate::orb::{FxcCompiler, NoCompiler, OrbFile, OrbItem, OrbPayload, OrbWriter, ShaderCompiler};
    pub use crate::resource::*;
    pub use crate::util::{Error, Result};
}
