//! The `.orb` resource container.
//!
//! - [`OrbWriter`] - writes an intermediate, fresh or appended
//! - [`OrbFile`] - indexes a container and decodes single items
//! - [`ShaderCompiler`] - offline shader compilation backend used by the writer
//!
//! Layout and version rules live in [`format`].

mod compiler;
pub mod format;
mod payload;
mod reader;
mod stream;
mod writer;

pub use compiler::{FxcCompiler, NoCompiler, ShaderCompiler};
pub use format::{Version, CURRENT_VERSION};
pub use payload::{OrbPayload, SubmeshRecord};
pub use reader::{IndexEntry, OrbFile, OrbItem};
pub use writer::OrbWriter;
