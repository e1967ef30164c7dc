//! Utility types shared across the pipeline.
//!
//! - [`Error`] / [`Result`] / [`ParseError`] - Error handling
//! - Math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
