//! Shared tokenizer for the text readers (OBJ, MTL and the raw scene DSL).
//!
//! Tokens are numbers, strings with resolved escapes, literals and single
//! character punctuation. `#` starts a comment that runs to the end of the
//! line.

#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenKind};
