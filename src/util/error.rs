//! Error types for the asset pipeline.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Category of a text-format parse failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed character sequence reported by the lexer.
    Lexer,
    /// A token other than the expected one.
    UnexpectedToken,
    /// An enum keyword outside its accepted set.
    UnknownKeyword,
    /// A face index outside the valid range.
    IndexOutOfRange,
    /// A polygon with more than three corners while triangulation is off.
    UnsupportedPolygon,
    /// Anything else that is syntactically valid but meaningless.
    Semantic,
}

/// A fatal parse failure at a known source location.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at {}@{}: {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Main error type for conversion and container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Text format parse failure (OBJ, MTL, raw)
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Invalid magic bytes at start of an FBX file
    #[error("Invalid FBX file: expected Kaydara binary magic")]
    InvalidMagic,

    /// Structurally broken binary data
    #[error("Corrupted file: {0}")]
    Corrupted(String),

    /// Unexpected end of data
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// A polygon that cannot be stored without triangulation
    #[error("Mesh '{mesh}' has a polygon with {corners} vertices; enable triangulation to convert it")]
    UnsupportedPolygon { mesh: String, corners: usize },

    /// The container was written by a newer codec
    #[error("Container version {found} is newer than supported version {supported}; the parser is too old")]
    VersionTooNew { found: String, supported: String },

    /// The container was written by an older codec
    #[error("Container version {found} is deprecated (current {current}); the file needs an update")]
    DeprecatedVersion { found: String, current: String },

    /// Two objects with the same name in one intermediate
    #[error("Duplicate resource name: {0}")]
    DuplicateName(String),

    /// A cross-reference to a name that is not part of the write batch
    #[error("Resource '{from}' references unknown resource '{target}'")]
    UnresolvedReference { from: String, target: String },

    /// Resource id not present in the container index
    #[error("Resource id {0} not found")]
    ObjectNotFound(u64),

    /// Resource header does not match its index entry
    #[error("Resource id mismatch: expected {expected}, found {found}")]
    IdMismatch { expected: u64, found: u64 },

    /// Unknown enum discriminant in a container payload
    #[error("Invalid {what} value: {value}")]
    InvalidEnum { what: &'static str, value: u32 },

    /// File extension with no reader
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    /// External shader compiler failed
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a corruption error.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Map an open failure to `FileNotFound` when appropriate.
    pub fn open(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }

    /// Parse error kind, if this is a parse error.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Self::Parse(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
