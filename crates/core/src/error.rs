//! Error types for Perlego operations.
//!
//! [`PerlegoError`] covers every failure surfaced by the library: markup parse
//! failures (with their entity context), serializer preconditions, fetching and
//! file I/O. Extraction that finds nothing readable is *not* an error; it is
//! reported through [`TranscodeResult::content_extracted`](crate::TranscodeResult).
//!
//! # Example
//!
//! ```rust
//! use perlego_core::{PerlegoError, Result};
//!
//! fn require_html(html: &str) -> Result<&str> {
//!     if html.trim().is_empty() {
//!         return Err(PerlegoError::EmptyInput("html"));
//!     }
//!     Ok(html)
//! }
//! # assert!(require_html("").is_err());
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for parsing, transcoding and fetching.
#[derive(Error, Debug)]
pub enum PerlegoError {
    /// The SGML tokenizer, DTD parser or reader rejected the input.
    #[error("Failed to parse markup: {0}")]
    Sgml(#[from] SgmlError),

    /// A required argument was null or empty at an API boundary.
    #[error("Argument can't be null nor empty: {0}")]
    EmptyInput(&'static str),

    /// The document does not satisfy the serializer's preconditions.
    #[error("{0}")]
    InvalidDocument(String),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Wraps standard I/O errors for file and stdin operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PerlegoError {
    /// Whether this is a parse failure caused by running out of input.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, PerlegoError::Sgml(e) if e.is_unexpected_eof())
    }
}

/// Result type alias for PerlegoError.
pub type Result<T> = std::result::Result<T, PerlegoError>;

/// Category of an [`SgmlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SgmlErrorKind {
    /// Malformed markup or declarations.
    Syntax,
    /// Input ended inside an open construct (literal, comment, CDATA content).
    UnexpectedEof,
}

/// Location inside one entity of the active entity stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFrame {
    pub name: String,
    pub line: usize,
    pub position: usize,
    pub is_internal: bool,
}

/// A parse failure raised while scanning an entity.
///
/// `context` lists the enclosing entities innermost first and is filled in by
/// the parser that owns the entity stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgmlError {
    pub kind: SgmlErrorKind,
    pub message: String,
    pub context: Vec<EntityFrame>,
}

impl SgmlError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self { kind: SgmlErrorKind::Syntax, message: message.into(), context: Vec::new() }
    }

    pub fn unexpected_eof(message: impl Into<String>) -> Self {
        Self { kind: SgmlErrorKind::UnexpectedEof, message: message.into(), context: Vec::new() }
    }

    pub fn is_unexpected_eof(&self) -> bool {
        self.kind == SgmlErrorKind::UnexpectedEof
    }

    /// Attaches the entity stack, unless an inner parser already did.
    pub fn with_context(mut self, context: Vec<EntityFrame>) -> Self {
        if self.context.is_empty() {
            self.context = context;
        }
        self
    }
}

impl fmt::Display for SgmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for frame in &self.context {
            write!(
                f,
                "\nReferenced on line {}, position {} of {} entity '{}'",
                frame.line,
                frame.position,
                if frame.is_internal { "internal" } else { "external" },
                frame.name
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for SgmlError {}
