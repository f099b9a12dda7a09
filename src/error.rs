use std::path::PathBuf;

/// Everything that can go wrong while parsing, editing, writing, or
/// path-resolving a GVDB tree.
///
/// This collapses the read-side and write-side error types the teacher crate
/// keeps separate, because here both sides operate on the same `tree`
/// module and share most of the failure modes (a corrupt hash item and an
/// internal writer miscount are both "this tree/file is not a valid GVDB").
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad signature or unsupported version word in the file header.
    #[error("invalid GVDB header: {0}")]
    InvalidHeader(String),

    /// An offset, length, or alignment was out of bounds for the data at hand.
    #[error("truncated or out-of-bounds data: {0}")]
    Truncated(String),

    /// A hash item's `type_char` was not `v`/`H`/`L`, or an operation expected
    /// a different node tag than the one found.
    #[error("unexpected type: {0}")]
    BadType(String),

    /// A path string did not satisfy the directory-path / key-path grammar.
    #[error("invalid path syntax: {0}")]
    PathSyntax(String),

    /// A path segment does not exist, or the resolved node's type did not
    /// match what the caller asked for.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted to attach a node that already has a parent.
    #[error("node already has a parent")]
    DuplicateParent,

    /// A serialized key would exceed 65535 bytes.
    #[error("key too long: {0} bytes (max 65535)")]
    KeyTooLong(usize),

    /// A writer invariant was violated (bucket collision, padding gap of 8
    /// bytes or more, size-accounting mismatch).
    #[error("internal writer layout error: {0}")]
    InternalLayout(String),

    /// Underlying read/write failure. Carries the path if one was available.
    #[error("I/O error{}: {source}", .path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    Io {
        #[source]
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// Failure inside the delegate variant-serialization library.
    #[error("variant error: {0}")]
    Variant(#[from] zvariant::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io {
            source,
            path: Some(path),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source, path: None }
    }
}

/// The `Result` type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
