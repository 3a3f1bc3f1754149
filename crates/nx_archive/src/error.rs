//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::node::NodeKind;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// the archive is structurally invalid
    #[error("invalid archive: {0}")]
    #[diagnostic(code(nx::invalid_format))]
    InvalidFormat(String),

    /// an id referenced by the archive is outside its table
    #[error("{0} is out of range")]
    #[diagnostic(code(nx::out_of_range))]
    OutOfRange(#[from] OutOfRangeError),

    /// a payload could not be decoded
    #[error("corrupt data: {0}")]
    #[diagnostic(code(nx::corrupt_data))]
    CorruptData(String),

    /// a path segment did not match any node
    #[error("no node named {segment:?} under {consumed:?}")]
    #[diagnostic(code(nx::not_found))]
    NotFound {
        /// The segment that could not be resolved
        segment: String,
        /// The part of the path resolved before the failure
        consumed: String,
    },

    /// the archive has been disposed
    #[error("archive has been disposed")]
    Disposed,

    /// a typed accessor was used on a node of another kind
    #[error("expected {expected} node, found {found}")]
    TypeMismatch {
        /// The kind the accessor reads
        expected: NodeKind,
        /// The kind the node actually holds
        found: NodeKind,
    },
}

/// Error type to provide further information when an id is out of range
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRangeError {
    /// string id {0}
    #[error("string id {0}")]
    String(u32),

    /// image id {0}
    #[error("image id {0}")]
    Image(u32),

    /// audio id {0}
    #[error("audio id {0}")]
    Audio(u32),

    /// node id {0}
    #[error("node id {0}")]
    Node(u32),
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        match value {
            binrw::Error::BadMagic { .. } => Error::invalid("bad magic"),
            binrw::Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::invalid("truncated structure")
            }
            other => Error::invalid(other.to_string()),
        }
    }
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidFormat(message.into())
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptData(message.into())
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
