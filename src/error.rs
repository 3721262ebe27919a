//! Error handling type.

use crate::value::Value;

/// Error when reading a serialization stream or related data structures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The stream violates the wire grammar: a bad header, an unknown token
    /// code, or a back-reference to a handle that was never assigned.
    #[error("corrupted stream: {0}")]
    StreamCorrupted(String),

    /// A class descriptor could not be reconciled with its local binding.
    #[error("invalid class {class:?}: {reason}")]
    InvalidClass {
        /// The fully-qualified name from the stream descriptor.
        class: String,
        /// Why the descriptor was rejected.
        reason: String,
    },

    /// An object in the stream violates a graph-level rule, such as a
    /// back-reference to an item that was read unshared.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// The resolution hook could not bind a stream class name.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// Primitive block data was found where an object item was expected.
    #[error("optional primitive data ahead of the next object ({remaining} bytes buffered)")]
    OptionalData {
        /// Bytes left in the current block-data frame.
        remaining: usize,
        /// Whether the end of the custom-data block was reached instead.
        at_end: bool,
    },

    /// An operation that is only meaningful inside a read hook was called
    /// outside of one.
    #[error("stream is not currently reading an object ({0})")]
    NotActive(&'static str),

    /// The stream carries the exception that aborted the original write.
    /// The payload is the reconstructed throwable graph.
    #[error("write aborted by an exception captured in the stream")]
    WriteAborted(Value),

    /// String data was not valid modified UTF-8.
    #[error("malformed modified utf-8 in string data")]
    MalformedUtf8,

    /// A `GetField` accessor was used with an unknown name or the wrong type.
    #[error("field {name:?}: {reason}")]
    FieldAccess {
        /// The requested field name.
        name: String,
        /// Why the access was rejected.
        reason: &'static str,
    },

    /// An I/O error occurred. Premature end of input arrives here with
    /// [`std::io::ErrorKind::UnexpectedEof`].
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
