// ABOUTME: Error types for object-graph encoding and decoding.
// ABOUTME: Each variant carries a stable snake_case name for test matching and logging.

use std::fmt;

/// The result type for graph codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while writing or reading an object graph.
///
/// Every error aborts the current top-level call only. The engine resets its
/// per-call state on the next call regardless of how the previous one ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unexpected end of input data.
    Truncated,

    /// Unconsumed bytes after decoding a complete root value.
    TrailingBytes,

    /// A slot marker that is neither null, new, nor a back-reference.
    InvalidMarker(u64),

    /// A runtime type tag that does not name a known type kind.
    InvalidTypeTag(u64),

    /// Invalid UTF-8 byte sequence in a string.
    InvalidUtf8,

    /// NUL (0x00) byte in a string (rejected by default).
    NulCharacter,

    /// Generic invalid data (bad boolean byte, malformed shape, ...).
    InvalidData(String),

    /// No codec can be dispatched for this type, even after generics fallback.
    UnresolvedType(String),

    /// A back-reference id that was never assigned in this call.
    DanglingBackReference(u64),

    /// A back-reference to an id whose instance has not been constructed yet.
    IdentityMismatch(u64),

    /// A fixed-capacity output buffer cannot accept more bytes.
    BufferExhausted,

    /// Graph nesting too deep.
    MaxDepthExceeded,

    /// String exceeds length limit.
    MaxStringLengthExceeded,

    /// Container has too many elements.
    MaxContainerSizeExceeded,

    /// A null value in a field declared non-nullable.
    NullNotAllowed(String),

    /// The runtime value does not match the statically resolved type.
    TypeMismatch {
        expected: String,
        found: String,
    },

    /// A class name or id was registered twice.
    DuplicateClass(String),

    /// A map in the stream repeats a key.
    DuplicateKey(String),

    /// IO error while flushing to the destination.
    Io(String),

    /// Custom error message (for user-supplied codecs).
    Custom(String),
}

impl Error {
    /// Returns the standardized error type name.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Truncated => "truncated",
            Error::TrailingBytes => "trailing_bytes",
            Error::InvalidMarker(_) => "invalid_marker",
            Error::InvalidTypeTag(_) => "invalid_type_tag",
            Error::InvalidUtf8 => "invalid_utf8",
            Error::NulCharacter => "nul_character",
            Error::InvalidData(_) => "invalid_data",
            Error::UnresolvedType(_) => "unresolved_type",
            Error::DanglingBackReference(_) => "dangling_back_reference",
            Error::IdentityMismatch(_) => "identity_mismatch",
            Error::BufferExhausted => "buffer_exhausted",
            Error::MaxDepthExceeded => "max_depth_exceeded",
            Error::MaxStringLengthExceeded => "max_string_length_exceeded",
            Error::MaxContainerSizeExceeded => "max_container_size_exceeded",
            Error::NullNotAllowed(_) => "null_not_allowed",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::DuplicateClass(_) => "duplicate_class",
            Error::DuplicateKey(_) => "duplicate_key",
            Error::Io(_) => "io_error",
            Error::Custom(_) => "custom",
        }
    }

    pub(crate) fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "unexpected end of input"),
            Error::TrailingBytes => write!(f, "trailing bytes after root value"),
            Error::InvalidMarker(m) => write!(f, "invalid slot marker: {m}"),
            Error::InvalidTypeTag(tag) => write!(f, "invalid type tag: {tag}"),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 sequence"),
            Error::NulCharacter => write!(f, "NUL character in string"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::UnresolvedType(ty) => write!(f, "no codec for type {ty}"),
            Error::DanglingBackReference(id) => write!(f, "back-reference to unknown id {id}"),
            Error::IdentityMismatch(id) => {
                write!(f, "back-reference to id {id} before its instance was constructed")
            }
            Error::BufferExhausted => write!(f, "output buffer capacity exhausted"),
            Error::MaxDepthExceeded => write!(f, "maximum graph depth exceeded"),
            Error::MaxStringLengthExceeded => write!(f, "maximum string length exceeded"),
            Error::MaxContainerSizeExceeded => write!(f, "maximum container size exceeded"),
            Error::NullNotAllowed(field) => write!(f, "null in non-nullable field `{field}`"),
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Error::DuplicateClass(name) => write!(f, "class `{name}` registered twice"),
            Error::DuplicateKey(key) => write!(f, "duplicate map key `{key}`"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
