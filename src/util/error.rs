//! Error types for the archive engine.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The container stream is malformed or unreadable. Aborts the call.
    #[error("Container stream error: {0}")]
    Container(String),

    /// The control file is missing, malformed, or carries an
    /// unsupported version.
    #[error("Control file error: {0}")]
    ControlFile(String),

    /// An archive entry name does not follow the path conventions.
    #[error("Bad entry name: {0}")]
    BadEntryName(String),

    /// An asset filename extension has no known asset kind.
    #[error("Unknown asset extension in entry: {0}")]
    UnknownExtension(String),

    /// An asset kind code outside the known enumeration.
    #[error("Unknown asset kind code: {0}")]
    UnknownAssetKind(i8),

    /// A serialized scene object could not be decoded.
    #[error("Object decode error in {name}: {reason}")]
    ObjectDecode { name: String, reason: String },

    /// An asset referenced by the scene is not present in the store.
    #[error("Asset not found: {0}")]
    AssetMissing(Uuid),

    /// Malformed XML in a crate-owned document.
    #[error("XML error: {0}")]
    Xml(String),

    /// Attribution table could not be loaded or saved.
    #[error("Attribution store error: {0}")]
    Attribution(String),

    /// A terrain heightmap payload has an invalid length.
    #[error("Terrain payload length {0} is not a multiple of 4")]
    TerrainLength(usize),

    /// Import aborted in strict mode after an entry-level failure.
    #[error("Import aborted: {0}")]
    ImportAborted(String),

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

    /// Create a container stream error.
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Create an XML parse error.
    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml(msg.into())
    }

    /// True for errors that abort a whole import rather than one entry.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(
            self,
            Self::Container(_) | Self::ControlFile(_) | Self::Io(_) | Self::ImportAborted(_)
        )
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
