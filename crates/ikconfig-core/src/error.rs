//! Error types for the ikconfig-core library.
//!
//! Failures fall into four families: I/O errors (always carrying the path
//! involved), "not found" outcomes from the magic scanner and the config map,
//! format errors (unsupported or unrecognized compression), and decode errors
//! from a malformed or truncated stream.

use crate::decoder::CompressionFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ikconfig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all ikconfig operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the temporary materialization directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path (or prefix) of the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A search was requested with a zero-length pattern
    #[error("search pattern must not be empty")]
    EmptyPattern,

    /// The searched pattern does not occur in the buffer
    #[error("magic pattern {pattern:02x?} not found")]
    PatternNotFound {
        /// The pattern that was searched for
        pattern: Vec<u8>,
    },

    /// The embedded configuration marker does not occur in the decompressed image
    #[error("embedded config marker '{}' not found; was the kernel built with CONFIG_IKCONFIG?", String::from_utf8_lossy(.marker))]
    MarkerNotFound {
        /// The marker that was searched for
        marker: Vec<u8>,
    },

    /// The compression format has no decoder
    #[error("unsupported compression format: {format}")]
    UnsupportedFormat {
        /// The declared or detected format
        format: CompressionFormat,
    },

    /// No known signature matched during auto-detection
    #[error("unrecognized compression format: no known signature matches the image")]
    UnrecognizedFormat,

    /// The compressed stream is malformed or truncated
    #[error("failed to decode {format} stream: {source}")]
    Decode {
        /// Format of the stream being decoded
        format: CompressionFormat,
        /// Underlying decoder error
        #[source]
        source: std::io::Error,
    },

    /// The marker was found but the fixed header runs past the end of the image
    #[error("embedded config header at offset {offset} exceeds image length {len}")]
    TruncatedPayload {
        /// Offset of the marker
        offset: usize,
        /// Length of the decompressed image
        len: usize,
    },

    /// A configuration key is not present in the extracted mapping
    #[error("config key '{key}' not found")]
    KeyNotFound {
        /// The key that was looked up
        key: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new pattern-not-found error
    pub fn pattern_not_found(pattern: &[u8]) -> Self {
        Self::PatternNotFound {
            pattern: pattern.to_vec(),
        }
    }

    /// Creates a new marker-not-found error
    pub fn marker_not_found(marker: &[u8]) -> Self {
        Self::MarkerNotFound {
            marker: marker.to_vec(),
        }
    }

    /// Creates a new decode error
    pub fn decode(format: CompressionFormat, source: std::io::Error) -> Self {
        Self::Decode { format, source }
    }

    /// Creates a new key-not-found error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns true if this error reports something absent rather than broken
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PatternNotFound { .. } | Self::MarkerNotFound { .. } | Self::KeyNotFound { .. }
        )
    }

    /// Returns true if this is an I/O failure on a filesystem path
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::FileRead { .. } | Self::FileWrite { .. } | Self::DirectoryCreate { .. }
        )
    }
}
