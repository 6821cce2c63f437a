//! Compression format tags and their magic signatures.
//!
//! Every tag maps to an optional signature. Tags without one (`none`,
//! `unknown`) can only be selected explicitly, never by detection.

use crate::error::{Error, Result};
use crate::scanner::has_prefix;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Compression applied to a kernel image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionFormat {
    /// gzip (`CONFIG_KERNEL_GZIP`)
    Gzip,
    /// bzip2 (`CONFIG_KERNEL_BZIP2`)
    Bzip2,
    /// Legacy LZMA-alone (`CONFIG_KERNEL_LZMA`)
    Lzma,
    /// xz (`CONFIG_KERNEL_XZ`)
    Xz,
    /// LZO as written by lzop (`CONFIG_KERNEL_LZO`)
    Lzo,
    /// LZ4 legacy frame (`CONFIG_KERNEL_LZ4`)
    Lz4,
    /// Zstandard (`CONFIG_KERNEL_ZSTD`)
    Zstd,
    /// Uncompressed image
    None,
    /// Identify the format by its signature
    Unknown,
}

/// Fixed order for auto-detection. The first matching signature wins.
pub const DETECTION_ORDER: [CompressionFormat; 7] = [
    CompressionFormat::Gzip,
    CompressionFormat::Xz,
    CompressionFormat::Bzip2,
    CompressionFormat::Lzma,
    CompressionFormat::Lzo,
    CompressionFormat::Lz4,
    CompressionFormat::Zstd,
];

impl CompressionFormat {
    /// All tags, in declaration order
    pub const ALL: [CompressionFormat; 9] = [
        Self::Gzip,
        Self::Bzip2,
        Self::Lzma,
        Self::Xz,
        Self::Lzo,
        Self::Lz4,
        Self::Zstd,
        Self::None,
        Self::Unknown,
    ];

    /// Magic bytes at the start of a stream in this format, if it has any
    pub fn signature(self) -> Option<&'static [u8]> {
        match self {
            Self::Gzip => Some(&[0x1f, 0x8b, 0x08]),
            Self::Bzip2 => Some(b"BZh"),
            Self::Lzma => Some(&[0x5d, 0x00, 0x00]),
            Self::Xz => Some(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
            Self::Lzo => Some(&[0x89, b'L', b'Z', b'O']),
            Self::Lz4 => Some(&[0x02, 0x21, 0x4c, 0x18]),
            Self::Zstd => Some(&[0x28, 0xb5, 0x2f, 0xfd]),
            Self::None | Self::Unknown => None,
        }
    }

    /// Whether this crate can decode the format
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Gzip | Self::Bzip2 | Self::Xz | Self::Zstd | Self::None
        )
    }

    /// Lowercase name of the format
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Lzma => "lzma",
            Self::Xz => "xz",
            Self::Lzo => "lzo",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }

    /// Identify a stream by its leading signature.
    ///
    /// Tries [`DETECTION_ORDER`] and returns the first format whose signature
    /// prefixes `data`, or [`Error::UnrecognizedFormat`].
    pub fn detect(data: &[u8]) -> Result<Self> {
        for format in DETECTION_ORDER {
            let Some(signature) = format.signature() else {
                continue;
            };
            trace!("Checking {} signature {:02x?}", format, signature);
            if has_prefix(data, signature) {
                return Ok(format);
            }
        }
        Err(Error::UnrecognizedFormat)
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown format name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFormatError(String);

impl fmt::Display for ParseFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown compression format name '{}'", self.0)
    }
}

impl std::error::Error for ParseFormatError {}

impl FromStr for CompressionFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "lzma" => Ok(Self::Lzma),
            "xz" => Ok(Self::Xz),
            "lzo" => Ok(Self::Lzo),
            "lz4" => Ok(Self::Lz4),
            "zstd" | "zst" => Ok(Self::Zstd),
            "none" => Ok(Self::None),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}
