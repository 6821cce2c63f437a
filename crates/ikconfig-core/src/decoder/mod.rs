//! Kernel image decompression and embedded-config location.
//!
//! ## Layout of an embedded config
//!
//! A kernel built with `CONFIG_IKCONFIG` carries its `.config` as a gzip
//! stream framed by two literals:
//!
//! ```text
//! "IKCFG_ST" <gzip stream of .config> "IKCFG_ED"
//! ```
//!
//! The decoder first decompresses the outer image (gzip, bzip2, xz, zstd or
//! none), searches the result for the marker, skips the fixed header and
//! inflates the inner gzip stream.
//!
//! The outer payload need not start at offset 0: in a bzImage it follows the
//! setup and decompressor stub. See [`ImageDecoder::decode_image`].
//!
//! Decompression is all-or-nothing: every concatenated member is decoded and
//! the materialized file is written only after the whole stream decoded
//! successfully.

mod format;
mod stream;

use crate::config::KernelConfigMap;
use crate::error::{Error, Result};
use crate::scanner;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, trace};

pub use format::{CompressionFormat, ParseFormatError, DETECTION_ORDER};

/// Start of the embedded config section
pub const IKCONFIG_MARKER: &[u8] = b"IKCFG";

/// Width of the section header, `"IKCFG_ST"`, measured from the marker offset
pub const IKCONFIG_HEADER_LEN: usize = 8;

/// Options for locating and materializing the embedded config
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Literal marking the start of the embedded config section
    pub marker: Vec<u8>,
    /// Bytes to skip from the marker offset to reach the inner gzip stream
    pub header_len: usize,
    /// Prefix for the per-image temporary directory
    pub temp_prefix: String,
    /// File name of the decompressed image inside the temporary directory
    pub file_name: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            marker: IKCONFIG_MARKER.to_vec(),
            header_len: IKCONFIG_HEADER_LEN,
            temp_prefix: "ikconfig".to_string(),
            file_name: "vmlinux".to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the embedded config marker
    pub fn marker(mut self, marker: impl Into<Vec<u8>>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Sets the header width skipped after the marker offset
    pub fn header_len(mut self, len: usize) -> Self {
        self.header_len = len;
        self
    }

    /// Sets the temporary directory prefix
    pub fn temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Sets the materialized file name
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
}

/// A fully decompressed copy of a kernel image in its own temporary directory.
///
/// Dropping it removes the directory; [`Materialization::keep`] persists it.
#[derive(Debug)]
pub struct Materialization {
    dir: TempDir,
    path: PathBuf,
    format: CompressionFormat,
    payload_offset: usize,
}

impl Materialization {
    /// Path of the decompressed file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary directory holding the decompressed file
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Format that was actually decoded (never [`CompressionFormat::Unknown`])
    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    /// Offset of the compressed payload within the source image
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// Disable cleanup and return the decompressed file's path
    pub fn keep(self) -> PathBuf {
        let dir = self.dir.keep();
        dir.join(self.path.file_name().unwrap_or_default())
    }
}

/// A decoded image and where its compressed payload began in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Format that was decoded
    pub format: CompressionFormat,
    /// Offset of the compressed payload in the source bytes
    pub offset: usize,
    /// Decompressed bytes
    pub data: Vec<u8>,
}

/// Decompresses kernel images and extracts their embedded config
#[derive(Debug, Clone, Default)]
pub struct ImageDecoder {
    config: ExtractorConfig,
}

impl ImageDecoder {
    /// Creates a decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the decoder configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Decompress `source` into a fresh temporary directory.
    ///
    /// See [`ImageDecoder::decode_image`] for how the payload is found.
    /// [`CompressionFormat::None`] hard-links the source (copying when
    /// linking fails).
    pub fn decompress(
        &self,
        source: impl AsRef<Path>,
        format: CompressionFormat,
    ) -> Result<Materialization> {
        let source = source.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(&self.config.temp_prefix)
            .tempdir()
            .map_err(|e| {
                Error::directory_create(std::env::temp_dir().join(&self.config.temp_prefix), e)
            })?;
        let path = dir.path().join(&self.config.file_name);

        debug!(
            "Decompressing {} ({}) into {}",
            source.display(),
            format,
            path.display()
        );

        if format == CompressionFormat::None {
            link_or_copy(source, &path)?;
            return Ok(Materialization {
                dir,
                path,
                format,
                payload_offset: 0,
            });
        }

        let data = fs::read(source).map_err(|e| Error::file_read(source, e))?;
        let decoded = self.decode_image(&data, format)?;
        fs::write(&path, &decoded.data).map_err(|e| Error::file_write(&path, e))?;
        debug!(
            "Decoded {} bytes at offset {:#x} -> {} bytes",
            data.len() - decoded.offset,
            decoded.offset,
            decoded.data.len()
        );

        Ok(Materialization {
            dir,
            path,
            format: decoded.format,
            payload_offset: decoded.offset,
        })
    }

    /// Decode a kernel image whose compressed payload may not start at offset 0.
    ///
    /// A signature at offset 0 is authoritative: the whole input is decoded
    /// as that format and any failure is returned. Otherwise the payload is
    /// searched for, as in a bzImage where a setup stub precedes it: every
    /// occurrence of each candidate signature (the declared format, or
    /// [`DETECTION_ORDER`] for `Unknown`) is tried in ascending offset order, and
    /// the first one that decodes to an image containing the config marker
    /// wins. If none does, a declared format falls back to decoding from
    /// offset 0 (reporting its decode error) and `Unknown` fails with
    /// [`Error::UnrecognizedFormat`].
    pub fn decode_image(&self, data: &[u8], format: CompressionFormat) -> Result<DecodedImage> {
        let at_start = match format {
            CompressionFormat::None => Some(CompressionFormat::None),
            CompressionFormat::Unknown => CompressionFormat::detect(data).ok(),
            declared => declared
                .signature()
                .filter(|signature| scanner::has_prefix(data, signature))
                .map(|_| declared),
        };
        if let Some(format) = at_start {
            debug!("{} payload at offset 0", format);
            return decode_bytes(format, data).map(|decoded| DecodedImage {
                format,
                offset: 0,
                data: decoded,
            });
        }

        let candidates: &[CompressionFormat] = match format {
            CompressionFormat::Unknown => &DETECTION_ORDER,
            ref declared => std::slice::from_ref(declared),
        };
        for &candidate in candidates {
            // An embedded signature of an unsupported format cannot be verified
            if !candidate.is_supported() {
                continue;
            }
            let Some(signature) = candidate.signature() else {
                continue;
            };
            for offset in scanner::search_all(data, signature)? {
                match decode_bytes(candidate, &data[offset..]) {
                    Ok(decoded) if self.has_marker(&decoded) => {
                        debug!("Found {} payload at offset {:#x}", candidate, offset);
                        return Ok(DecodedImage {
                            format: candidate,
                            offset,
                            data: decoded,
                        });
                    }
                    Ok(_) => {
                        trace!("{} at {:#x} decodes without a config marker", candidate, offset)
                    }
                    Err(e) => trace!("{} at {:#x} does not decode: {}", candidate, offset, e),
                }
            }
        }

        match format {
            CompressionFormat::Unknown => Err(Error::UnrecognizedFormat),
            declared => decode_bytes(declared, data).map(|decoded| DecodedImage {
                format: declared,
                offset: 0,
                data: decoded,
            }),
        }
    }

    /// Read a decompressed image and return the embedded config marker offset
    pub fn locate_embedded_config(&self, decompressed: impl AsRef<Path>) -> Result<usize> {
        let path = decompressed.as_ref();
        let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        self.locate_embedded_config_in(&data)
    }

    /// Return the embedded config marker offset within a decompressed image
    pub fn locate_embedded_config_in(&self, image: &[u8]) -> Result<usize> {
        match scanner::search(image, &self.config.marker) {
            Ok(offset) => {
                debug!("Embedded config marker at offset {:#x}", offset);
                Ok(offset)
            }
            Err(Error::PatternNotFound { .. }) => {
                Err(Error::marker_not_found(&self.config.marker))
            }
            Err(e) => Err(e),
        }
    }

    fn has_marker(&self, image: &[u8]) -> bool {
        scanner::search(image, &self.config.marker).is_ok()
    }

    /// Extract the plain-text config from a decompressed image.
    ///
    /// The payload is a single gzip member; the `IKCFG_ED` trailer and the
    /// rest of the image after it are not part of it.
    pub fn embedded_config_text(&self, image: &[u8]) -> Result<String> {
        let offset = self.locate_embedded_config_in(image)?;
        let payload = offset
            .checked_add(self.config.header_len)
            .and_then(|start| image.get(start..))
            .filter(|payload| !payload.is_empty())
            .ok_or(Error::TruncatedPayload {
                offset,
                len: image.len(),
            })?;

        let mut text = Vec::new();
        stream::decode_member(CompressionFormat::Gzip, payload, &mut text)
            .map_err(|e| Error::decode(CompressionFormat::Gzip, e))?;
        debug!("Embedded config is {} bytes of text", text.len());
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// Extract and parse the config from a decompressed image
    pub fn extract_config(&self, image: &[u8]) -> Result<KernelConfigMap> {
        let text = self.embedded_config_text(image)?;
        Ok(KernelConfigMap::parse(&text))
    }
}

/// Replace [`CompressionFormat::Unknown`] with the detected format
fn resolve_format(data: &[u8], format: CompressionFormat) -> Result<CompressionFormat> {
    if format != CompressionFormat::Unknown {
        return Ok(format);
    }
    let detected = CompressionFormat::detect(data)?;
    debug!("Detected {} compression", detected);
    Ok(detected)
}

/// Decode a complete stream held in memory, starting at offset 0.
///
/// Every concatenated member is decoded; bytes after the last member that do
/// not start another one are ignored. `Unknown` detects the signature first;
/// `None` returns the input unchanged. LZMA, LZO and LZ4 always fail with
/// [`Error::UnsupportedFormat`].
pub fn decode_bytes(format: CompressionFormat, data: &[u8]) -> Result<Vec<u8>> {
    let format = resolve_format(data, format)?;
    if !format.is_supported() {
        return Err(Error::UnsupportedFormat { format });
    }
    if format == CompressionFormat::None {
        return Ok(data.to_vec());
    }

    trace!("Decoding {} bytes as {}", data.len(), format);
    stream::decode_stream(format, data).map_err(|e| Error::decode(format, e))
}

/// Alias `source` at `dest` without copying when the filesystem allows it
fn link_or_copy(source: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::file_read(source, e)),
        Err(e) => {
            trace!("Hard link failed ({}), copying instead", e);
            fs::copy(source, dest)
                .map(|_| ())
                .map_err(|e| Error::file_write(dest, e))
        }
    }
}
