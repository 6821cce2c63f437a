//! Kernel image handle tying a source file to its decompressed copy.

use crate::config::KernelConfigMap;
use crate::decoder::{CompressionFormat, ExtractorConfig, ImageDecoder, Materialization};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One kernel image on disk and, once decompressed, its materialization.
///
/// The compression format is fixed at construction. Decompressing with a
/// different format requires a new handle. The temporary materialization is
/// removed when the handle is dropped unless [`KernelImage::keep_decompressed`]
/// is called.
#[derive(Debug)]
pub struct KernelImage {
    path: PathBuf,
    compression: CompressionFormat,
    decoder: ImageDecoder,
    materialized: Option<Materialization>,
}

impl KernelImage {
    /// Create a handle for `path`, which must exist
    pub fn open(path: impl Into<PathBuf>, compression: CompressionFormat) -> Result<Self> {
        Self::with_config(path, compression, ExtractorConfig::default())
    }

    /// Create a handle with custom extraction options
    pub fn with_config(
        path: impl Into<PathBuf>,
        compression: CompressionFormat,
        config: ExtractorConfig,
    ) -> Result<Self> {
        let path = path.into();
        fs::metadata(&path).map_err(|e| Error::file_read(&path, e))?;
        Ok(Self {
            path,
            compression,
            decoder: ImageDecoder::with_config(config),
            materialized: None,
        })
    }

    /// Path of the source image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compression format the handle was created with
    pub fn compression(&self) -> CompressionFormat {
        self.compression
    }

    /// Format actually decoded, once decompressed
    pub fn resolved_compression(&self) -> Option<CompressionFormat> {
        self.materialized.as_ref().map(Materialization::format)
    }

    /// Offset of the compressed payload in the source, once decompressed
    pub fn payload_offset(&self) -> Option<usize> {
        self.materialized.as_ref().map(Materialization::payload_offset)
    }

    /// Path of the decompressed copy, once decompressed
    pub fn decompressed_path(&self) -> Option<&Path> {
        self.materialized.as_ref().map(Materialization::path)
    }

    /// Decompress the image, reusing an earlier materialization
    pub fn decompress(&mut self) -> Result<&Path> {
        let materialized = match self.materialized.take() {
            Some(materialized) => materialized,
            None => {
                let materialized = self.decoder.decompress(&self.path, self.compression)?;
                debug!(
                    "Materialized {} as {} ({})",
                    self.path.display(),
                    materialized.path().display(),
                    materialized.format()
                );
                materialized
            }
        };

        Ok(self.materialized.insert(materialized).path())
    }

    /// Offset of the embedded config marker in the decompressed image
    pub fn find_config_marker(&mut self) -> Result<usize> {
        let path = self.decompress()?.to_path_buf();
        self.decoder.locate_embedded_config(path)
    }

    /// The embedded `.config` as plain text
    pub fn config_text(&mut self) -> Result<String> {
        let path = self.decompress()?;
        let image = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        self.decoder.embedded_config_text(&image)
    }

    /// Extract and parse the embedded `.config`
    pub fn parse_config(&mut self) -> Result<KernelConfigMap> {
        let text = self.config_text()?;
        let config = KernelConfigMap::parse(&text);
        debug!("Parsed {} config entries from {}", config.len(), self.path.display());
        Ok(config)
    }

    /// Persist the decompressed copy past the handle's lifetime
    pub fn keep_decompressed(self) -> Option<PathBuf> {
        self.materialized.map(Materialization::keep)
    }
}
