//! # ikconfig-core
//!
//! A library for extracting the embedded `.config` from compiled Linux kernel images.
//!
//! This crate provides the core functionality for:
//! - Searching binary buffers for magic byte patterns
//! - Decompressing kernel images (gzip, bzip2, xz, zstd or uncompressed), including
//!   payloads that follow a bzImage setup stub
//! - Locating the `IKCFG_ST` section and inflating the embedded config
//! - Parsing the config text into a key/value mapping
//!
//! ## Architecture
//!
//! - [`scanner`]: Exact byte-pattern search
//! - [`decoder`]: Compression formats, image decompression and config location
//! - [`image`]: Per-image handle owning the temporary decompressed copy
//! - [`config`]: Parsed configuration mapping
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use ikconfig_core::{CompressionFormat, KernelImage};
//!
//! let mut kernel = KernelImage::open("/boot/vmlinuz-linux", CompressionFormat::Unknown)?;
//! let config = kernel.parse_config()?;
//!
//! println!("CONFIG_HZ={}", config.get("CONFIG_HZ")?);
//! # Ok::<(), ikconfig_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod image;
pub mod scanner;

// Re-export primary types for convenience
pub use config::{KernelConfigMap, Tristate};
pub use decoder::{
    decode_bytes, CompressionFormat, DecodedImage, ExtractorConfig, ImageDecoder,
    Materialization, IKCONFIG_HEADER_LEN, IKCONFIG_MARKER,
};
pub use error::{Error, Result};
pub use image::KernelImage;
pub use scanner::{search, search_all, search_file};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
