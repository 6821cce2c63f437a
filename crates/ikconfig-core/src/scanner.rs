//! Exact byte-pattern search over in-memory buffers and files.
//!
//! The scanner reports the lowest offset at which a pattern occurs
//! contiguously. It never reads past the end of the buffer: a candidate
//! whose remaining suffix is shorter than the pattern is rejected.
//!
//! ```
//! use ikconfig_core::scanner::search;
//!
//! let mut image = vec![0u8; 2048];
//! image[1022..1024].copy_from_slice(&[0x13, 0x37]);
//! assert_eq!(search(&image, &[0x13, 0x37])?, 1022);
//! # Ok::<(), ikconfig_core::Error>(())
//! ```

use crate::error::{Error, Result};
use memchr::memmem;
use std::path::Path;
use tracing::trace;

/// Find the first occurrence of `pattern` in `haystack`.
///
/// Returns [`Error::EmptyPattern`] for a zero-length pattern and
/// [`Error::PatternNotFound`] when the pattern does not occur.
pub fn search(haystack: &[u8], pattern: &[u8]) -> Result<usize> {
    if pattern.is_empty() {
        return Err(Error::EmptyPattern);
    }

    match memmem::find(haystack, pattern) {
        Some(offset) => {
            trace!(
                "Found {} byte pattern at offset {} of {}",
                pattern.len(),
                offset,
                haystack.len()
            );
            Ok(offset)
        }
        None => Err(Error::pattern_not_found(pattern)),
    }
}

/// Every non-overlapping offset at which `pattern` starts, in ascending order.
///
/// Returns [`Error::EmptyPattern`] for a zero-length pattern.
pub fn search_all<'a>(
    haystack: &'a [u8],
    pattern: &'a [u8],
) -> Result<impl Iterator<Item = usize> + 'a> {
    if pattern.is_empty() {
        return Err(Error::EmptyPattern);
    }
    Ok(memmem::find_iter(haystack, pattern))
}

/// Read a file fully and search it for `pattern`.
///
/// Read failures surface as [`Error::FileRead`], distinct from
/// [`Error::PatternNotFound`].
pub fn search_file(path: impl AsRef<Path>, pattern: &[u8]) -> Result<usize> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    search(&data, pattern)
}

/// Check whether `haystack` starts with `signature`.
pub(crate) fn has_prefix(haystack: &[u8], signature: &[u8]) -> bool {
    !signature.is_empty() && haystack.starts_with(signature)
}
