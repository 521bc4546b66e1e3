#![forbid(unsafe_code)]

use super::page::header;

/// Incremental 32-bit checksum.
pub trait Checksum {
    /// Discards everything hashed so far.
    fn reset(&mut self);
    /// Feeds more bytes into the checksum.
    fn update(&mut self, bytes: &[u8]);
    /// Returns the checksum of all bytes fed since the last reset.
    fn finalize(&self) -> u32;
}

/// [`Checksum`] backed by `crc32fast`.
pub struct Crc32Fast {
    inner: crc32fast::Hasher,
}

impl Default for Crc32Fast {
    fn default() -> Self {
        Self {
            inner: crc32fast::Hasher::new(),
        }
    }
}

impl Checksum for Crc32Fast {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn finalize(&self) -> u32 {
        self.inner.clone().finalize()
    }
}

/// Checksums a full page image, treating its stored crc field as zero.
pub fn page_crc32(page: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    if page.len() < header::CRC32.end {
        hasher.update(page);
        return hasher.finalize();
    }
    hasher.update(&page[..header::CRC32.start]);
    hasher.update(&[0u8; 4]);
    hasher.update(&page[header::CRC32.end..]);
    hasher.finalize()
}
