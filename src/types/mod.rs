#![forbid(unsafe_code)]
//! Identifiers, errors, and the shared on-disk page header.

use std::fmt;

/// Checksum helpers for log frames and page images.
pub mod checksum;

pub use checksum::{page_crc32, Checksum, Crc32Fast};

/// Identifies a single fixed-size page inside its partition's page store.
///
/// The value is opaque to records; only page stores interpret it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

/// Logical cache or table partition a page belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PartitionId(pub i32);

/// Log sequence number assigned by the redo log.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Lsn(pub u64);

impl PartitionId {
    /// Sentinel for records written outside a partitioned context.
    pub const UNSET: PartitionId = PartitionId(-1);

    /// Returns true unless this is [`PartitionId::UNSET`].
    pub const fn is_set(self) -> bool {
        self.0 != Self::UNSET.0
    }
}

impl Default for PartitionId {
    fn default() -> Self {
        Self::UNSET
    }
}

impl Lsn {
    /// Returns the following sequence number, or `None` once `u64::MAX` is reached.
    pub const fn checked_next(self) -> Option<Lsn> {
        match self.0.checked_add(1) {
            Some(next) => Some(Lsn(next)),
            None => None,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("unset")
        }
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    fn from(value: u64) -> Self {
        PageId(value)
    }
}

impl From<i32> for PartitionId {
    fn from(value: i32) -> Self {
        PartitionId(value)
    }
}

/// Errors surfaced by records, page formats, the redo log, and replay.
#[derive(thiserror::Error, Debug)]
pub enum PageLogError {
    /// Underlying file I/O failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// A page image or log frame cannot support the requested operation.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Same as [`PageLogError::Invalid`] with a formatted message.
    #[error("invalid argument: {0}")]
    InvalidOwned(String),
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,
}

impl PageLogError {
    /// Returns true for [`PageLogError::Corruption`].
    pub fn is_corruption(&self) -> bool {
        matches!(self, PageLogError::Corruption(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PageLogError>;

pub mod page {
    //! Common header shared by every page image.
    //!
    //! The header is the only part of a page that records and stores read
    //! directly; everything after it belongs to the page format identified by
    //! `kind` and `format_version`.

    use core::convert::{TryFrom, TryInto};

    use super::{Lsn, PageId, PageLogError, Result};

    /// Magic bytes at the start of every initialised page.
    pub const PAGE_MAGIC: [u8; 4] = *b"PGLG";
    /// Page size used when none is configured.
    pub const DEFAULT_PAGE_SIZE: u32 = 4096;
    /// Smallest supported page size.
    pub const MIN_PAGE_SIZE: u32 = 128;
    /// Largest supported page size; in-page offsets are 16-bit.
    pub const MAX_PAGE_SIZE: u32 = 32 * 1024;
    /// Length of the common header in bytes.
    pub const PAGE_HDR_LEN: usize = 32;

    pub mod header {
        //! Byte offsets for fixed header fields.
        use core::ops::Range;

        pub const MAGIC: Range<usize> = 0..4;
        pub const FORMAT_VERSION: Range<usize> = 4..6;
        pub const PAGE_KIND: usize = 6;
        pub const RESERVED: usize = 7;
        pub const PAGE_SIZE: Range<usize> = 8..12;
        pub const PAGE_ID: Range<usize> = 12..20;
        pub const PAGE_LSN: Range<usize> = 20..28;
        pub const CRC32: Range<usize> = 28..32;
    }

    /// Kind of content stored after the common header.
    #[repr(u8)]
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub enum PageKind {
        /// Slotted page holding rows and row fragments.
        Data = 1,
    }

    impl PageKind {
        /// Returns the persisted byte for this kind.
        pub const fn as_u8(self) -> u8 {
            self as u8
        }
    }

    impl TryFrom<u8> for PageKind {
        type Error = PageLogError;

        fn try_from(value: u8) -> Result<Self> {
            match value {
                1 => Ok(PageKind::Data),
                _ => Err(PageLogError::Corruption("unknown page kind")),
            }
        }
    }

    /// Decoded common page header.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct PageHeader {
        /// Version of the format handler that owns the page body.
        pub format_version: u16,
        /// Kind of page body.
        pub kind: PageKind,
        /// Size of the whole page in bytes.
        pub page_size: u32,
        /// Page this image belongs to.
        pub page_id: PageId,
        /// LSN of the last redo record applied to this image.
        pub page_lsn: Lsn,
        /// Checksum stamped by the page store when the image was persisted.
        pub crc32: u32,
    }

    impl PageHeader {
        /// Builds a header for a fresh page.
        pub fn new(page_id: PageId, kind: PageKind, format_version: u16, page_size: u32) -> Result<Self> {
            validate_page_size(page_size)?;
            Ok(Self {
                format_version,
                kind,
                page_size,
                page_id,
                page_lsn: Lsn(0),
                crc32: 0,
            })
        }

        /// Writes the header into the first [`PAGE_HDR_LEN`] bytes of `dst`.
        pub fn encode(&self, dst: &mut [u8]) -> Result<()> {
            if dst.len() < PAGE_HDR_LEN {
                return Err(PageLogError::Invalid("page header buffer too small"));
            }
            let hdr = &mut dst[..PAGE_HDR_LEN];
            hdr[header::MAGIC].copy_from_slice(&PAGE_MAGIC);
            hdr[header::FORMAT_VERSION].copy_from_slice(&self.format_version.to_be_bytes());
            hdr[header::PAGE_KIND] = self.kind.as_u8();
            hdr[header::RESERVED] = 0;
            hdr[header::PAGE_SIZE].copy_from_slice(&self.page_size.to_be_bytes());
            hdr[header::PAGE_ID].copy_from_slice(&self.page_id.0.to_be_bytes());
            hdr[header::PAGE_LSN].copy_from_slice(&self.page_lsn.0.to_be_bytes());
            hdr[header::CRC32].copy_from_slice(&self.crc32.to_be_bytes());
            Ok(())
        }

        /// Parses and validates the header at the start of `src`.
        pub fn decode(src: &[u8]) -> Result<Self> {
            if src.len() < PAGE_HDR_LEN {
                return Err(PageLogError::Corruption("page header truncated"));
            }
            let hdr = &src[..PAGE_HDR_LEN];
            if hdr[header::MAGIC] != PAGE_MAGIC {
                return Err(PageLogError::Corruption("invalid page magic"));
            }
            if hdr[header::RESERVED] != 0 {
                return Err(PageLogError::Corruption("page header reserved byte not zero"));
            }
            let kind = PageKind::try_from(hdr[header::PAGE_KIND])?;
            let format_version = u16::from_be_bytes(array(&hdr[header::FORMAT_VERSION])?);
            let page_size = u32::from_be_bytes(array(&hdr[header::PAGE_SIZE])?);
            if page_size as usize != src.len() {
                return Err(PageLogError::Corruption("page size does not match buffer"));
            }
            let page_id = PageId(u64::from_be_bytes(array(&hdr[header::PAGE_ID])?));
            let page_lsn = Lsn(u64::from_be_bytes(array(&hdr[header::PAGE_LSN])?));
            let crc32 = u32::from_be_bytes(array(&hdr[header::CRC32])?);
            Ok(Self {
                format_version,
                kind,
                page_size,
                page_id,
                page_lsn,
                crc32,
            })
        }
    }

    /// Rejects page sizes outside [`MIN_PAGE_SIZE`]..=[`MAX_PAGE_SIZE`].
    pub fn validate_page_size(page_size: u32) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageLogError::InvalidOwned(format!(
                "page size {page_size} outside {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Returns true when `buf` starts with the page magic.
    pub fn is_initialized(buf: &[u8]) -> bool {
        buf.len() >= PAGE_HDR_LEN && buf[header::MAGIC] == PAGE_MAGIC
    }

    /// Reads the page LSN without validating the rest of the header.
    pub fn page_lsn(buf: &[u8]) -> Result<Lsn> {
        if buf.len() < PAGE_HDR_LEN {
            return Err(PageLogError::Corruption("page header truncated"));
        }
        Ok(Lsn(u64::from_be_bytes(array(&buf[header::PAGE_LSN])?)))
    }

    /// Stamps `lsn` as the last LSN applied to the page.
    pub fn set_page_lsn(buf: &mut [u8], lsn: Lsn) -> Result<()> {
        if buf.len() < PAGE_HDR_LEN {
            return Err(PageLogError::Invalid("page header buffer too small"));
        }
        buf[header::PAGE_LSN].copy_from_slice(&lsn.0.to_be_bytes());
        Ok(())
    }

    /// Reads the stored page checksum.
    pub fn stored_crc32(buf: &[u8]) -> Result<u32> {
        if buf.len() < PAGE_HDR_LEN {
            return Err(PageLogError::Corruption("page header truncated"));
        }
        Ok(u32::from_be_bytes(array(&buf[header::CRC32])?))
    }

    /// Writes the page checksum field.
    pub fn set_crc32(buf: &mut [u8], crc32: u32) -> Result<()> {
        if buf.len() < PAGE_HDR_LEN {
            return Err(PageLogError::Invalid("page header buffer too small"));
        }
        buf[header::CRC32].copy_from_slice(&crc32.to_be_bytes());
        Ok(())
    }

    /// Zeroes the page checksum field.
    pub fn clear_crc32(buf: &mut [u8]) -> Result<()> {
        set_crc32(buf, 0)
    }

    fn array<const N: usize>(src: &[u8]) -> Result<[u8; N]> {
        src.try_into()
            .map_err(|_| PageLogError::Corruption("page header field truncated"))
    }
}
