//! Page-format handlers and the registry that resolves them from a page.
//!
//! Records never know how rows are laid out inside a page. They ask a
//! [`DataPageVersions`] registry for the handler that owns a buffer (by the
//! format version stamped in its header) and hand the mutation to it. New
//! layouts are added by registering another [`DataPageFormat`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::storage::data_page::DataPageV1;
use crate::types::page::{PageHeader, PageKind};
use crate::types::{PageId, PageLogError, Result};

/// An item read back from a data page slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataItem<'a> {
    /// A complete row.
    Row(&'a [u8]),
    /// One fragment of a row together with the link it points at.
    Fragment {
        /// Fragment bytes.
        payload: &'a [u8],
        /// Link to the next fragment in the chain.
        next_link: u64,
    },
    /// A removed item whose slot is kept so later slot numbers stay stable.
    Removed,
}

/// Layout-specific operations on a data page buffer.
///
/// Every mutating method either applies completely or returns an error and
/// leaves the buffer untouched. All rejections of a page are reported as
/// [`PageLogError::Corruption`].
pub trait DataPageFormat: Send + Sync {
    /// Version number stamped into pages this handler formats.
    fn version(&self) -> u16;

    /// Formats `page` as an empty data page owned by this handler.
    fn init_page(&self, page: &mut [u8], page_id: PageId) -> Result<()>;

    /// Stores a whole row and returns its slot.
    fn insert_row(&self, page: &mut [u8], row: &[u8]) -> Result<u16>;

    /// Stores one row fragment linked to `last_link` and returns its slot.
    fn append_row_fragment(&self, page: &mut [u8], payload: &[u8], last_link: u64) -> Result<u16>;

    /// Marks the item at `slot` removed.
    fn remove_row(&self, page: &mut [u8], slot: u16) -> Result<()>;

    /// Reads the item stored at `slot`.
    fn read_item<'a>(&self, page: &'a [u8], slot: u16) -> Result<DataItem<'a>>;

    /// Contiguous bytes still available for new items, including their slot entry.
    fn free_space(&self, page: &[u8]) -> Result<usize>;
}

/// Registry mapping a data-page format version to its handler.
#[derive(Clone, Default)]
pub struct DataPageVersions {
    formats: BTreeMap<u16, Arc<dyn DataPageFormat>>,
}

impl DataPageVersions {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing every format shipped with this crate.
    pub fn standard() -> Self {
        let mut versions = Self::new();
        versions.register(Arc::new(DataPageV1));
        versions
    }

    /// Adds `format`, replacing any handler already registered for its version.
    pub fn register(&mut self, format: Arc<dyn DataPageFormat>) -> &mut Self {
        self.formats.insert(format.version(), format);
        self
    }

    /// Looks up the handler for `version`.
    pub fn for_version(&self, version: u16) -> Result<&dyn DataPageFormat> {
        self.formats
            .get(&version)
            .map(|format| format.as_ref())
            .ok_or(PageLogError::Corruption("unsupported data page format version"))
    }

    /// Resolves the handler that owns `page` from its header.
    pub fn for_page(&self, page: &[u8]) -> Result<&dyn DataPageFormat> {
        let header = PageHeader::decode(page)?;
        if header.kind != PageKind::Data {
            return Err(PageLogError::Corruption("page is not a data page"));
        }
        self.for_version(header.format_version)
    }

    /// Handler with the highest registered version.
    pub fn latest(&self) -> Result<&dyn DataPageFormat> {
        self.formats
            .values()
            .next_back()
            .map(|format| format.as_ref())
            .ok_or(PageLogError::NotFound)
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = u16> + '_ {
        self.formats.keys().copied()
    }
}

impl fmt::Debug for DataPageVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPageVersions")
            .field("versions", &self.formats.keys().collect::<Vec<_>>())
            .finish()
    }
}
