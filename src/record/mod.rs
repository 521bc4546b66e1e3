//! Page-level redo records.
//!
//! A [`PageDelta`] describes one atomic mutation of one page. It names the
//! page through a [`PageAddress`], carries only the bytes needed to redo the
//! mutation, and replays it by handing the page buffer to the data-page
//! format that owns it. Records are immutable values; the page buffer is
//! borrowed mutably for the duration of [`PageDelta::apply_delta`] and the
//! caller is responsible for holding the page exclusively while it runs.

use core::convert::TryFrom;
use std::fmt;

use crate::storage::DataPageVersions;
use crate::types::{PageId, PageLogError, PartitionId, Result};

/// Binary encoding and tag-dispatched decoding of records.
pub mod codec;
mod data_page;
mod fragment;

pub use data_page::{InitDataPageRecord, InsertRowRecord, RemoveRowRecord};
pub use fragment::InsertFragmentRecord;

/// The page a record mutates.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageAddress {
    /// Partition owning the page; may be [`PartitionId::UNSET`].
    pub partition_id: PartitionId,
    /// Page inside the partition.
    pub page_id: PageId,
}

impl PageAddress {
    /// Builds an address.
    pub const fn new(partition_id: PartitionId, page_id: PageId) -> Self {
        Self {
            partition_id,
            page_id,
        }
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_id, self.page_id)
    }
}

/// Persisted tag identifying a record variant.
///
/// The numeric values are part of the log format and never change.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    /// [`InitDataPageRecord`].
    InitDataPage = 1,
    /// [`InsertRowRecord`].
    InsertRow = 2,
    /// [`InsertFragmentRecord`].
    InsertFragment = 3,
    /// [`RemoveRowRecord`].
    RemoveRow = 4,
}

impl RecordType {
    /// Every variant, in tag order.
    pub const ALL: [RecordType; 4] = [
        RecordType::InitDataPage,
        RecordType::InsertRow,
        RecordType::InsertFragment,
        RecordType::RemoveRow,
    ];

    /// Returns the persisted tag.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short lowercase name used in logs and tooling output.
    pub const fn name(self) -> &'static str {
        match self {
            RecordType::InitDataPage => "init_data_page",
            RecordType::InsertRow => "insert_row",
            RecordType::InsertFragment => "insert_fragment",
            RecordType::RemoveRow => "remove_row",
        }
    }
}

impl TryFrom<u8> for RecordType {
    type Error = PageLogError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::InitDataPage),
            2 => Ok(RecordType::InsertRow),
            3 => Ok(RecordType::InsertFragment),
            4 => Ok(RecordType::RemoveRow),
            _ => Err(PageLogError::Corruption("unknown delta record type")),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One page-level redo record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageDelta {
    /// Format a fresh data page.
    InitDataPage(InitDataPageRecord),
    /// Insert a whole row.
    InsertRow(InsertRowRecord),
    /// Append one fragment of a row's fragment chain.
    InsertFragment(InsertFragmentRecord),
    /// Remove the item at a slot.
    RemoveRow(RemoveRowRecord),
}

impl PageDelta {
    /// Page the record mutates.
    pub fn address(&self) -> PageAddress {
        match self {
            PageDelta::InitDataPage(rec) => rec.address(),
            PageDelta::InsertRow(rec) => rec.address(),
            PageDelta::InsertFragment(rec) => rec.address(),
            PageDelta::RemoveRow(rec) => rec.address(),
        }
    }

    /// Partition of the page the record mutates.
    pub fn partition_id(&self) -> PartitionId {
        self.address().partition_id
    }

    /// Page the record mutates.
    pub fn page_id(&self) -> PageId {
        self.address().page_id
    }

    /// Tag of this record's variant.
    pub fn record_type(&self) -> RecordType {
        match self {
            PageDelta::InitDataPage(_) => RecordType::InitDataPage,
            PageDelta::InsertRow(_) => RecordType::InsertRow,
            PageDelta::InsertFragment(_) => RecordType::InsertFragment,
            PageDelta::RemoveRow(_) => RecordType::RemoveRow,
        }
    }

    /// Redoes the mutation against `page`.
    ///
    /// The handler is resolved through `formats`; any rejection by the
    /// handler surfaces as [`PageLogError::Corruption`] and leaves the decision
    /// to continue or abort with the caller.
    pub fn apply_delta(&self, page: &mut [u8], formats: &DataPageVersions) -> Result<()> {
        match self {
            PageDelta::InitDataPage(rec) => rec.apply_delta(page, formats),
            PageDelta::InsertRow(rec) => rec.apply_delta(page, formats),
            PageDelta::InsertFragment(rec) => rec.apply_delta(page, formats),
            PageDelta::RemoveRow(rec) => rec.apply_delta(page, formats),
        }
    }
}

impl fmt::Display for PageDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.record_type(), self.address())?;
        match self {
            PageDelta::InitDataPage(rec) => write!(f, " version={}", rec.format_version()),
            PageDelta::InsertRow(rec) => write!(f, " row_len={}", rec.row_size()),
            PageDelta::InsertFragment(rec) => write!(
                f,
                " payload_len={} last_link={:#x}",
                rec.payload_size(),
                rec.last_link()
            ),
            PageDelta::RemoveRow(rec) => write!(f, " slot={}", rec.slot()),
        }
    }
}
