use bytes::Bytes;

use super::{PageAddress, PageDelta, RecordType};
use crate::storage::DataPageVersions;
use crate::types::{PageId, PartitionId, Result};

/// Formats a page as an empty data page of a given format version.
///
/// The target buffer carries no usable header yet, so the handler is chosen
/// by the version stored in the record rather than read from the page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InitDataPageRecord {
    address: PageAddress,
    format_version: u16,
}

impl InitDataPageRecord {
    /// Builds the record.
    pub fn new(partition_id: PartitionId, page_id: PageId, format_version: u16) -> Self {
        Self {
            address: PageAddress::new(partition_id, page_id),
            format_version,
        }
    }

    /// Page being formatted.
    pub fn address(&self) -> PageAddress {
        self.address
    }

    /// Always [`RecordType::InitDataPage`].
    pub fn record_type(&self) -> RecordType {
        RecordType::InitDataPage
    }

    /// Format version the page is initialised with.
    pub fn format_version(&self) -> u16 {
        self.format_version
    }

    /// Formats `page`, discarding whatever it held.
    pub fn apply_delta(&self, page: &mut [u8], formats: &DataPageVersions) -> Result<()> {
        formats
            .for_version(self.format_version)?
            .init_page(page, self.address.page_id)
    }
}

/// Inserts a whole row that fits in a single page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InsertRowRecord {
    address: PageAddress,
    row: Bytes,
}

impl InsertRowRecord {
    /// Builds the record.
    pub fn new(partition_id: PartitionId, page_id: PageId, row: impl Into<Bytes>) -> Self {
        Self {
            address: PageAddress::new(partition_id, page_id),
            row: row.into(),
        }
    }

    /// Page receiving the row.
    pub fn address(&self) -> PageAddress {
        self.address
    }

    /// Always [`RecordType::InsertRow`].
    pub fn record_type(&self) -> RecordType {
        RecordType::InsertRow
    }

    /// Row bytes.
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// Length of the row in bytes.
    pub fn row_size(&self) -> usize {
        self.row.len()
    }

    /// Inserts the row through the format resolved from `page`.
    pub fn apply_delta(&self, page: &mut [u8], formats: &DataPageVersions) -> Result<()> {
        formats.for_page(page)?.insert_row(page, &self.row)?;
        Ok(())
    }
}

/// Removes the item stored at a slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoveRowRecord {
    address: PageAddress,
    slot: u16,
}

impl RemoveRowRecord {
    /// Builds the record.
    pub fn new(partition_id: PartitionId, page_id: PageId, slot: u16) -> Self {
        Self {
            address: PageAddress::new(partition_id, page_id),
            slot,
        }
    }

    /// Page holding the item.
    pub fn address(&self) -> PageAddress {
        self.address
    }

    /// Always [`RecordType::RemoveRow`].
    pub fn record_type(&self) -> RecordType {
        RecordType::RemoveRow
    }

    /// Slot of the removed item.
    pub fn slot(&self) -> u16 {
        self.slot
    }

    /// Removes the item through the format resolved from `page`.
    pub fn apply_delta(&self, page: &mut [u8], formats: &DataPageVersions) -> Result<()> {
        formats.for_page(page)?.remove_row(page, self.slot)
    }
}

impl From<InitDataPageRecord> for PageDelta {
    fn from(record: InitDataPageRecord) -> Self {
        PageDelta::InitDataPage(record)
    }
}

impl From<InsertRowRecord> for PageDelta {
    fn from(record: InsertRowRecord) -> Self {
        PageDelta::InsertRow(record)
    }
}

impl From<RemoveRowRecord> for PageDelta {
    fn from(record: RemoveRowRecord) -> Self {
        PageDelta::RemoveRow(record)
    }
}
