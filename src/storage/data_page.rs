//! Version 1 slotted data page.
//!
//! ```text
//! +-------------------+ 0
//! | common header     |
//! +-------------------+ PAGE_HDR_LEN
//! | data header       |  slot_count | free_start | free_end | reserved
//! +-------------------+ BODY_START
//! | items ->          |
//! |      free space   |
//! |        <- slots   |
//! +-------------------+ page_size
//! ```
//!
//! Items grow up from `free_start`; the slot directory grows down from the
//! end of the page and `free_end` always equals its first byte. Each item
//! starts with a kind byte. Fragment items carry their next link right after
//! it.

use crate::primitives::bytes::be;
use crate::storage::format::{DataItem, DataPageFormat};
use crate::types::page::{self, PageHeader, PageKind, PAGE_HDR_LEN};
use crate::types::{PageId, PageLogError, Result};

/// Format version stamped into pages written by [`DataPageV1`].
pub const FORMAT_VERSION_V1: u16 = 1;

/// Link value meaning "no further fragment": the fragment is the chain tail.
pub const NO_NEXT_LINK: u64 = 0;

/// Length of the data header that follows the common header.
pub const DATA_HEADER_LEN: usize = 8;

/// First byte available for items.
pub const BODY_START: usize = PAGE_HDR_LEN + DATA_HEADER_LEN;

/// Size of one slot directory entry (offset + length).
pub const SLOT_ENTRY_LEN: usize = 4;

/// Bytes an item needs in front of a whole row.
pub const ROW_ITEM_OVERHEAD: usize = 1;

/// Bytes an item needs in front of a fragment payload (kind + next link).
pub const FRAGMENT_ITEM_OVERHEAD: usize = 1 + 8;

const SLOT_COUNT_OFFSET: usize = PAGE_HDR_LEN;
const FREE_START_OFFSET: usize = PAGE_HDR_LEN + 2;
const FREE_END_OFFSET: usize = PAGE_HDR_LEN + 4;
const RESERVED_OFFSET: usize = PAGE_HDR_LEN + 6;

const ITEM_REMOVED: u8 = 0;
const ITEM_ROW: u8 = 1;
const ITEM_FRAGMENT: u8 = 2;

/// Handler for [`FORMAT_VERSION_V1`] data pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataPageV1;

#[derive(Clone, Copy, Debug)]
struct Layout {
    slot_count: u16,
    free_start: usize,
    free_end: usize,
}

impl Layout {
    fn parse(page: &[u8]) -> Result<Self> {
        let header = PageHeader::decode(page)?;
        if header.kind != PageKind::Data {
            return Err(PageLogError::Corruption("page is not a data page"));
        }
        if header.format_version != FORMAT_VERSION_V1 {
            return Err(PageLogError::Corruption("data page format version mismatch"));
        }
        let slot_count = be::read_u16(page, SLOT_COUNT_OFFSET);
        let free_start = be::read_u16(page, FREE_START_OFFSET) as usize;
        let free_end = be::read_u16(page, FREE_END_OFFSET) as usize;
        if free_start < BODY_START || free_start > free_end || free_end > page.len() {
            return Err(PageLogError::Corruption(
                "data page free space pointers out of range",
            ));
        }
        let slot_bytes = slot_count as usize * SLOT_ENTRY_LEN;
        if page.len() - free_end != slot_bytes {
            return Err(PageLogError::Corruption(
                "data page slot directory does not match free_end",
            ));
        }
        Ok(Self {
            slot_count,
            free_start,
            free_end,
        })
    }

    fn free(&self) -> usize {
        self.free_end - self.free_start
    }

    fn slot_pos(page_len: usize, slot: u16) -> usize {
        page_len - (slot as usize + 1) * SLOT_ENTRY_LEN
    }

    fn item_range(&self, page: &[u8], slot: u16) -> Result<(usize, usize)> {
        if slot >= self.slot_count {
            return Err(PageLogError::Corruption("data page slot out of range"));
        }
        let pos = Self::slot_pos(page.len(), slot);
        let offset = be::read_u16(page, pos) as usize;
        let len = be::read_u16(page, pos + 2) as usize;
        if len == 0 || offset < BODY_START || offset + len > self.free_start {
            return Err(PageLogError::Corruption("data page slot entry out of range"));
        }
        Ok((offset, len))
    }

    /// Writes `parts` as one item and appends its slot. Callers check space first.
    fn push_item(&self, page: &mut [u8], parts: &[&[u8]]) -> u16 {
        let len: usize = parts.iter().map(|part| part.len()).sum();
        let mut at = self.free_start;
        for part in parts {
            page[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        let slot = self.slot_count;
        let pos = self.free_end - SLOT_ENTRY_LEN;
        be::write_u16(page, pos, self.free_start as u16);
        be::write_u16(page, pos + 2, len as u16);
        be::write_u16(page, SLOT_COUNT_OFFSET, slot + 1);
        be::write_u16(page, FREE_START_OFFSET, at as u16);
        be::write_u16(page, FREE_END_OFFSET, pos as u16);
        slot
    }
}

impl DataPageV1 {
    /// Largest fragment payload that fits in an empty page of `page_size` bytes.
    pub fn max_fragment_size(page_size: usize) -> usize {
        page_size.saturating_sub(BODY_START + FRAGMENT_ITEM_OVERHEAD + SLOT_ENTRY_LEN)
    }

    /// Largest row that fits in an empty page of `page_size` bytes.
    pub fn max_row_size(page_size: usize) -> usize {
        page_size.saturating_sub(BODY_START + ROW_ITEM_OVERHEAD + SLOT_ENTRY_LEN)
    }

    /// Number of slots (including removed ones) on the page.
    pub fn slot_count(page: &[u8]) -> Result<u16> {
        Ok(Layout::parse(page)?.slot_count)
    }

    fn reserve(layout: &Layout, item_len: usize) -> Result<()> {
        if item_len + SLOT_ENTRY_LEN > layout.free() {
            return Err(PageLogError::Corruption("data page has insufficient free space"));
        }
        Ok(())
    }
}

impl DataPageFormat for DataPageV1 {
    fn version(&self) -> u16 {
        FORMAT_VERSION_V1
    }

    fn init_page(&self, page: &mut [u8], page_id: PageId) -> Result<()> {
        let page_size =
            u32::try_from(page.len()).map_err(|_| PageLogError::Invalid("page too large"))?;
        page::validate_page_size(page_size)?;
        page.fill(0);
        PageHeader::new(page_id, PageKind::Data, FORMAT_VERSION_V1, page_size)?.encode(page)?;
        be::write_u16(page, SLOT_COUNT_OFFSET, 0);
        be::write_u16(page, FREE_START_OFFSET, BODY_START as u16);
        be::write_u16(page, FREE_END_OFFSET, page.len() as u16);
        be::write_u16(page, RESERVED_OFFSET, 0);
        Ok(())
    }

    fn insert_row(&self, page: &mut [u8], row: &[u8]) -> Result<u16> {
        let layout = Layout::parse(page)?;
        if row.is_empty() {
            return Err(PageLogError::Corruption("row payload empty"));
        }
        Self::reserve(&layout, ROW_ITEM_OVERHEAD + row.len())?;
        Ok(layout.push_item(page, &[&[ITEM_ROW][..], row]))
    }

    fn append_row_fragment(&self, page: &mut [u8], payload: &[u8], last_link: u64) -> Result<u16> {
        let layout = Layout::parse(page)?;
        if payload.is_empty() {
            return Err(PageLogError::Corruption("row fragment payload empty"));
        }
        Self::reserve(&layout, FRAGMENT_ITEM_OVERHEAD + payload.len())?;
        let link = last_link.to_be_bytes();
        Ok(layout.push_item(page, &[&[ITEM_FRAGMENT][..], &link[..], payload]))
    }

    fn remove_row(&self, page: &mut [u8], slot: u16) -> Result<()> {
        let layout = Layout::parse(page)?;
        let (offset, _) = layout.item_range(page, slot)?;
        match page[offset] {
            ITEM_ROW | ITEM_FRAGMENT => {
                page[offset] = ITEM_REMOVED;
                Ok(())
            }
            ITEM_REMOVED => Err(PageLogError::Corruption("data page item already removed")),
            _ => Err(PageLogError::Corruption("unknown data page item kind")),
        }
    }

    fn read_item<'a>(&self, page: &'a [u8], slot: u16) -> Result<DataItem<'a>> {
        let layout = Layout::parse(page)?;
        let (offset, len) = layout.item_range(page, slot)?;
        let item = &page[offset..offset + len];
        match item[0] {
            ITEM_ROW => Ok(DataItem::Row(&item[ROW_ITEM_OVERHEAD..])),
            ITEM_FRAGMENT => {
                if item.len() < FRAGMENT_ITEM_OVERHEAD {
                    return Err(PageLogError::Corruption("data page fragment item truncated"));
                }
                Ok(DataItem::Fragment {
                    payload: &item[FRAGMENT_ITEM_OVERHEAD..],
                    next_link: be::read_u64(item, 1),
                })
            }
            ITEM_REMOVED => Ok(DataItem::Removed),
            _ => Err(PageLogError::Corruption("unknown data page item kind")),
        }
    }

    fn free_space(&self, page: &[u8]) -> Result<usize> {
        Ok(Layout::parse(page)?.free())
    }
}
