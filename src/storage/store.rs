//! Page stores hand out durable page snapshots to replay and take back the
//! replayed images.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::types::page::{self, validate_page_size};
use crate::types::{page_crc32, PageId, PageLogError, PartitionId, Result};

/// Source and sink of durable page images, addressed per partition.
pub trait PageStore: Send + Sync {
    /// Size of every page held by the store.
    fn page_size(&self) -> usize;

    /// Returns the last durable image of a page, or `None` if it was never stored.
    fn load_page(&self, partition: PartitionId, page_id: PageId) -> Result<Option<Vec<u8>>>;

    /// Persists `page` as the durable image of `page_id`.
    fn store_page(&self, partition: PartitionId, page_id: PageId, page: &[u8]) -> Result<()>;
}

/// In-memory [`PageStore`] that checksums every image it keeps.
///
/// Images written with an initialised header get their crc stamped on store
/// and verified on load; raw images are kept as-is.
#[derive(Debug)]
pub struct MemPageStore {
    page_size: usize,
    pages: RwLock<HashMap<(PartitionId, PageId), Box<[u8]>>>,
}

impl MemPageStore {
    /// Creates an empty store for pages of `page_size` bytes.
    pub fn new(page_size: u32) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(Self {
            page_size: page_size as usize,
            pages: RwLock::new(HashMap::new()),
        })
    }

    /// Number of stored pages across all partitions.
    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    /// Returns true if no page has been stored.
    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Keys of every stored page, sorted.
    pub fn page_keys(&self) -> Vec<(PartitionId, PageId)> {
        let mut keys: Vec<_> = self.pages.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Mutates a stored image in place without restamping its checksum.
    ///
    /// Returns [`PageLogError::NotFound`] if the page was never stored.
    pub fn tamper<F>(&self, partition: PartitionId, page_id: PageId, f: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]),
    {
        let mut pages = self.pages.write();
        let image = pages
            .get_mut(&(partition, page_id))
            .ok_or(PageLogError::NotFound)?;
        f(image);
        Ok(())
    }
}

impl PageStore for MemPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn load_page(&self, partition: PartitionId, page_id: PageId) -> Result<Option<Vec<u8>>> {
        let pages = self.pages.read();
        let Some(image) = pages.get(&(partition, page_id)) else {
            return Ok(None);
        };
        if page::is_initialized(image) && page::stored_crc32(image)? != page_crc32(image) {
            return Err(PageLogError::Corruption("page checksum mismatch"));
        }
        Ok(Some(image.to_vec()))
    }

    fn store_page(&self, partition: PartitionId, page_id: PageId, page: &[u8]) -> Result<()> {
        if page.len() != self.page_size {
            return Err(PageLogError::InvalidOwned(format!(
                "page image is {} bytes, store holds {}-byte pages",
                page.len(),
                self.page_size
            )));
        }
        let mut image: Box<[u8]> = page.into();
        if page::is_initialized(&image) {
            let crc = page_crc32(&image);
            page::set_crc32(&mut image, crc)?;
        }
        trace!(partition = partition.0, page = page_id.0, "store.page.write");
        self.pages.write().insert((partition, page_id), image);
        Ok(())
    }
}
