use bytes::Bytes;

use super::{PageAddress, PageDelta, RecordType};
use crate::storage::DataPageVersions;
use crate::types::{PageId, PartitionId, Result};

/// Appends one fragment of a large row to the row's fragment chain.
///
/// The payload is already sized by the writer to fit the target page. The
/// link is stored opaquely; what value marks the chain tail is a convention
/// of the page format (see [`crate::storage::NO_NEXT_LINK`]).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InsertFragmentRecord {
    address: PageAddress,
    payload: Bytes,
    last_link: u64,
}

impl InsertFragmentRecord {
    /// Builds the record. Inputs are trusted; nothing is validated here.
    pub fn new(
        partition_id: PartitionId,
        page_id: PageId,
        payload: impl Into<Bytes>,
        last_link: u64,
    ) -> Self {
        Self {
            address: PageAddress::new(partition_id, page_id),
            payload: payload.into(),
            last_link,
        }
    }

    /// Page the fragment is written to.
    pub fn address(&self) -> PageAddress {
        self.address
    }

    /// Partition of the target page.
    pub fn partition_id(&self) -> PartitionId {
        self.address.partition_id
    }

    /// Target page.
    pub fn page_id(&self) -> PageId {
        self.address.page_id
    }

    /// Always [`RecordType::InsertFragment`].
    pub fn record_type(&self) -> RecordType {
        RecordType::InsertFragment
    }

    /// Length of the fragment in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Fragment bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Shared handle to the fragment bytes.
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Link to the next fragment in the chain.
    pub fn last_link(&self) -> u64 {
        self.last_link
    }

    /// Appends the fragment through the format resolved from `page`'s header.
    pub fn apply_delta(&self, page: &mut [u8], formats: &DataPageVersions) -> Result<()> {
        let format = formats.for_page(page)?;
        format.append_row_fragment(page, &self.payload, self.last_link)?;
        Ok(())
    }
}

impl From<InsertFragmentRecord> for PageDelta {
    fn from(record: InsertFragmentRecord) -> Self {
        PageDelta::InsertFragment(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::storage::data_page::{DataPageV1, FORMAT_VERSION_V1};
    use crate::storage::{DataItem, DataPageFormat};
    use crate::types::page::{PageHeader, PageKind};
    use crate::types::PageLogError;

    const PAGE: usize = 1024;

    fn data_page(page_id: PageId) -> Vec<u8> {
        let mut page = vec![0u8; PAGE];
        DataPageV1.init_page(&mut page, page_id).unwrap();
        page
    }

    #[test]
    fn scenario_accessors() {
        let rec = InsertFragmentRecord::new(
            PartitionId(3),
            PageId(0x0000_0001_0000_0007),
            vec![0xAB, 0xCD, 0xEF],
            42,
        );
        assert_eq!(rec.payload_size(), 3);
        assert_eq!(rec.payload(), &[0xAB, 0xCD, 0xEF]);
        assert_eq!(rec.last_link(), 42);
        assert_eq!(rec.record_type(), RecordType::InsertFragment);
        assert_eq!(rec.partition_id(), PartitionId(3));
        assert_eq!(rec.page_id(), PageId(0x0000_0001_0000_0007));
    }

    #[test]
    fn payload_size_boundaries() {
        let one = InsertFragmentRecord::new(PartitionId(0), PageId(1), vec![9u8], 0);
        assert_eq!(one.payload_size(), one.payload().len());
        assert_eq!(one.payload_size(), 1);

        let max = DataPageV1::max_fragment_size(PAGE);
        let big = InsertFragmentRecord::new(PartitionId(0), PageId(1), vec![7u8; max], 0);
        assert_eq!(big.payload_size(), big.payload().len());
        assert_eq!(big.payload_size(), max);

        let mut page = data_page(PageId(1));
        big.apply_delta(&mut page, &DataPageVersions::standard())
            .unwrap();
        assert_eq!(DataPageV1.free_space(&page).unwrap(), 0);
    }

    #[test]
    fn apply_writes_fragment_and_link() {
        let formats = DataPageVersions::standard();
        let mut page = data_page(PageId(8));
        let rec = InsertFragmentRecord::new(PartitionId(2), PageId(8), vec![1, 2, 3, 4], 0xFEED);
        rec.apply_delta(&mut page, &formats).unwrap();
        assert_eq!(
            DataPageV1.read_item(&page, 0).unwrap(),
            DataItem::Fragment {
                payload: &[1, 2, 3, 4],
                next_link: 0xFEED
            }
        );
    }

    #[test]
    fn apply_is_deterministic_from_same_start() {
        let formats = DataPageVersions::standard();
        let start = data_page(PageId(8));
        let rec = InsertFragmentRecord::new(PartitionId(2), PageId(8), vec![5u8; 40], 77);
        let mut a = start.clone();
        let mut b = start.clone();
        rec.apply_delta(&mut a, &formats).unwrap();
        rec.apply_delta(&mut b, &formats).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn full_page_fails_without_partial_write() {
        let formats = DataPageVersions::standard();
        let mut page = data_page(PageId(4));
        let filler = vec![0x11u8; DataPageV1::max_fragment_size(PAGE)];
        DataPageV1.append_row_fragment(&mut page, &filler, 0).unwrap();
        assert_eq!(DataPageV1.free_space(&page).unwrap(), 0);

        let before = page.clone();
        let rec = InsertFragmentRecord::new(PartitionId(1), PageId(4), vec![0xAB], 1);
        let err = rec.apply_delta(&mut page, &formats).unwrap_err();
        assert!(matches!(err, PageLogError::Corruption(_)));
        assert_eq!(page, before);
    }

    #[test]
    fn apply_leaves_record_unchanged() {
        let formats = DataPageVersions::standard();
        let rec = InsertFragmentRecord::new(PartitionId(5), PageId(6), vec![1, 2, 3], 9);
        let copy = rec.clone();
        let mut page = data_page(PageId(6));
        rec.apply_delta(&mut page, &formats).unwrap();
        let mut zeroed = vec![0u8; PAGE];
        assert!(rec.apply_delta(&mut zeroed, &formats).is_err());
        assert_eq!(rec, copy);
    }

    #[test]
    fn records_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InsertFragmentRecord>();
        assert_send_sync::<PageDelta>();

        let rec = Arc::new(InsertFragmentRecord::new(
            PartitionId(1),
            PageId(2),
            vec![3u8; 16],
            4,
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rec = Arc::clone(&rec);
                std::thread::spawn(move || {
                    let mut page = data_page(PageId(2));
                    rec.apply_delta(&mut page, &DataPageVersions::standard())
                        .unwrap();
                    page
                })
            })
            .collect();
        let pages: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(pages.windows(2).all(|w| w[0] == w[1]));
    }

    #[derive(Default)]
    struct RecordingFormat {
        calls: Mutex<Vec<(Vec<u8>, u64)>>,
    }

    impl DataPageFormat for RecordingFormat {
        fn version(&self) -> u16 {
            9
        }

        fn init_page(&self, page: &mut [u8], page_id: PageId) -> Result<()> {
            let size = page.len() as u32;
            PageHeader::new(page_id, PageKind::Data, 9, size)?.encode(page)
        }

        fn insert_row(&self, _page: &mut [u8], _row: &[u8]) -> Result<u16> {
            Err(PageLogError::Corruption("unexpected insert_row"))
        }

        fn append_row_fragment(
            &self,
            _page: &mut [u8],
            payload: &[u8],
            last_link: u64,
        ) -> Result<u16> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((payload.to_vec(), last_link));
            Ok(calls.len() as u16 - 1)
        }

        fn remove_row(&self, _page: &mut [u8], _slot: u16) -> Result<()> {
            Err(PageLogError::Corruption("unexpected remove_row"))
        }

        fn read_item<'a>(&self, _page: &'a [u8], _slot: u16) -> Result<DataItem<'a>> {
            Err(PageLogError::NotFound)
        }

        fn free_space(&self, _page: &[u8]) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn apply_delegates_to_format_named_by_page() {
        let recording = Arc::new(RecordingFormat::default());
        let mut formats = DataPageVersions::standard();
        formats.register(recording.clone());

        let mut page = vec![0u8; PAGE];
        recording.init_page(&mut page, PageId(1)).unwrap();
        let rec = InsertFragmentRecord::new(PartitionId(1), PageId(1), vec![0xAB, 0xCD], 42);
        rec.apply_delta(&mut page, &formats).unwrap();

        let calls = recording.calls.lock().unwrap();
        assert_eq!(*calls, vec![(vec![0xABu8, 0xCD], 42u64)]);
        assert_ne!(FORMAT_VERSION_V1, recording.version());
    }
}
