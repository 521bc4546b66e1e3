#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use pagelog::primitives::io::MemFileIo;
use pagelog::primitives::wal::{LogOptions, RedoLog};
use pagelog::recovery::{replay, CorruptionPolicy, ReplayOptions};
use pagelog::storage::{
    DataItem, DataPageFormat, DataPageV1, DataPageVersions, MemPageStore, PageStore,
    FORMAT_VERSION_V1, NO_NEXT_LINK,
};
use pagelog::types::page::{self, PAGE_HDR_LEN};
use pagelog::types::{Lsn, PageId, PartitionId, Result};
use pagelog::{InitDataPageRecord, InsertFragmentRecord, InsertRowRecord, PageDelta, RemoveRowRecord};

const PAGE_SIZE: u32 = 512;
const PART: PartitionId = PartitionId(3);

/// Minimal engine: logs each delta, then applies it to its live page.
struct Engine {
    log: RedoLog,
    formats: DataPageVersions,
    live: BTreeMap<PageId, Vec<u8>>,
}

impl Engine {
    fn new(io: MemFileIo) -> Result<Self> {
        Ok(Self {
            log: RedoLog::open(Arc::new(io), LogOptions::new(PAGE_SIZE, 0xC0FFEE, Lsn(1)))?,
            formats: DataPageVersions::standard(),
            live: BTreeMap::new(),
        })
    }

    fn mutate(&mut self, delta: PageDelta) -> Result<Lsn> {
        let lsn = self.log.append(&delta)?;
        let page = self
            .live
            .entry(delta.page_id())
            .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
        delta.apply_delta(page, &self.formats)?;
        page::set_page_lsn(page, lsn)?;
        Ok(lsn)
    }

    fn checkpoint(&self, store: &MemPageStore) -> Result<()> {
        for (page_id, image) in &self.live {
            store.store_page(PART, *page_id, image)?;
        }
        Ok(())
    }

    /// Writes `row` as a fragment chain starting at `first_page`, tail first.
    fn insert_large_row(&mut self, first_page: u64, row: &[u8]) -> Result<()> {
        let chunk = DataPageV1::max_fragment_size(PAGE_SIZE as usize);
        let chunks: Vec<&[u8]> = row.chunks(chunk).collect();
        let mut next_link = NO_NEXT_LINK;
        for (i, piece) in chunks.iter().enumerate().rev() {
            let page_id = PageId(first_page + i as u64);
            self.mutate(InitDataPageRecord::new(PART, page_id, FORMAT_VERSION_V1).into())?;
            self.mutate(InsertFragmentRecord::new(PART, page_id, piece.to_vec(), next_link).into())?;
            next_link = page_id.0;
        }
        Ok(())
    }
}

fn without_crc(mut image: Vec<u8>) -> Vec<u8> {
    page::clear_crc32(&mut image).expect("page header present");
    image
}

fn read_chain(store: &MemPageStore, first_page: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut link = first_page;
    while link != NO_NEXT_LINK {
        let image = store.load_page(PART, PageId(link))?.expect("chain page stored");
        match DataPageV1.read_item(&image, 0)? {
            DataItem::Fragment { payload, next_link } => {
                out.extend_from_slice(payload);
                link = next_link;
            }
            other => panic!("expected fragment, found {other:?}"),
        }
    }
    Ok(out)
}

#[test]
fn replay_after_crash_matches_live_pages() -> Result<()> {
    let io = MemFileIo::new();
    let mut engine = Engine::new(io.clone())?;
    let store = MemPageStore::new(PAGE_SIZE)?;

    engine.mutate(InitDataPageRecord::new(PART, PageId(1), FORMAT_VERSION_V1).into())?;
    engine.mutate(InsertRowRecord::new(PART, PageId(1), &b"alpha"[..]).into())?;
    engine.checkpoint(&store)?;

    engine.mutate(InsertRowRecord::new(PART, PageId(1), &b"beta"[..]).into())?;
    engine.mutate(RemoveRowRecord::new(PART, PageId(1), 0).into())?;
    let big: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
    engine.insert_large_row(10, &big)?;
    engine.log.sync()?;
    let live = std::mem::take(&mut engine.live);
    drop(engine);

    let mut iter = pagelog::LogIterator::open(Arc::new(io))?;
    let stats = replay(
        &mut iter,
        &store,
        &DataPageVersions::standard(),
        &ReplayOptions::default(),
    )?;
    assert_eq!(stats.records_skipped, 2, "checkpointed records are not reapplied");
    assert_eq!(stats.pages_failed, 0);

    for (page_id, image) in live {
        let replayed = store.load_page(PART, page_id)?.expect("page replayed");
        assert_eq!(
            without_crc(replayed),
            without_crc(image),
            "page {page_id} differs after replay"
        );
    }
    assert_eq!(read_chain(&store, 10)?, big);
    Ok(())
}

#[test]
fn replaying_twice_changes_nothing() -> Result<()> {
    let io = MemFileIo::new();
    let mut engine = Engine::new(io.clone())?;
    engine.insert_large_row(1, &[0x42; 900])?;
    drop(engine);

    let store = MemPageStore::new(PAGE_SIZE)?;
    let formats = DataPageVersions::standard();
    let first = replay(
        &mut pagelog::LogIterator::open(Arc::new(io.clone()))?,
        &store,
        &formats,
        &ReplayOptions::default(),
    )?;
    let snapshot: Vec<_> = store
        .page_keys()
        .into_iter()
        .map(|(part, id)| store.load_page(part, id))
        .collect::<Result<_>>()?;

    let second = replay(
        &mut pagelog::LogIterator::open(Arc::new(io))?,
        &store,
        &formats,
        &ReplayOptions::default(),
    )?;
    assert_eq!(second.records_applied, 0);
    assert_eq!(second.records_skipped, first.records_applied);
    let again: Vec<_> = store
        .page_keys()
        .into_iter()
        .map(|(part, id)| store.load_page(part, id))
        .collect::<Result<_>>()?;
    assert_eq!(snapshot, again);
    Ok(())
}

#[test]
fn skip_page_policy_isolates_corrupt_store_page() -> Result<()> {
    let io = MemFileIo::new();
    let mut engine = Engine::new(io.clone())?;
    let store = MemPageStore::new(PAGE_SIZE)?;
    engine.mutate(InitDataPageRecord::new(PART, PageId(1), FORMAT_VERSION_V1).into())?;
    engine.mutate(InitDataPageRecord::new(PART, PageId(2), FORMAT_VERSION_V1).into())?;
    engine.checkpoint(&store)?;
    engine.mutate(InsertRowRecord::new(PART, PageId(1), &b"one"[..]).into())?;
    engine.mutate(InsertRowRecord::new(PART, PageId(2), &b"two"[..]).into())?;
    drop(engine);

    store.tamper(PART, PageId(1), |image| image[PAGE_HDR_LEN + 20] ^= 0xFF)?;
    let formats = DataPageVersions::standard();

    let err = replay(
        &mut pagelog::LogIterator::open(Arc::new(io.clone()))?,
        &store,
        &formats,
        &ReplayOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_corruption());

    let options = ReplayOptions {
        corruption_policy: CorruptionPolicy::SkipPage,
        ..ReplayOptions::default()
    };
    let stats = replay(
        &mut pagelog::LogIterator::open(Arc::new(io))?,
        &store,
        &formats,
        &options,
    )?;
    assert_eq!(stats.pages_failed, 1);
    let healthy = store.load_page(PART, PageId(2))?.expect("page 2 stored");
    assert_eq!(DataPageV1.read_item(&healthy, 0)?, DataItem::Row(b"two"));
    assert!(store.load_page(PART, PageId(1)).is_err());
    Ok(())
}
