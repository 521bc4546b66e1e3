#![allow(missing_docs)]

use std::sync::Arc;

use pagelog::primitives::io::{FileIo, StdFileIo};
use pagelog::primitives::wal::{LogIterator, LogOptions, RedoLog, FILE_HEADER_LEN};
use pagelog::record::codec;
use pagelog::types::{Lsn, PageId, PartitionId, Result};
use pagelog::{InsertFragmentRecord, PageDelta, RecordType};
use tempfile::tempdir;

fn fragment(page: u64, len: usize, link: u64) -> PageDelta {
    InsertFragmentRecord::new(PartitionId(1), PageId(page), vec![page as u8; len], link).into()
}

fn options() -> LogOptions {
    LogOptions::new(4096, 0x5EED, Lsn(1))
}

#[test]
fn file_log_survives_reopen_and_torn_tail() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("redo.log");

    {
        let log = RedoLog::open(Arc::new(StdFileIo::open(&path)?), options())?;
        for page in 1..=5 {
            log.append(&fragment(page, 100 + page as usize, page + 1))?;
        }
        log.sync()?;
    }

    // A crash mid-append leaves half a frame behind.
    let io = Arc::new(StdFileIo::open(&path)?);
    let tail = io.len()?;
    let half = codec::encoded_len(&fragment(6, 100, 0)) / 2;
    io.write_at(tail, &vec![0x6Au8; half])?;

    let mut iter = LogIterator::open(io.clone())?;
    let mut seen = Vec::new();
    while let Some(logged) = iter.next_record()? {
        assert_eq!(logged.delta.record_type(), RecordType::InsertFragment);
        seen.push(logged.lsn);
    }
    assert_eq!(seen, (1..=5).map(Lsn).collect::<Vec<_>>());
    assert_eq!(iter.valid_up_to(), tail);

    let log = RedoLog::open(io.clone(), options())?;
    assert_eq!(io.len()?, tail, "torn tail is truncated on open");
    assert_eq!(log.append(&fragment(6, 10, 0))?, Lsn(6));
    log.sync()?;

    let records: Vec<_> = log.iter()?.collect::<Result<_>>()?;
    assert_eq!(records.len(), 6);
    assert_eq!(records[5].delta, fragment(6, 10, 0));
    Ok(())
}

#[test]
fn empty_log_has_only_a_header() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("empty.log");
    let log = RedoLog::open(Arc::new(StdFileIo::open(&path)?), options())?;
    assert_eq!(log.next_lsn(), Some(Lsn(1)));
    assert_eq!(std::fs::metadata(&path)?.len(), FILE_HEADER_LEN as u64);
    assert!(log.iter()?.next().is_none());
    Ok(())
}

#[test]
fn batch_append_is_one_contiguous_run() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("batch.log");
    let log = RedoLog::open(Arc::new(StdFileIo::open(&path)?), options())?;
    log.append(&fragment(1, 8, 0))?;
    let batch: Vec<PageDelta> = (2..6).map(|p| fragment(p, 8, 0)).collect();
    let lsns = log.append_batch(&batch)?;
    assert_eq!(lsns, vec![Lsn(2), Lsn(3), Lsn(4), Lsn(5)]);
    let stats = log.stats();
    assert_eq!(stats.records_appended, 5);
    assert_eq!(
        stats.bytes_appended + FILE_HEADER_LEN as u64,
        std::fs::metadata(&path)?.len()
    );
    Ok(())
}
