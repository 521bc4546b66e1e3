//! Redo replay.
//!
//! Replay walks a redo log in order and reapplies every record whose LSN is
//! newer than the LSN stamped on its target page. Pages are loaded from a
//! [`PageStore`] on first touch, mutated in a private cache, and written back
//! once the log is exhausted.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::primitives::wal::{LogIterator, LoggedDelta};
use crate::record::PageAddress;
use crate::storage::{DataPageVersions, PageStore};
use crate::types::page::{self, is_initialized};
use crate::types::{Lsn, PageLogError, Result};

/// What replay does when a page cannot take a record.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CorruptionPolicy {
    /// Stop and return the first corruption error. Nothing is written back.
    #[default]
    Abort,
    /// Give up on the affected page only and keep replaying the others.
    SkipPage,
}

/// Replay configuration.
#[derive(Clone, Debug, Default)]
pub struct ReplayOptions {
    /// Reaction to pages that fail to load or to apply a record.
    pub corruption_policy: CorruptionPolicy,
    /// Records with an LSN above this limit are not replayed.
    pub replay_limit: Option<Lsn>,
}

/// Outcome of a replay run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplayStats {
    /// Records read from the log.
    pub records_read: u64,
    /// Records applied to a page.
    pub records_applied: u64,
    /// Records skipped as already applied, past the limit, or aimed at a
    /// failed page.
    pub records_skipped: u64,
    /// Pages written back to the store.
    pub pages_written: u64,
    /// Pages abandoned under [`CorruptionPolicy::SkipPage`].
    pub pages_failed: u64,
    /// Highest LSN applied, if any record was.
    pub last_applied: Option<Lsn>,
}

/// Replays every record of `log` against pages held by `store`.
///
/// The log and the store must agree on the page size.
pub fn replay(
    log: &mut LogIterator,
    store: &dyn PageStore,
    formats: &DataPageVersions,
    options: &ReplayOptions,
) -> Result<ReplayStats> {
    let page_size = store.page_size();
    if log.page_size() as usize != page_size {
        return Err(PageLogError::InvalidOwned(format!(
            "log page size {} does not match store page size {page_size}",
            log.page_size()
        )));
    }
    let mut stats = ReplayStats::default();
    let mut dirty: HashMap<PageAddress, Vec<u8>> = HashMap::new();
    let mut failed: HashSet<PageAddress> = HashSet::new();

    while let Some(LoggedDelta { lsn, delta }) = log.next_record()? {
        stats.records_read += 1;
        if options.replay_limit.is_some_and(|limit| lsn > limit) {
            stats.records_skipped += 1;
            continue;
        }
        let address = delta.address();
        if failed.contains(&address) {
            stats.records_skipped += 1;
            continue;
        }

        if !dirty.contains_key(&address) {
            match store.load_page(address.partition_id, address.page_id) {
                Ok(image) => {
                    let image = image.unwrap_or_else(|| vec![0u8; page_size]);
                    dirty.insert(address, image);
                }
                Err(err) => {
                    handle_failure(err, address, lsn, options, &mut failed, &mut stats)?;
                    stats.records_skipped += 1;
                    continue;
                }
            }
        }
        let Some(image) = dirty.get_mut(&address) else {
            continue;
        };

        if stamped_lsn(image)? >= lsn {
            stats.records_skipped += 1;
            continue;
        }
        match delta.apply_delta(image, formats) {
            Ok(()) => {
                page::set_page_lsn(image, lsn)?;
                stats.records_applied += 1;
                stats.last_applied = Some(lsn);
            }
            Err(err) => {
                dirty.remove(&address);
                handle_failure(err, address, lsn, options, &mut failed, &mut stats)?;
                stats.records_skipped += 1;
            }
        }
    }

    let mut pages: Vec<_> = dirty.into_iter().collect();
    pages.sort_unstable_by_key(|(addr, _)| (addr.partition_id, addr.page_id));
    for (address, image) in pages {
        store.store_page(address.partition_id, address.page_id, &image)?;
        stats.pages_written += 1;
    }
    info!(
        records_read = stats.records_read,
        records_applied = stats.records_applied,
        records_skipped = stats.records_skipped,
        pages_written = stats.pages_written,
        pages_failed = stats.pages_failed,
        valid_up_to = log.valid_up_to(),
        "recovery.replay.complete"
    );
    Ok(stats)
}

/// LSN of the last record applied to `image`; zero for a page with no header.
fn stamped_lsn(image: &[u8]) -> Result<Lsn> {
    if is_initialized(image) {
        page::page_lsn(image)
    } else {
        Ok(Lsn(0))
    }
}

fn handle_failure(
    err: PageLogError,
    address: PageAddress,
    lsn: Lsn,
    options: &ReplayOptions,
    failed: &mut HashSet<PageAddress>,
    stats: &mut ReplayStats,
) -> Result<()> {
    if !err.is_corruption() || options.corruption_policy == CorruptionPolicy::Abort {
        debug!(page = %address, lsn = lsn.0, error = %err, "recovery.replay.abort");
        return Err(err);
    }
    warn!(page = %address, lsn = lsn.0, error = %err, "recovery.replay.apply_failed");
    failed.insert(address);
    stats.pages_failed += 1;
    Ok(())
}
