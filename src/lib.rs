//! Page-level redo records, the redo log that carries them, and the replay
//! loop that reapplies them to data pages after a crash.

#![warn(missing_docs)]

pub mod admin;
pub mod logging;
pub mod primitives;
pub mod record;
pub mod recovery;
pub mod storage;
pub mod types;

pub use primitives::wal::{LogIterator, LogOptions, LoggedDelta, RedoLog};
pub use record::{
    InitDataPageRecord, InsertFragmentRecord, InsertRowRecord, PageAddress, PageDelta, RecordType,
    RemoveRowRecord,
};
pub use recovery::{replay, CorruptionPolicy, ReplayOptions, ReplayStats};
pub use storage::{DataPageFormat, DataPageVersions, MemPageStore, PageStore};
pub use types::{Lsn, PageId, PageLogError, PartitionId, Result};
