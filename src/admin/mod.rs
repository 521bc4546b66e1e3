#![forbid(unsafe_code)]

//! Read-only inspection of redo log files.
//!
//! These functions back the `pagelog` binary. Each returns a serialisable
//! report so callers can render it as text or JSON.

mod dump;
mod stats;

/// Lists every valid record of a log.
pub use dump::{dump, DumpOptions, DumpReport, RecordEntry};

/// Summarises a log without retaining its records.
pub use stats::{stats, LogStatsReport};

use std::path::Path;
use std::sync::Arc;

use crate::primitives::io::{FileIo, StdFileIo};
use crate::primitives::wal::LogIterator;
use crate::types::Result;

fn open_log(path: &Path) -> Result<(LogIterator, u64)> {
    let io = StdFileIo::open_read_only(path)?;
    let file_len = io.len()?;
    let iter = LogIterator::open(Arc::new(io))?;
    Ok((iter, file_len))
}
