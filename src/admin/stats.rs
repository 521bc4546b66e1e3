use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::admin::open_log;
use crate::record::RecordType;
use crate::types::Result;

#[derive(Debug, Clone, Serialize)]
pub struct LogStatsReport {
    pub path: String,
    pub page_size: u32,
    pub file_len: u64,
    pub valid_up_to: u64,
    pub torn_tail_bytes: u64,
    pub records: u64,
    pub first_lsn: Option<u64>,
    pub last_lsn: Option<u64>,
    pub pages_touched: usize,
    pub by_type: BTreeMap<&'static str, u64>,
}

/// Counts the valid records of the log at `path` by type.
pub fn stats(path: impl AsRef<Path>) -> Result<LogStatsReport> {
    let path = path.as_ref();
    let (mut iter, file_len) = open_log(path)?;
    let mut by_type: BTreeMap<&'static str, u64> =
        RecordType::ALL.iter().map(|ty| (ty.name(), 0)).collect();
    let mut pages = std::collections::HashSet::new();
    let mut records = 0u64;
    let mut first_lsn = None;
    let mut last_lsn = None;
    while let Some(logged) = iter.next_record()? {
        records += 1;
        first_lsn.get_or_insert(logged.lsn.0);
        last_lsn = Some(logged.lsn.0);
        pages.insert(logged.delta.address());
        *by_type.entry(logged.delta.record_type().name()).or_default() += 1;
    }
    let valid_up_to = iter.valid_up_to();
    Ok(LogStatsReport {
        path: path.display().to_string(),
        page_size: iter.page_size(),
        file_len,
        valid_up_to,
        torn_tail_bytes: file_len.saturating_sub(valid_up_to),
        records,
        first_lsn,
        last_lsn,
        pages_touched: pages.len(),
        by_type,
    })
}
