use std::path::Path;

use serde::Serialize;

use crate::admin::open_log;
use crate::record::PageDelta;
use crate::types::Result;

/// Controls how much of each record a dump shows.
#[derive(Clone, Debug)]
pub struct DumpOptions {
    /// Stop after this many records.
    pub limit: Option<usize>,
    /// Bytes of row or fragment payload rendered as hex.
    pub payload_prefix: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            limit: None,
            payload_prefix: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordEntry {
    pub lsn: u64,
    pub record_type: &'static str,
    pub partition_id: i32,
    pub page_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_link: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    pub path: String,
    pub page_size: u32,
    pub start_lsn: u64,
    pub file_len: u64,
    pub valid_up_to: u64,
    pub truncated: bool,
    pub records: Vec<RecordEntry>,
}

/// Reads `path` and lists its records up to the first invalid frame.
pub fn dump(path: impl AsRef<Path>, opts: &DumpOptions) -> Result<DumpReport> {
    let path = path.as_ref();
    let (mut iter, file_len) = open_log(path)?;
    let mut records = Vec::new();
    let mut truncated = false;
    loop {
        if opts.limit.is_some_and(|limit| records.len() >= limit) {
            truncated = iter.valid_up_to() < file_len;
            break;
        }
        let Some(logged) = iter.next_record()? else {
            break;
        };
        records.push(entry(logged.lsn.0, &logged.delta, opts.payload_prefix));
    }
    Ok(DumpReport {
        path: path.display().to_string(),
        page_size: iter.page_size(),
        start_lsn: iter.start_lsn().0,
        file_len,
        valid_up_to: iter.valid_up_to(),
        truncated,
        records,
    })
}

fn entry(lsn: u64, delta: &PageDelta, prefix: usize) -> RecordEntry {
    let address = delta.address();
    let mut entry = RecordEntry {
        lsn,
        record_type: delta.record_type().name(),
        partition_id: address.partition_id.0,
        page_id: address.page_id.0,
        format_version: None,
        slot: None,
        last_link: None,
        payload_len: None,
        payload_hex: None,
    };
    let payload = match delta {
        PageDelta::InitDataPage(rec) => {
            entry.format_version = Some(rec.format_version());
            None
        }
        PageDelta::InsertRow(rec) => Some(rec.row()),
        PageDelta::InsertFragment(rec) => {
            entry.last_link = Some(rec.last_link());
            Some(rec.payload())
        }
        PageDelta::RemoveRow(rec) => {
            entry.slot = Some(rec.slot());
            None
        }
    };
    if let Some(bytes) = payload {
        entry.payload_len = Some(bytes.len());
        entry.payload_hex = Some(hex::encode(&bytes[..bytes.len().min(prefix)]));
    }
    entry
}
