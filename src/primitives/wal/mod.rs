#![forbid(unsafe_code)]

use std::fmt;
use std::slice;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::primitives::io::FileIo;
use crate::record::codec::{self, RECORD_HEADER_LEN};
use crate::record::PageDelta;
use crate::types::page::validate_page_size;
use crate::types::{Checksum, Crc32Fast, Lsn, PageLogError, Result};

const WAL_MAGIC: [u8; 4] = *b"PLGW";
const WAL_FORMAT_VERSION: u16 = 1;
/// Length of the file header in bytes.
pub const FILE_HEADER_LEN: usize = 32;
/// Length of each frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 24;
/// Room a record body may take beyond one page (record header plus length
/// prefixes and link).
const BODY_SLACK: usize = RECORD_HEADER_LEN + 16;
const LSN_EXHAUSTED: &str = "lsn space exhausted";

/// Configuration options for opening a redo log.
#[derive(Clone, Debug)]
pub struct LogOptions {
    /// Page size of the store the log describes; bounds record bodies.
    pub page_size: u32,
    /// Random salt distinguishing logs of different store instances.
    pub log_salt: u64,
    /// LSN given to the first record of a new log. Must be non-zero: an
    /// unstamped page reads as LSN 0.
    pub start_lsn: Lsn,
}

impl LogOptions {
    /// Creates options with the given values.
    pub fn new(page_size: u32, log_salt: u64, start_lsn: Lsn) -> Self {
        Self {
            page_size,
            log_salt,
            start_lsn,
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            page_size: crate::types::page::DEFAULT_PAGE_SIZE,
            log_salt: 0,
            start_lsn: Lsn(1),
        }
    }
}

/// Counters kept by an open [`RedoLog`].
#[derive(Clone, Debug, Default)]
pub struct LogStats {
    /// Records appended since open.
    pub records_appended: u64,
    /// Bytes written for those records, frame headers included.
    pub bytes_appended: u64,
    /// Completed `sync` calls.
    pub syncs: u64,
    /// Bytes of torn tail discarded when the log was opened.
    pub truncated_tail_bytes: u64,
}

#[derive(Clone, Debug)]
struct FileHeader {
    page_size: u32,
    log_salt: u64,
    start_lsn: Lsn,
}

impl FileHeader {
    fn encode(&self) -> [u8; FILE_HEADER_LEN] {
        let mut buf = [0u8; FILE_HEADER_LEN];
        buf[0..4].copy_from_slice(&WAL_MAGIC);
        buf[4..6].copy_from_slice(&WAL_FORMAT_VERSION.to_be_bytes());
        buf[8..12].copy_from_slice(&self.page_size.to_be_bytes());
        buf[12..20].copy_from_slice(&self.log_salt.to_be_bytes());
        buf[20..28].copy_from_slice(&self.start_lsn.0.to_be_bytes());
        let crc = compute_crc32(&[&buf[..28]]);
        buf[28..32].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    fn decode(src: &[u8; FILE_HEADER_LEN]) -> Result<Self> {
        if src[0..4] != WAL_MAGIC {
            return Err(PageLogError::Corruption("wal magic mismatch"));
        }
        if be_u16(&src[4..6]) != WAL_FORMAT_VERSION {
            return Err(PageLogError::Corruption("wal format version mismatch"));
        }
        if src[6..8] != [0, 0] {
            return Err(PageLogError::Corruption("wal reserved header bytes non-zero"));
        }
        if compute_crc32(&[&src[..28]]) != be_u32(&src[28..32]) {
            return Err(PageLogError::Corruption("wal header crc mismatch"));
        }
        let start_lsn = Lsn(be_u64(&src[20..28]));
        if start_lsn == Lsn(0) {
            return Err(PageLogError::Corruption("wal start_lsn is zero"));
        }
        Ok(Self {
            page_size: be_u32(&src[8..12]),
            log_salt: be_u64(&src[12..20]),
            start_lsn,
        })
    }

    fn max_body_len(&self) -> usize {
        self.page_size as usize + BODY_SLACK
    }
}

#[derive(Clone, Debug)]
struct FrameHeader {
    lsn: Lsn,
    body_len: u32,
    body_crc32: u32,
    prev_chain: u32,
}

impl FrameHeader {
    fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        buf[0..8].copy_from_slice(&self.lsn.0.to_be_bytes());
        buf[8..12].copy_from_slice(&self.body_len.to_be_bytes());
        buf[12..16].copy_from_slice(&self.body_crc32.to_be_bytes());
        buf[16..20].copy_from_slice(&self.prev_chain.to_be_bytes());
        let crc = compute_crc32(&[&buf[..20]]);
        buf[20..24].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Returns `None` when the header checksum does not match.
    fn decode(src: &[u8; FRAME_HEADER_LEN]) -> Option<Self> {
        if compute_crc32(&[&src[..20]]) != be_u32(&src[20..24]) {
            return None;
        }
        Some(Self {
            lsn: Lsn(be_u64(&src[0..8])),
            body_len: be_u32(&src[8..12]),
            body_crc32: be_u32(&src[12..16]),
            prev_chain: be_u32(&src[16..20]),
        })
    }
}

fn chain_crc(prev_chain: u32, header: &[u8; FRAME_HEADER_LEN], body: &[u8]) -> u32 {
    compute_crc32(&[&prev_chain.to_be_bytes(), header, body])
}

struct LogState {
    append_offset: u64,
    prev_chain: u32,
    /// `None` once a record has been logged at `u64::MAX`.
    next_lsn: Option<Lsn>,
    stats: LogStats,
}

/// Append-only file of framed, checksummed [`PageDelta`] records.
///
/// Each frame carries the record's LSN, a checksum of the encoded record,
/// and a checksum chained over every earlier frame, so a torn or stale tail
/// is detected and ignored on read.
pub struct RedoLog {
    io: Arc<dyn FileIo>,
    header: FileHeader,
    state: Mutex<LogState>,
}

impl RedoLog {
    /// Opens or creates a redo log.
    ///
    /// An existing log must match the configured page size and salt. Any
    /// torn tail after the last valid frame is truncated and appends resume
    /// after it.
    pub fn open(io: Arc<dyn FileIo>, options: LogOptions) -> Result<Self> {
        validate_page_size(options.page_size)?;
        if options.start_lsn == Lsn(0) {
            return Err(PageLogError::Invalid("start_lsn must be non-zero"));
        }
        let len = io.len()?;
        let header = if len < FILE_HEADER_LEN as u64 {
            let header = FileHeader {
                page_size: options.page_size,
                log_salt: options.log_salt,
                start_lsn: options.start_lsn,
            };
            io.write_at(0, &header.encode())?;
            io.truncate(FILE_HEADER_LEN as u64)?;
            header
        } else {
            let header = read_file_header(io.as_ref())?;
            if header.page_size != options.page_size {
                return Err(PageLogError::Corruption("wal page size mismatch"));
            }
            if header.log_salt != options.log_salt {
                return Err(PageLogError::Corruption("wal salt mismatch"));
            }
            header
        };

        let mut iter = LogIterator::with_header(Arc::clone(&io), header.clone())?;
        let mut last_lsn = None;
        while let Some(logged) = iter.next_record()? {
            last_lsn = Some(logged.lsn);
        }
        let valid_end = iter.valid_up_to();
        let file_len = io.len()?;
        let mut stats = LogStats::default();
        if file_len > valid_end {
            warn!(
                valid_end,
                file_len,
                discarded = file_len - valid_end,
                "wal.open.truncate_torn_tail"
            );
            io.truncate(valid_end)?;
            stats.truncated_tail_bytes = file_len - valid_end;
        }
        let next_lsn = match last_lsn {
            Some(last) => last.checked_next(),
            None => Some(header.start_lsn),
        };
        debug!(
            next_lsn = next_lsn.map(|lsn| lsn.0),
            append_offset = valid_end,
            "wal.open"
        );
        Ok(Self {
            io,
            header,
            state: Mutex::new(LogState {
                append_offset: valid_end,
                prev_chain: iter.prev_chain,
                next_lsn,
                stats,
            }),
        })
    }

    /// Appends one record and returns the LSN assigned to it.
    ///
    /// Does not sync; call [`RedoLog::sync`] for durability.
    pub fn append(&self, delta: &PageDelta) -> Result<Lsn> {
        let lsns = self.append_batch(slice::from_ref(delta))?;
        Ok(lsns[0])
    }

    /// Appends records with consecutive LSNs in a single write.
    pub fn append_batch(&self, deltas: &[PageDelta]) -> Result<Vec<Lsn>> {
        if deltas.is_empty() {
            return Ok(Vec::new());
        }
        let max_body = self.header.max_body_len();
        let mut state = self.state.lock();
        let mut out = Vec::new();
        let mut lsns = Vec::with_capacity(deltas.len());
        let mut next = state.next_lsn;
        let mut prev_chain = state.prev_chain;
        let mut body = Vec::new();
        for delta in deltas {
            let lsn = next.ok_or(PageLogError::Invalid(LSN_EXHAUSTED))?;
            body.clear();
            codec::encode(delta, &mut body)?;
            if body.len() > max_body {
                return Err(PageLogError::InvalidOwned(format!(
                    "{} record of {} bytes exceeds log limit {}",
                    delta.record_type(),
                    body.len(),
                    max_body
                )));
            }
            let header = FrameHeader {
                lsn,
                body_len: body.len() as u32,
                body_crc32: compute_crc32(&[&body]),
                prev_chain,
            }
            .encode();
            prev_chain = chain_crc(prev_chain, &header, &body);
            out.extend_from_slice(&header);
            out.extend_from_slice(&body);
            lsns.push(lsn);
            next = lsn.checked_next();
        }
        self.io.write_at(state.append_offset, &out)?;
        state.append_offset += out.len() as u64;
        state.prev_chain = prev_chain;
        state.next_lsn = next;
        state.stats.records_appended += deltas.len() as u64;
        state.stats.bytes_appended += out.len() as u64;
        debug!(
            records = deltas.len(),
            bytes = out.len(),
            first_lsn = lsns[0].0,
            "wal.append"
        );
        Ok(lsns)
    }

    /// Syncs all appended records to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.io.sync_all()?;
        self.state.lock().stats.syncs += 1;
        Ok(())
    }

    /// LSN the next appended record will receive, or `None` when the LSN
    /// space is used up.
    pub fn next_lsn(&self) -> Option<Lsn> {
        self.state.lock().next_lsn
    }

    /// Counters since the log was opened.
    pub fn stats(&self) -> LogStats {
        self.state.lock().stats.clone()
    }

    /// Page size recorded in the log header.
    pub fn page_size(&self) -> u32 {
        self.header.page_size
    }

    /// Iterates records from the start of the log.
    pub fn iter(&self) -> Result<LogIterator> {
        LogIterator::open(Arc::clone(&self.io))
    }
}

#[cfg(test)]
impl RedoLog {
    /// Frames `body` as the next record without checking that it decodes.
    pub(crate) fn append_raw_body(&self, body: &[u8]) -> Result<Lsn> {
        let mut state = self.state.lock();
        let lsn = state.next_lsn.ok_or(PageLogError::Invalid(LSN_EXHAUSTED))?;
        let header = FrameHeader {
            lsn,
            body_len: body.len() as u32,
            body_crc32: compute_crc32(&[body]),
            prev_chain: state.prev_chain,
        }
        .encode();
        self.io.write_at(state.append_offset, &header)?;
        self.io
            .write_at(state.append_offset + FRAME_HEADER_LEN as u64, body)?;
        state.append_offset += (FRAME_HEADER_LEN + body.len()) as u64;
        state.prev_chain = chain_crc(state.prev_chain, &header, body);
        state.next_lsn = lsn.checked_next();
        Ok(lsn)
    }
}

impl fmt::Debug for RedoLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedoLog")
            .field("page_size", &self.header.page_size)
            .field("start_lsn", &self.header.start_lsn)
            .field("next_lsn", &self.next_lsn())
            .finish()
    }
}

/// A decoded record together with the LSN it was logged under.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggedDelta {
    /// LSN assigned when the record was appended.
    pub lsn: Lsn,
    /// The record itself.
    pub delta: PageDelta,
}

/// Sequential reader over a redo log.
///
/// Iteration ends at the first frame that is torn, fails its checksums, or
/// breaks the checksum chain. A frame that passes every checksum but does not
/// decode is reported as corruption.
pub struct LogIterator {
    io: Arc<dyn FileIo>,
    header: FileHeader,
    offset: u64,
    end: u64,
    prev_chain: u32,
    last_lsn: Option<Lsn>,
    valid_up_to: u64,
    done: bool,
}

impl LogIterator {
    /// Opens an iterator over any log, taking the page size from its header.
    pub fn open(io: Arc<dyn FileIo>) -> Result<Self> {
        let header = read_file_header(io.as_ref())?;
        Self::with_header(io, header)
    }

    fn with_header(io: Arc<dyn FileIo>, header: FileHeader) -> Result<Self> {
        let end = io.len()?;
        Ok(Self {
            io,
            header,
            offset: FILE_HEADER_LEN as u64,
            end,
            prev_chain: 0,
            last_lsn: None,
            valid_up_to: FILE_HEADER_LEN as u64,
            done: false,
        })
    }

    /// Page size recorded in the log header.
    pub fn page_size(&self) -> u32 {
        self.header.page_size
    }

    /// LSN the log was started with.
    pub fn start_lsn(&self) -> Lsn {
        self.header.start_lsn
    }

    /// File offset up to which frames have been validated.
    pub fn valid_up_to(&self) -> u64 {
        self.valid_up_to
    }

    fn stop(&mut self) -> Result<Option<LoggedDelta>> {
        self.done = true;
        Ok(None)
    }

    /// Reads the next record, or `None` at the end of the valid log.
    pub fn next_record(&mut self) -> Result<Option<LoggedDelta>> {
        if self.done || self.offset + FRAME_HEADER_LEN as u64 > self.end {
            return self.stop();
        }
        let mut header_buf = [0u8; FRAME_HEADER_LEN];
        self.io.read_at(self.offset, &mut header_buf)?;
        let Some(header) = FrameHeader::decode(&header_buf) else {
            return self.stop();
        };
        if header.prev_chain != self.prev_chain {
            return self.stop();
        }
        let body_len = header.body_len as usize;
        let body_off = self.offset + FRAME_HEADER_LEN as u64;
        if body_len > self.header.max_body_len() || body_off + body_len as u64 > self.end {
            return self.stop();
        }
        let mut body = vec![0u8; body_len];
        self.io.read_at(body_off, &mut body)?;
        if compute_crc32(&[&body]) != header.body_crc32 {
            return self.stop();
        }
        if header.lsn < self.header.start_lsn {
            return Err(PageLogError::Corruption("wal frame lsn below start_lsn"));
        }
        if self.last_lsn.is_some_and(|last| header.lsn <= last) {
            return Err(PageLogError::Corruption("wal frame lsn not increasing"));
        }
        let delta = codec::decode(&body)?;
        self.prev_chain = chain_crc(self.prev_chain, &header_buf, &body);
        self.offset = body_off + body_len as u64;
        self.valid_up_to = self.offset;
        self.last_lsn = Some(header.lsn);
        Ok(Some(LoggedDelta {
            lsn: header.lsn,
            delta,
        }))
    }
}

impl Iterator for LogIterator {
    type Item = Result<LoggedDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(logged)) => Some(Ok(logged)),
            Ok(None) => None,
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn read_file_header(io: &dyn FileIo) -> Result<FileHeader> {
    if io.len()? < FILE_HEADER_LEN as u64 {
        return Err(PageLogError::Corruption("wal header truncated"));
    }
    let mut buf = [0u8; FILE_HEADER_LEN];
    io.read_at(0, &mut buf)?;
    FileHeader::decode(&buf)
}

fn compute_crc32(chunks: &[&[u8]]) -> u32 {
    let mut hasher = Crc32Fast::default();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize()
}

fn be_u16(src: &[u8]) -> u16 {
    u16::from_be_bytes([src[0], src[1]])
}

fn be_u32(src: &[u8]) -> u32 {
    u32::from_be_bytes([src[0], src[1], src[2], src[3]])
}

fn be_u64(src: &[u8]) -> u64 {
    crate::primitives::bytes::be::read_u64(src, 0)
}
