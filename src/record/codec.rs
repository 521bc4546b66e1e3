//! Record bodies are laid out big-endian as
//!
//! ```text
//! type:u8 | partition_id:i32 | page_id:u64 | body
//! ```
//!
//! | type              | body                                           |
//! |-------------------|------------------------------------------------|
//! | `InitDataPage`    | `format_version:u16`                           |
//! | `InsertRow`       | `row_len:u32 \| row bytes`                     |
//! | `InsertFragment`  | `last_link:u64 \| payload_len:u32 \| payload`  |
//! | `RemoveRow`       | `slot:u16`                                     |
//!
//! Decoding dispatches on the tag through [`DECODERS`]; adding a variant
//! means adding its tag, its encoder arm, and one table entry.

use core::convert::TryFrom;

use bytes::Bytes;

use super::{
    InitDataPageRecord, InsertFragmentRecord, InsertRowRecord, PageAddress, PageDelta, RecordType,
    RemoveRowRecord,
};
use crate::primitives::bytes::{put, Reader};
use crate::types::{PageId, PageLogError, PartitionId, Result};

/// Bytes before the variant body: tag, partition, page.
pub const RECORD_HEADER_LEN: usize = 1 + 4 + 8;

const TRUNCATED: &str = "delta record truncated";
const TRAILING: &str = "trailing bytes after delta record";

type DecodeFn = fn(PageAddress, &mut Reader<'_>) -> Result<PageDelta>;

/// Decoders indexed by `tag - 1`, in [`RecordType::ALL`] order.
const DECODERS: [DecodeFn; RecordType::ALL.len()] = [
    decode_init_data_page,
    decode_insert_row,
    decode_insert_fragment,
    decode_remove_row,
];

fn decoder_for(ty: RecordType) -> DecodeFn {
    DECODERS[ty.as_u8() as usize - 1]
}

/// Exact number of bytes [`encode`] appends for `delta`.
pub fn encoded_len(delta: &PageDelta) -> usize {
    RECORD_HEADER_LEN
        + match delta {
            PageDelta::InitDataPage(_) => 2,
            PageDelta::InsertRow(rec) => 4 + rec.row_size(),
            PageDelta::InsertFragment(rec) => 8 + 4 + rec.payload_size(),
            PageDelta::RemoveRow(_) => 2,
        }
}

/// Appends the binary form of `delta` to `out`.
///
/// Fails only when a row or fragment is longer than a `u32` length prefix
/// can describe.
pub fn encode(delta: &PageDelta, out: &mut Vec<u8>) -> Result<()> {
    out.reserve(encoded_len(delta));
    let address = delta.address();
    put::u8(out, delta.record_type().as_u8());
    put::i32(out, address.partition_id.0);
    put::u64(out, address.page_id.0);
    match delta {
        PageDelta::InitDataPage(rec) => put::u16(out, rec.format_version()),
        PageDelta::InsertRow(rec) => {
            put::u32(out, length_prefix(rec.row_size())?);
            out.extend_from_slice(rec.row());
        }
        PageDelta::InsertFragment(rec) => {
            put::u64(out, rec.last_link());
            put::u32(out, length_prefix(rec.payload_size())?);
            out.extend_from_slice(rec.payload());
        }
        PageDelta::RemoveRow(rec) => put::u16(out, rec.slot()),
    }
    Ok(())
}

/// Convenience wrapper around [`encode`] returning a fresh buffer.
pub fn encode_to_vec(delta: &PageDelta) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded_len(delta));
    encode(delta, &mut out)?;
    Ok(out)
}

/// Decodes exactly one record occupying all of `src`.
pub fn decode(src: &[u8]) -> Result<PageDelta> {
    let mut reader = Reader::new(src, TRUNCATED);
    let ty = RecordType::try_from(reader.u8()?)?;
    let partition_id = PartitionId(reader.i32()?);
    let page_id = PageId(reader.u64()?);
    let delta = decoder_for(ty)(PageAddress::new(partition_id, page_id), &mut reader)?;
    reader.finish(TRAILING)?;
    Ok(delta)
}

/// Reads only the tag of an encoded record.
pub fn peek_type(src: &[u8]) -> Result<RecordType> {
    let tag = *src.first().ok_or(PageLogError::Corruption(TRUNCATED))?;
    RecordType::try_from(tag)
}

fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PageLogError::Invalid("record payload exceeds u32 length"))
}

fn decode_init_data_page(addr: PageAddress, r: &mut Reader<'_>) -> Result<PageDelta> {
    let version = r.u16()?;
    Ok(InitDataPageRecord::new(addr.partition_id, addr.page_id, version).into())
}

fn decode_insert_row(addr: PageAddress, r: &mut Reader<'_>) -> Result<PageDelta> {
    let len = r.u32()? as usize;
    let row = Bytes::copy_from_slice(r.bytes(len)?);
    Ok(InsertRowRecord::new(addr.partition_id, addr.page_id, row).into())
}

fn decode_insert_fragment(addr: PageAddress, r: &mut Reader<'_>) -> Result<PageDelta> {
    let last_link = r.u64()?;
    let len = r.u32()? as usize;
    let payload = Bytes::copy_from_slice(r.bytes(len)?);
    Ok(InsertFragmentRecord::new(addr.partition_id, addr.page_id, payload, last_link).into())
}

fn decode_remove_row(addr: PageAddress, r: &mut Reader<'_>) -> Result<PageDelta> {
    let slot = r.u16()?;
    Ok(RemoveRowRecord::new(addr.partition_id, addr.page_id, slot).into())
}
