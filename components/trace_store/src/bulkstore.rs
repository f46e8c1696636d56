//! Sample bulkstore decoding
//!
//! Layout: a preamble of `u32` words, a `u32` header size, a `u32` record
//! stride, then fixed-stride records starting at the header size. Each
//! record holds a 48-bit timestamp, a 32-bit thread id and, in its last four
//! bytes, a 32-bit backtrace id. A zero timestamp terminates the list.

use tracing::debug;

use crate::bin_reader::BinReader;
use crate::error::{Result, StoreError};

/// Preamble length, in `u32` words, observed in Instruments bundles
pub const DEFAULT_PREAMBLE_WORDS: usize = 4;

/// Largest preamble accepted, in `u32` words
pub const MAX_PREAMBLE_WORDS: usize = 1024;

const STORE_NAME: &str = "bulkstore";
const TIMESTAMP_BYTES: u32 = 6;
const THREAD_ID_BYTES: u32 = 4;
const BACKTRACE_ID_BYTES: u32 = 4;

/// Smallest stride that fits the three decoded fields
pub const MIN_RECORD_STRIDE: u32 = TIMESTAMP_BYTES + THREAD_ID_BYTES + BACKTRACE_ID_BYTES;

/// One time-profile sample as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSample {
    /// Raw timestamp in the store's native unit
    pub timestamp: u64,
    pub thread_id: u32,
    pub backtrace_id: u32,
}

/// Header fields of a bulkstore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkstoreHeader {
    pub header_size: u32,
    pub bytes_per_entry: u32,
}

/// Read the header, leaving `reader` positioned at the first record
fn read_header(reader: &mut BinReader<'_>, preamble_words: usize) -> Result<BulkstoreHeader> {
    let preamble_len = u64::try_from(preamble_words)
        .ok()
        .filter(|_| preamble_words <= MAX_PREAMBLE_WORDS)
        .and_then(|words| words.checked_mul(4))
        .ok_or_else(|| StoreError::InvalidFormat {
            name: STORE_NAME,
            reason: format!(
                "preamble of {} words exceeds {} words",
                preamble_words, MAX_PREAMBLE_WORDS
            ),
        })?;
    reader.skip(preamble_len)?;
    let header_size = reader.read_u32()?;
    let bytes_per_entry = reader.read_u32()?;

    if bytes_per_entry < MIN_RECORD_STRIDE {
        return Err(StoreError::InvalidFormat {
            name: STORE_NAME,
            reason: format!(
                "record stride {} is smaller than {} bytes",
                bytes_per_entry, MIN_RECORD_STRIDE
            ),
        });
    }

    reader.seek(u64::from(header_size))?;
    Ok(BulkstoreHeader {
        header_size,
        bytes_per_entry,
    })
}

/// Decode every sample record in a bulkstore
///
/// Records stop at the zero-timestamp sentinel or at a clean end of data. A
/// record cut short by the end of data is an error.
pub fn parse_bulkstore(bytes: &[u8], preamble_words: usize) -> Result<Vec<RawSample>> {
    let mut reader = BinReader::new(STORE_NAME, bytes);
    let header = read_header(&mut reader, preamble_words)?;
    let skipped = u64::from(header.bytes_per_entry - MIN_RECORD_STRIDE);

    let mut samples = Vec::new();
    while reader.has_more() {
        let timestamp = reader.read_u48()?;
        if timestamp == 0 {
            break;
        }
        let thread_id = reader.read_u32()?;
        reader.skip(skipped)?;
        let backtrace_id = reader.read_u32()?;

        samples.push(RawSample {
            timestamp,
            thread_id,
            backtrace_id,
        });
    }

    debug!(
        "Parsed {} samples from bulkstore (header {} bytes, stride {})",
        samples.len(),
        header.header_size,
        header.bytes_per_entry
    );
    Ok(samples)
}
