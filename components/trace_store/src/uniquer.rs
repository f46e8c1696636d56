//! Backtrace array uniquer
//!
//! `integeruniquer.index` holds a 32-byte header followed by
//! `(low, high)` `u32` pairs. Each non-zero pair addresses
//! `low + high * 1 MiB` in `integeruniquer.data`, where a `u32` count is
//! followed by that many little-endian `u64` values. The n-th non-zero pair
//! defines backtrace array `n`.

use tracing::debug;

use crate::bin_reader::BinReader;
use crate::error::Result;

/// Size of the index file header
pub const INDEX_HEADER_SIZE: u64 = 32;

const MEGABYTE: u64 = 1_048_576;

/// Backtrace-id indexed arrays of frame addresses or nested ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacktraceArrays {
    arrays: Vec<Vec<u64>>,
}

impl BacktraceArrays {
    pub fn new(arrays: Vec<Vec<u64>>) -> Self {
        Self { arrays }
    }

    /// Array for a backtrace id, if the id is in range
    pub fn get(&self, id: u64) -> Option<&[u64]> {
        let index = usize::try_from(id).ok()?;
        self.arrays.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u64]> {
        self.arrays.iter().map(Vec::as_slice)
    }
}

impl From<Vec<Vec<u64>>> for BacktraceArrays {
    fn from(arrays: Vec<Vec<u64>>) -> Self {
        Self::new(arrays)
    }
}

/// Decode the uniquer's index and data files
pub fn parse_integer_uniquer(index: &[u8], data: &[u8]) -> Result<BacktraceArrays> {
    let mut index_reader = BinReader::new("integeruniquer.index", index);
    let mut data_reader = BinReader::new("integeruniquer.data", data);

    index_reader.seek(INDEX_HEADER_SIZE)?;

    let mut arrays = Vec::new();
    let mut skipped = 0usize;
    while index_reader.has_more() {
        let low = u64::from(index_reader.read_u32()?);
        let high = u64::from(index_reader.read_u32()?);
        let offset = low + high * MEGABYTE;
        if offset == 0 {
            skipped += 1;
            continue;
        }

        data_reader.seek(offset)?;
        let count = data_reader.read_u32()?;
        let mut values = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            values.push(data_reader.read_u64()?);
        }
        arrays.push(values);
    }

    debug!(
        "Parsed {} backtrace arrays ({} empty index slots)",
        arrays.len(),
        skipped
    );
    Ok(BacktraceArrays::new(arrays))
}
