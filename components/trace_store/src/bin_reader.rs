//! Little-endian cursor over an in-memory binary store

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, StoreError};

/// Sequential reader with absolute seeking; every failure names the store
pub struct BinReader<'a> {
    name: &'static str,
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BinReader<'a> {
    pub fn new(name: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            name,
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    /// Move to an absolute offset; offsets past the end are rejected
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len() {
            return Err(StoreError::Truncated {
                name: self.name,
                offset,
                len: 0,
            });
        }
        self.cursor.set_position(offset);
        Ok(())
    }

    pub fn skip(&mut self, len: u64) -> Result<()> {
        let start = self.position();
        if len > self.remaining() {
            return Err(self.truncated(start, len));
        }
        self.cursor.set_position(start + len);
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let start = self.position();
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated(start, 4))
    }

    /// 48-bit unsigned integer
    pub fn read_u48(&mut self) -> Result<u64> {
        let start = self.position();
        self.cursor
            .read_uint::<LittleEndian>(6)
            .map_err(|_| self.truncated(start, 6))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let start = self.position();
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| self.truncated(start, 8))
    }

    fn truncated(&mut self, offset: u64, len: u64) -> StoreError {
        self.cursor.set_position(offset);
        StoreError::Truncated {
            name: self.name,
            offset,
            len,
        }
    }
}
