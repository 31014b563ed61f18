//! Bounds-checked byte cursor

use crate::error::{Error, Result};

/// Cursor over an in-memory file
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a new reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Seek to a position
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn truncated(&self, offset: usize) -> Error {
        Error::TruncatedFile {
            offset,
            len: self.data.len(),
        }
    }

    /// Borrow `len` bytes at `offset` without moving the cursor
    pub fn peek_bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or_else(|| self.truncated(offset))?;
        self.data
            .get(offset..end)
            .ok_or_else(|| self.truncated(offset.max(self.data.len())))
    }

    /// Read a u8 at a specific offset without advancing position
    pub fn peek_u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.peek_bytes_at(offset, 1)?[0])
    }

    /// Read a big-endian u32 at a specific offset without advancing position
    pub fn peek_u32_be_at(&self, offset: usize) -> Result<u32> {
        let b = self.peek_bytes_at(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a four byte identifier at a specific offset
    pub fn peek_tag_at(&self, offset: usize) -> Result<[u8; 4]> {
        let b = self.peek_bytes_at(offset, 4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read bytes, borrowing from the input
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes_at(self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a 16-bit little-endian value
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a 16-bit big-endian value
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endianness() {
        let data = [0x34, 0x12, 0x12, 0x34, 0xFE];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u16_be().unwrap(), 0x1234);
        assert_eq!(reader.read_i8().unwrap(), -2);
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = ByteReader::new(&data);
        reader.seek(2);
        match reader.read_u16_le() {
            Err(Error::TruncatedFile { offset, len }) => {
                assert_eq!(offset, 3);
                assert_eq!(len, 3);
            }
            other => panic!("expected TruncatedFile, got {:?}", other),
        }
        // A failed read leaves the cursor alone
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_peek_far_past_end() {
        let data = [0u8; 4];
        let reader = ByteReader::new(&data);
        assert!(matches!(
            reader.peek_u32_be_at(usize::MAX - 1),
            Err(Error::TruncatedFile { .. })
        ));
    }
}
