//! Bounds-checked cursor over a byte slice.

use crate::FormatError;

/// Longest variable-length quantity accepted (28 bits of payload).
const MAX_VARLEN_BYTES: usize = 4;

/// Cursor over a byte slice. Every read checks bounds and reports the
/// offset it failed at.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn eof(&self) -> FormatError {
        FormatError::UnexpectedEof { offset: self.pos }
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        if n > self.remaining() {
            return Err(self.eof());
        }
        self.pos += n;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, FormatError> {
        self.data.get(self.pos).copied().ok_or_else(|| self.eof())
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(self.eof());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Four-byte chunk tag.
    pub fn read_tag(&mut self) -> Result<[u8; 4], FormatError> {
        self.read_array()
    }

    pub fn read_u16_be(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16_le(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// 24-bit big-endian value (MIDI tempo).
    pub fn read_u24_be(&mut self) -> Result<u32, FormatError> {
        let [a, b, c] = self.read_array()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Variable-length quantity: 7 bits per byte, high bit set on every
    /// byte but the last.
    pub fn read_varlen(&mut self) -> Result<u32, FormatError> {
        let start = self.pos;
        let mut value: u32 = 0;
        for _ in 0..MAX_VARLEN_BYTES {
            let byte = self.read_u8()?;
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::InvalidVarLen { offset: start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endian_reads() {
        let mut r = BinaryReader::new(&[0x12, 0x34, 0x12, 0x34, 0x00, 0x07, 0xA1, 0x20]);
        assert_eq!(r.read_u16_be().unwrap(), 0x1234);
        assert_eq!(r.read_u16_le().unwrap(), 0x3412);
        assert_eq!(r.read_u32_be().unwrap(), 0x0007_A120);
        assert!(r.is_empty());
    }

    #[test]
    fn varlen_examples() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 0),
            (&[0x40], 0x40),
            (&[0x7F], 0x7F),
            (&[0x81, 0x00], 0x80),
            (&[0xC0, 0x00], 0x2000),
            (&[0xFF, 0x7F], 0x3FFF),
            (&[0x81, 0x80, 0x00], 0x4000),
            (&[0xFF, 0xFF, 0xFF, 0x7F], 0x0FFF_FFFF),
        ];
        for (bytes, expected) in cases {
            let mut r = BinaryReader::new(bytes);
            assert_eq!(r.read_varlen().unwrap(), *expected, "{:02X?}", bytes);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn varlen_longer_than_four_bytes_fails() {
        let mut r = BinaryReader::new(&[0x81, 0x81, 0x81, 0x81, 0x01]);
        assert!(matches!(r.read_varlen(), Err(FormatError::InvalidVarLen { offset: 0 })));
    }

    #[test]
    fn short_read_reports_offset() {
        let mut r = BinaryReader::new(&[1, 2, 3]);
        r.skip(2).unwrap();
        assert!(matches!(r.read_u16_le(), Err(FormatError::UnexpectedEof { offset: 2 })));
        // failed read does not advance
        assert_eq!(r.position(), 2);
        assert_eq!(r.read_u8().unwrap(), 3);
    }

    #[test]
    fn truncated_varlen_is_eof() {
        let mut r = BinaryReader::new(&[0x81]);
        assert!(matches!(r.read_varlen(), Err(FormatError::UnexpectedEof { .. })));
    }
}
