use crate::error::DecodeError;
use crate::types::Address;

/// Offset-tracking cursor over an account buffer. Every read is bounds checked
/// and names the field it was reading when it runs out of bytes.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                field,
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize, field: &'static str) -> Result<(), DecodeError> {
        self.take(n, field).map(|_| ())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        Ok(self.read_u8(field)? != 0)
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        let b = self.take(2, field)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u64_le(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8, field)?);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_i64_le(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8, field)?);
        Ok(i64::from_le_bytes(arr))
    }

    pub fn read_address(&mut self, field: &'static str) -> Result<Address, DecodeError> {
        let mut arr = [0u8; Address::LEN];
        arr.copy_from_slice(self.take(Address::LEN, field)?);
        Ok(Address::new(arr))
    }

    /// Reads `n` bytes of null-padded UTF-8 and trims the trailing nulls.
    pub fn read_fixed_string(&mut self, n: usize, field: &'static str) -> Result<String, DecodeError> {
        let raw = self.take(n, field)?;
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        std::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// One tag byte; the value byte follows only when the tag is non-zero.
    pub fn read_optional_u8(&mut self, field: &'static str) -> Result<Option<u8>, DecodeError> {
        match self.read_u8(field)? {
            0 => Ok(None),
            _ => self.read_u8(field).map(Some),
        }
    }
}
