use bytes::{BufMut as _, Bytes, BytesMut};
use num_bigint_dig::BigUint;
use crate::error::{Error, Result};

/// Maximum number of bytes that a [`PacketEncode`] will hold by default.
pub const DEFAULT_MAX_LEN: usize = 256 * 1024;

/// Encoding of SSH packets and other payloads (low level API).
///
/// The format is described in RFC 4251, section 5. This struct wraps a [`BytesMut`] instance and
/// refuses writes that would grow the buffer past a configured maximum.
#[derive(Debug, Clone)]
pub struct PacketEncode {
    buf: BytesMut,
    max_len: usize,
}

impl PacketEncode {
    /// Creates an empty [`PacketEncode`] with the default maximum length.
    pub fn new() -> PacketEncode {
        PacketEncode::with_max_len(DEFAULT_MAX_LEN)
    }

    /// Creates an empty [`PacketEncode`] that holds at most `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> PacketEncode {
        PacketEncode { buf: BytesMut::new(), max_len }
    }

    /// Encode a `byte`.
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.ensure(1)?;
        Ok(self.buf.put_u8(value))
    }

    /// Encode a `boolean`.
    pub fn put_bool(&mut self, value: bool) -> Result<()> {
        self.put_u8(value as u8)
    }

    /// Encode a `uint32`.
    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.ensure(4)?;
        Ok(self.buf.put_u32(value))
    }

    /// Encode a `string`.
    pub fn put_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len: u32 = value.len().try_into()
            .map_err(|_| Error::Encode("`string` is too long"))?;
        self.ensure(4 + value.len())?;
        self.buf.put_u32(len);
        Ok(self.buf.put_slice(value))
    }

    /// Encode a `string` in UTF-8.
    pub fn put_str(&mut self, value: &str) -> Result<()> {
        self.put_bytes(value.as_bytes())
    }

    /// Encode a `name-list`.
    pub fn put_name_list(&mut self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return self.put_u32(0)
        }

        let names_len = names.iter().map(|name| name.len()).sum::<usize>() + names.len() - 1;
        let names_len: u32 = names_len.try_into()
            .map_err(|_| Error::Encode("`name-list` is too long"))?;
        self.ensure(4 + names_len as usize)?;
        self.buf.put_u32(names_len);

        for (i, name) in names.iter().enumerate() {
            if i != 0 {
                self.buf.put_u8(b',');
            }
            self.buf.put_slice(name.as_bytes());
        }
        Ok(())
    }

    /// Encode a `mpint` from a [`BigUint`].
    pub fn put_biguint(&mut self, value: &BigUint) -> Result<()> {
        self.put_mpint_uint_be(&value.to_bytes_be())
    }

    /// Encode a `mpint` from an unsigned number in big endian.
    ///
    /// The encoding is canonical: leading zero bytes are stripped and a single zero byte is
    /// prepended when the high bit of the leading byte is set.
    pub fn put_mpint_uint_be(&mut self, digits_be: &[u8]) -> Result<()> {
        let mut bytes = digits_be;
        while !bytes.is_empty() && bytes[0] == 0 {
            bytes = &bytes[1..];
        }

        if !bytes.is_empty() && bytes[0] >= 0x80 {
            self.ensure(4 + 1 + bytes.len())?;
            self.buf.put_u32(bytes.len() as u32 + 1);
            self.buf.put_u8(0);
        } else {
            self.ensure(4 + bytes.len())?;
            self.buf.put_u32(bytes.len() as u32);
        }
        Ok(self.buf.put_slice(bytes))
    }

    /// Append raw bytes to the buffer.
    pub fn put_raw(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(data.len())?;
        Ok(self.buf.put_slice(data))
    }

    /// Number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unwraps the internal bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buf
    }

    /// Unwraps and freezes the internal bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn ensure(&self, additional: usize) -> Result<()> {
        if self.buf.len() + additional <= self.max_len {
            Ok(())
        } else {
            Err(Error::Encode("encoded data would exceed the maximum length"))
        }
    }
}

impl Default for PacketEncode {
    fn default() -> Self { Self::new() }
}
