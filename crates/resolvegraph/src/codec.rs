// moon: The build system and package manager for MoonBit.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

//! The primitive stream format shared by every serializer.
//!
//! Integers are written as little-endian base-128 varints of their
//! two's-complement bit pattern, so small non-negative values take one byte
//! and negative values take the full width (5 bytes for ints, 10 for longs).
//! Strings are a varint of `byte length + 1` followed by UTF-8 bytes; a
//! length prefix of `0` is the absent marker used by nullable strings.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::builder::GraphError;

const ABSENT_STRING: u64 = 0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Io(std::io::Error),
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("malformed variable-length integer")]
    MalformedVarInt,
    #[error("invalid UTF-8 in string")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("expected a string but found the absent marker")]
    UnexpectedAbsentString,
    #[error("negative length {0} in stream")]
    NegativeLength(i32),
    #[error("invalid {what} tag {tag}")]
    InvalidTag { what: &'static str, tag: i64 },
    #[error("variant index {index} is out of range, {known} variants have been read")]
    InvalidVariantIndex { index: i32, known: usize },
    #[error("variant index {0} refers to a variant that is still being read")]
    UnfinishedVariant(i32),
    #[error("malformed value in stream: {0}")]
    Malformed(String),
    #[error("decoded graph is inconsistent: {0}")]
    Graph(#[from] GraphError),
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CodecError::UnexpectedEof
        } else {
            CodecError::Io(e)
        }
    }
}

/// Sink for the primitive stream format.
pub trait Encoder {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError>;

    fn write_byte(&mut self, byte: u8) -> Result<(), CodecError> {
        self.write_bytes(&[byte])
    }

    fn write_var_u64(&mut self, mut value: u64) -> Result<(), CodecError> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.write_bytes(&buf[..len])
    }

    fn write_small_long(&mut self, value: i64) -> Result<(), CodecError> {
        self.write_var_u64(value as u64)
    }

    fn write_small_int(&mut self, value: i32) -> Result<(), CodecError> {
        self.write_var_u64(value as u32 as u64)
    }

    /// Writes a collection size.
    fn write_len(&mut self, len: usize) -> Result<(), CodecError> {
        let len = i32::try_from(len)
            .map_err(|_| CodecError::Malformed(format!("collection of {len} elements")))?;
        self.write_small_int(len)
    }

    fn write_boolean(&mut self, value: bool) -> Result<(), CodecError> {
        self.write_byte(value as u8)
    }

    fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_var_u64(value.len() as u64 + 1)?;
        self.write_bytes(value.as_bytes())
    }

    fn write_nullable_string(&mut self, value: Option<&str>) -> Result<(), CodecError> {
        match value {
            Some(s) => self.write_string(s),
            None => self.write_var_u64(ABSENT_STRING),
        }
    }
}

/// Source for the primitive stream format.
pub trait Decoder {
    fn read_byte(&mut self) -> Result<u8, CodecError>;

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            out.push(self.read_byte()?);
        }
        Ok(out)
    }

    fn read_var_u64(&mut self, max_bytes: usize) -> Result<u64, CodecError> {
        let mut result = 0u64;
        for i in 0..max_bytes {
            let byte = self.read_byte()?;
            result |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::MalformedVarInt)
    }

    fn read_small_long(&mut self) -> Result<i64, CodecError> {
        Ok(self.read_var_u64(10)? as i64)
    }

    fn read_small_int(&mut self) -> Result<i32, CodecError> {
        let value = self.read_var_u64(5)?;
        let value = u32::try_from(value).map_err(|_| CodecError::MalformedVarInt)?;
        Ok(value as i32)
    }

    fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_small_int()?;
        usize::try_from(len).map_err(|_| CodecError::NegativeLength(len))
    }

    fn read_boolean(&mut self) -> Result<bool, CodecError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidTag {
                what: "boolean",
                tag: other as i64,
            }),
        }
    }

    fn read_nullable_string(&mut self) -> Result<Option<String>, CodecError> {
        let prefix = self.read_var_u64(10)?;
        if prefix == ABSENT_STRING {
            return Ok(None);
        }
        let len = usize::try_from(prefix - 1).map_err(|_| CodecError::MalformedVarInt)?;
        let bytes = self.read_bytes(len)?;
        Ok(Some(String::from_utf8(bytes)?))
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        self.read_nullable_string()?
            .ok_or(CodecError::UnexpectedAbsentString)
    }
}

impl Encoder for BytesMut {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.put_slice(bytes);
        Ok(())
    }
}

impl Decoder for Bytes {
    fn read_byte(&mut self) -> Result<u8, CodecError> {
        if !self.has_remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(self.get_u8())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(self.copy_to_bytes(len).to_vec())
    }
}

/// Encodes into any [`Write`]. Buffering and flushing are up to the caller.
pub struct StreamEncoder<W: Write> {
    inner: W,
}

impl<W: Write> StreamEncoder<W> {
    pub fn new(inner: W) -> Self {
        StreamEncoder { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Encoder for StreamEncoder<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        Ok(self.inner.write_all(bytes)?)
    }
}

/// Decodes from any [`Read`].
pub struct StreamDecoder<R: Read> {
    inner: R,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(inner: R) -> Self {
        StreamDecoder { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Decoder for StreamDecoder<R> {
    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut out)?;
        if out.len() != len {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(out)
    }
}
