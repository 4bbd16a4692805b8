//! Module holding the byte stream abstraction:
//! a cursor over an immutable in-memory buffer which bundles the active
//! byte order strategy and the warning log of the ongoing parse.

use byteordered::Endianness;
use bytes::Bytes;
use dicomdex_core::decode::{self, BasicDecode, BasicDecoder};
use dicomdex_core::Tag;
use snafu::{ensure, Backtrace, ResultExt, Snafu};

/// Error type for byte stream operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A primitive value read failed.
    #[snafu(display("Could not read value at position {}", position))]
    ReadValue {
        position: usize,
        #[snafu(backtrace)]
        source: decode::Error,
    },

    /// A byte range read went past the buffer boundaries.
    #[snafu(display(
        "Read of {} bytes at position {} is out of bounds (buffer size {})",
        length,
        position,
        size
    ))]
    OutOfBounds {
        position: usize,
        length: usize,
        size: usize,
        backtrace: Backtrace,
    },

    /// A seek went past the buffer boundaries.
    #[snafu(display(
        "Seek from position {} by {} bytes is out of bounds (buffer size {})",
        position,
        delta,
        size
    ))]
    SeekOutOfBounds {
        position: usize,
        delta: i64,
        size: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A stateful cursor over an immutable byte buffer.
///
/// The stream carries the active byte order strategy, so that callers do
/// not need to thread it separately, and the single warning log of the
/// parse, which is moved onto the finished data set when parsing ends.
#[derive(Debug)]
pub struct ByteStream {
    data: Bytes,
    decoder: BasicDecoder,
    position: usize,
    warnings: Vec<String>,
}

impl ByteStream {
    /// Create a new stream over the given buffer, starting at position 0.
    pub fn new(data: Bytes, endianness: Endianness) -> Self {
        ByteStream::with_position(data, endianness, 0)
    }

    /// Create a new stream over the given buffer at the given position.
    pub fn with_position(data: Bytes, endianness: Endianness, position: usize) -> Self {
        ByteStream {
            data,
            decoder: BasicDecoder::new(endianness),
            position,
            warnings: Vec::new(),
        }
    }

    /// The size of the underlying buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The current position of the cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of bytes between the cursor and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Obtain another handle to the underlying buffer without copying it.
    #[inline]
    pub fn share_data(&self) -> Bytes {
        self.data.clone()
    }

    /// The byte order strategy currently in effect.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.decoder.endianness()
    }

    /// Replace the byte order strategy in effect,
    /// returning the previous one so that it can be restored.
    pub fn set_endianness(&mut self, endianness: Endianness) -> Endianness {
        let previous = self.decoder.endianness();
        self.decoder = BasicDecoder::new(endianness);
        previous
    }

    /// Move the cursor by the given signed byte count.
    /// Fails without moving if the target would fall outside `[0, len]`.
    pub fn seek(&mut self, delta: i64) -> Result<()> {
        let target = self.position as i64 + delta;
        ensure!(
            target >= 0 && target <= self.data.len() as i64,
            SeekOutOfBoundsSnafu {
                position: self.position,
                delta,
                size: self.data.len()
            }
        );
        self.position = target as usize;
        Ok(())
    }

    /// Move the cursor to the given absolute position.
    /// Fails without moving if the target falls outside `[0, len]`.
    pub fn seek_to(&mut self, position: usize) -> Result<()> {
        self.seek(position as i64 - self.position as i64)
    }

    /// Read an unsigned 16-bit value and advance the cursor past it.
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self
            .decoder
            .read_u16(&self.data, self.position)
            .context(ReadValueSnafu {
                position: self.position,
            })?;
        self.position += 2;
        Ok(value)
    }

    /// Read an unsigned 32-bit value and advance the cursor past it.
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self
            .decoder
            .read_u32(&self.data, self.position)
            .context(ReadValueSnafu {
                position: self.position,
            })?;
        self.position += 4;
        Ok(value)
    }

    /// Read an attribute tag (group, then element)
    /// and advance the cursor past it.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let tag = self
            .decoder
            .read_tag(&self.data, self.position)
            .context(ReadValueSnafu {
                position: self.position,
            })?;
        self.position += 4;
        Ok(tag)
    }

    /// Read the attribute tag under the cursor without advancing it.
    pub fn peek_tag(&self) -> Result<Tag> {
        self.decoder
            .read_tag(&self.data, self.position)
            .context(ReadValueSnafu {
                position: self.position,
            })
    }

    /// Consume `length` bytes and produce their ASCII prefix up to
    /// (but not including) the first NUL. The remainder of the `length`
    /// bytes is discarded from the string but still consumed from the
    /// stream.
    pub fn read_fixed_string(&mut self, length: usize) -> Result<String> {
        let bytes = self.read_bytes(length)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Consume `length` bytes, returning a view over them
    /// without copying.
    pub fn read_bytes(&mut self, length: usize) -> Result<Bytes> {
        let end = self.position.checked_add(length);
        ensure!(
            end.is_some_and(|end| end <= self.data.len()),
            OutOfBoundsSnafu {
                position: self.position,
                length,
                size: self.data.len()
            }
        );
        let view = self.data.slice(self.position..self.position + length);
        self.position += length;
        Ok(view)
    }

    /// Carve out a new stream over the next `length` bytes, sharing the
    /// same byte order strategy. The view starts at position 0 and the
    /// outer stream advances by `length`.
    pub fn read_sub_stream(&mut self, length: usize) -> Result<ByteStream> {
        let endianness = self.endianness();
        let view = self.read_bytes(length)?;
        Ok(ByteStream::new(view, endianness))
    }

    /// Append a message to the warning log. Never fails.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Retrieve the warnings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Move the collected warnings out of the stream.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}
