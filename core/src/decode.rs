//! This module provides implementations for primitive decoders of data,
//! which may be in either Little Endian or Big Endian.
//!
//! Unlike reader-based decoders, these operate at absolute positions of a
//! byte buffer, so that values can be extracted from an indexed data set
//! without copying it.

use crate::header::Tag;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{ensure, Backtrace, Snafu};

/// Error type for failed primitive value reads.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The requested extent does not fit in the buffer.
    #[snafu(display(
        "Read of {} bytes at position {} is out of bounds (buffer size {})",
        width,
        position,
        size
    ))]
    OutOfBounds {
        position: usize,
        width: usize,
        size: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fetch the `width` bytes at `position`, or fail if they are not all
/// within the buffer.
fn checked(data: &[u8], position: usize, width: usize) -> Result<&[u8]> {
    let end = position.checked_add(width);
    ensure!(
        end.is_some_and(|end| end <= data.len()),
        OutOfBoundsSnafu {
            position,
            width,
            size: data.len()
        }
    );
    Ok(&data[position..position + width])
}

/** Type trait for reading and decoding basic data values from a byte buffer
 * at absolute positions.
 *
 * This trait aims to provide methods for reading binary numbers based on
 * the source's endianness. There are, and only will be, two possible
 * implementations (`LittleEndianBasicDecoder` and `BigEndianBasicDecoder`),
 * plus the runtime selected `BasicDecoder`.
 */
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value at the given position.
    fn read_u16(&self, data: &[u8], position: usize) -> Result<u16>;

    /// Decode a signed short value at the given position.
    fn read_i16(&self, data: &[u8], position: usize) -> Result<i16>;

    /// Decode an unsigned long value at the given position.
    fn read_u32(&self, data: &[u8], position: usize) -> Result<u32>;

    /// Decode a signed long value at the given position.
    fn read_i32(&self, data: &[u8], position: usize) -> Result<i32>;

    /// Decode a single precision float value at the given position.
    fn read_f32(&self, data: &[u8], position: usize) -> Result<f32>;

    /// Decode a double precision float value at the given position.
    fn read_f64(&self, data: &[u8], position: usize) -> Result<f64>;

    /// Decode a DICOM attribute tag at the given position.
    fn read_tag(&self, data: &[u8], position: usize) -> Result<Tag> {
        let group = self.read_u16(data, position)?;
        let element = self.read_u16(data, position + 2)?;
        Ok(Tag(group, element))
    }
}

/// A basic decoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct LittleEndianBasicDecoder;

impl BasicDecode for LittleEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn read_u16(&self, data: &[u8], position: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(checked(data, position, 2)?))
    }

    fn read_i16(&self, data: &[u8], position: usize) -> Result<i16> {
        Ok(LittleEndian::read_i16(checked(data, position, 2)?))
    }

    fn read_u32(&self, data: &[u8], position: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(checked(data, position, 4)?))
    }

    fn read_i32(&self, data: &[u8], position: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(checked(data, position, 4)?))
    }

    fn read_f32(&self, data: &[u8], position: usize) -> Result<f32> {
        Ok(LittleEndian::read_f32(checked(data, position, 4)?))
    }

    fn read_f64(&self, data: &[u8], position: usize) -> Result<f64> {
        Ok(LittleEndian::read_f64(checked(data, position, 8)?))
    }
}

/// A basic decoder of DICOM primitive values in big endian.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct BigEndianBasicDecoder;

impl BasicDecode for BigEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Big
    }

    fn read_u16(&self, data: &[u8], position: usize) -> Result<u16> {
        Ok(BigEndian::read_u16(checked(data, position, 2)?))
    }

    fn read_i16(&self, data: &[u8], position: usize) -> Result<i16> {
        Ok(BigEndian::read_i16(checked(data, position, 2)?))
    }

    fn read_u32(&self, data: &[u8], position: usize) -> Result<u32> {
        Ok(BigEndian::read_u32(checked(data, position, 4)?))
    }

    fn read_i32(&self, data: &[u8], position: usize) -> Result<i32> {
        Ok(BigEndian::read_i32(checked(data, position, 4)?))
    }

    fn read_f32(&self, data: &[u8], position: usize) -> Result<f32> {
        Ok(BigEndian::read_f32(checked(data, position, 4)?))
    }

    fn read_f64(&self, data: &[u8], position: usize) -> Result<f64> {
        Ok(BigEndian::read_f64(checked(data, position, 8)?))
    }
}

/// A basic decoder with support for both Little Endian and Big Endian
/// encoding, decided at run-time. Since only two values are possible,
/// this enum may become more efficient than the use of a trait object.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BasicDecoder {
    /// Decode in Little Endian
    LE(LittleEndianBasicDecoder),
    /// Decode in Big Endian
    BE(BigEndianBasicDecoder),
}

impl BasicDecoder {
    /// Create a basic decoder for the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => LE(LittleEndianBasicDecoder),
            Endianness::Big => BE(BigEndianBasicDecoder),
        }
    }
}

use self::BasicDecoder::{BE, LE};

impl From<Endianness> for BasicDecoder {
    fn from(endianness: Endianness) -> Self {
        BasicDecoder::new(endianness)
    }
}

macro_rules! for_both {
    ($s: expr, |$e: ident| $f: expr) => {
        match *$s {
            LE(ref $e) => $f,
            BE(ref $e) => $f,
        }
    };
}

impl BasicDecode for BasicDecoder {
    fn endianness(&self) -> Endianness {
        match *self {
            LE(_) => Endianness::Little,
            BE(_) => Endianness::Big,
        }
    }

    fn read_u16(&self, data: &[u8], position: usize) -> Result<u16> {
        for_both!(self, |e| e.read_u16(data, position))
    }

    fn read_i16(&self, data: &[u8], position: usize) -> Result<i16> {
        for_both!(self, |e| e.read_i16(data, position))
    }

    fn read_u32(&self, data: &[u8], position: usize) -> Result<u32> {
        for_both!(self, |e| e.read_u32(data, position))
    }

    fn read_i32(&self, data: &[u8], position: usize) -> Result<i32> {
        for_both!(self, |e| e.read_i32(data, position))
    }

    fn read_f32(&self, data: &[u8], position: usize) -> Result<f32> {
        for_both!(self, |e| e.read_f32(data, position))
    }

    fn read_f64(&self, data: &[u8], position: usize) -> Result<f64> {
        for_both!(self, |e| e.read_f64(data, position))
    }

    fn read_tag(&self, data: &[u8], position: usize) -> Result<Tag> {
        for_both!(self, |e| e.read_tag(data, position))
    }
}
