//! Module-level error type:
//! for errors which may occur while parsing DICOM data sets.

use crate::stream;
use dicomdex_core::header::SequenceItemHeaderError;
use dicomdex_core::Tag;
use snafu::{Backtrace, Snafu};

/// The error type for failures while parsing a DICOM data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Failed to read an element header.
    #[snafu(display("Could not read element header at position {}", position))]
    ReadHeader {
        position: usize,
        #[snafu(backtrace)]
        source: stream::Error,
    },

    /// Failed to read a sequence item header.
    #[snafu(display("Could not read item header at position {}", position))]
    ReadItemHeader {
        position: usize,
        #[snafu(backtrace)]
        source: stream::Error,
    },

    /// Failed to traverse an element value.
    #[snafu(display("Could not access element value at position {}", position))]
    ReadValue {
        position: usize,
        #[snafu(backtrace)]
        source: stream::Error,
    },

    /// Found something other than a sequence item header
    /// where the format requires one.
    #[snafu(display("Bad sequence item header at position {}", position))]
    BadSequenceHeader {
        position: usize,
        #[snafu(backtrace)]
        source: SequenceItemHeaderError,
    },

    /// Found a delimiter where an item is required.
    #[snafu(display("Unexpected tag {} at position {}: expected item tag", tag, position))]
    UnexpectedTag {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },

    /// The item introducing the basic offset table declares an
    /// undefined length.
    #[snafu(display("Undefined item length in basic offset table at position {}", position))]
    UndefinedItemLength {
        position: usize,
        backtrace: Backtrace,
    },

    /// Sequence items are nested too deeply to be traversed safely.
    #[snafu(display("Sequence nesting deeper than {} levels", depth))]
    DeepSequence { depth: u32, backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;
