//! This crate works on top of `dicomdex-core` to parse DICOM data sets
//! from in-memory buffers into their zero-copy element index.
//!
//! The parser is driven by the [data set walker](crate::read), which
//! reads [data elements](crate::element) one by one through a
//! [byte stream](crate::stream) carrying the active byte order strategy
//! and the warning log. Elements of undefined length are bounded by a
//! delimiter search, descended into as sequences of nested data sets, or
//! indexed as encapsulated pixel data fragments, as the format requires.
//!
//! The transfer syntax and file-level concerns (the DICM preamble, the
//! file meta group, deflated data sets) are handled by the
//! `dicomdex-object` crate.

pub mod element;
pub mod error;
pub mod read;
pub mod stream;

mod delimiter;
mod pixeldata;
mod sequence;

pub use crate::error::Error;
pub use crate::read::{read_data_set, ReadContext, VrIndex, VrMode, MAX_SEQUENCE_DEPTH};
pub use crate::stream::ByteStream;
