//! This crate contains the core types for indexed access to DICOM data
//! sets: attribute tags, value representations, lengths, the element and
//! data set model, and the basic endian-aware primitive decoders which
//! read values at absolute buffer positions.
//!
//! The data set model is an index: elements describe where their encoded
//! value lives inside the original byte buffer instead of owning a copy
//! of it. Parsing logic lives in the `dicomdex-parser` crate and the
//! file-level interface in `dicomdex-object`.

pub mod dataset;
pub mod decode;
pub mod header;

pub use crate::dataset::{DataElement, DataSet, ElementValue, Fragment, SequenceItem, C};
pub use crate::header::{Length, SequenceItemHeader, Tag, VR};

/// Re-exported from the `byteordered` crate:
/// the runtime byte order selector carried by data sets and streams.
pub use byteordered::Endianness;
