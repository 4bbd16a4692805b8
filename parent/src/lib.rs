//! This crate serves as a parent for the library crates of the dicomdex
//! project, a zero-copy indexer for DICOM P10 buffers.
//!
//! For parsing files and buffers, please see [`object`].
pub use dicomdex_core as core;
pub use dicomdex_parser as parser;
pub use dicomdex_object as object;

pub use dicomdex_core::{DataElement, DataSet, Tag, VR};
pub use dicomdex_object::{parse, ParseOptions};
