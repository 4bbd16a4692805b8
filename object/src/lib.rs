//! This crate contains the file-level interface for indexing DICOM P10
//! content: locating the `DICM` prefix, reading the file meta group,
//! resolving the transfer syntax (inflating deflated data sets when
//! needed), and driving the data set parser over the instance body.
//!
//! The entry point is [`parse`]:
//!
//! ```no_run
//! use dicomdex_object::{parse, ParseOptions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let buffer = std::fs::read("0001.dcm")?;
//! let dataset = parse(buffer, &ParseOptions::default())?;
//! let patient_name = dataset.text("x00100010".parse()?);
//! # Ok(())
//! # }
//! ```

use dicomdex_core::DataSet;
use snafu::{Backtrace, Snafu};

pub mod file;
pub mod meta;

pub use crate::file::{parse, Inflater, ParseOptions};
pub use dicomdex_core::{DataElement, Tag};

/// The error type for failures parsing a DICOM P10 buffer.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The buffer is too small to be a P10 file, or the `DICM` prefix is
    /// absent and no transfer syntax was provided to fall back on.
    #[snafu(display(
        "Not a valid DICOM P10 file: too small or DICM prefix missing at offset 128"
    ))]
    NotDicomP10 { backtrace: Backtrace },

    /// There is nothing to parse.
    #[snafu(display("The parse source buffer is empty"))]
    EmptyBuffer { backtrace: Backtrace },

    /// The byte stream could not be positioned over the meta group.
    #[snafu(display("Could not access the file meta group at position {}", position))]
    AccessMeta {
        position: usize,
        #[snafu(backtrace)]
        source: dicomdex_parser::stream::Error,
    },

    /// A meta group element could not be read. The elements read up to
    /// the failure are carried along.
    #[snafu(display("Could not read the file meta group"))]
    ReadMetaHeader {
        source: dicomdex_parser::Error,
        /// the partially populated meta data set
        partial: Box<DataSet>,
    },

    /// The mandatory Transfer Syntax UID element (0002,0010) is absent.
    #[snafu(display("Missing required transfer syntax UID attribute (0002,0010)"))]
    MissingTransferSyntax { backtrace: Backtrace },

    /// The deflated instance body could not be inflated.
    #[snafu(display("Could not inflate deflated data set"))]
    Inflate {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The instance body could not be parsed.
    #[snafu(display("Could not read the data set"))]
    ReadDataSet {
        #[snafu(backtrace)]
        source: dicomdex_parser::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
