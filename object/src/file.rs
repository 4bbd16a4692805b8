//! Module containing the top-level interface for parsing DICOM P10
//! buffers: transfer syntax resolution, inflation of deflated data sets,
//! and the merge of the file meta group with the instance body.

use crate::{meta, EmptyBufferSnafu, InflateSnafu, MissingTransferSyntaxSnafu, ReadDataSetSnafu, Result};
use byteordered::Endianness;
use bytes::Bytes;
use dicomdex_core::dataset::DataSet;
use dicomdex_core::Tag;
use dicomdex_parser::read::{self, ReadContext, VrIndex, VrMode};
use dicomdex_parser::ByteStream;
use snafu::{ensure, OptionExt, ResultExt};
use std::io::Read;

/// Implicit VR Little Endian: Default Transfer Syntax for DICOM.
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
/// Deflated Explicit VR Little Endian.
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
/// Explicit VR Big Endian (retired).
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// A caller-provided inflater for the deflated transfer syntax:
/// given the whole buffer and the position where the deflated body
/// starts, it produces the full inflated buffer
/// (the unchanged head followed by the inflated body).
pub type Inflater = fn(&[u8], usize) -> std::io::Result<Vec<u8>>;

/// The set of options for [`parse`].
#[derive(Debug, Default, Clone)]
pub struct ParseOptions {
    /// Stop parsing right after inserting the element with this tag,
    /// given in canonical form (e.g. `"x00100010"`). A string that is
    /// not a canonical tag never matches.
    pub until_tag: Option<String>,
    /// Transfer syntax UID to assume for a buffer that carries no P10
    /// preamble and meta group.
    pub transfer_syntax: Option<String>,
    /// Replace the built-in raw Deflate inflation.
    pub inflater: Option<Inflater>,
    /// VR lookup consulted for elements of implicit VR data sets.
    pub vr_callback: Option<VrIndex>,
}

impl ParseOptions {
    /// Create a new options value with the defaults.
    pub fn new() -> Self {
        ParseOptions::default()
    }

    /// Stop parsing right after inserting the element with this tag.
    pub fn until_tag(mut self, tag: impl Into<String>) -> Self {
        self.until_tag = Some(tag.into());
        self
    }

    /// Assume this transfer syntax for a buffer with no meta group.
    pub fn transfer_syntax(mut self, uid: impl Into<String>) -> Self {
        self.transfer_syntax = Some(uid.into());
        self
    }

    /// Replace the built-in raw Deflate inflation.
    pub fn inflater(mut self, inflater: Inflater) -> Self {
        self.inflater = Some(inflater);
        self
    }

    /// Consult this VR lookup for elements of implicit VR data sets.
    pub fn vr_callback(mut self, vr_callback: VrIndex) -> Self {
        self.vr_callback = Some(vr_callback);
        self
    }
}

/// Parse a DICOM P10 buffer into its indexed data set.
///
/// The returned data set holds the element index of both the file meta
/// group and the instance body, along with the non-fatal warnings
/// collected along the way (meta group warnings first). The buffer is
/// never copied, except by the inflation of a deflated body; in that
/// case the data set refers to the inflated buffer.
pub fn parse(data: impl Into<Bytes>, options: &ParseOptions) -> Result<DataSet> {
    let data: Bytes = data.into();
    ensure!(!data.is_empty(), EmptyBufferSnafu);

    let until_tag = options
        .until_tag
        .as_deref()
        .and_then(|tag| tag.parse::<Tag>().ok());

    // the meta group is always explicit VR little endian
    let mut meta_stream = ByteStream::new(data.clone(), Endianness::Little);
    let meta =
        meta::read_meta_header(&mut meta_stream, options.transfer_syntax.as_deref(), until_tag)?;
    let body_start = meta_stream.position();
    let mut warnings = meta_stream.take_warnings();

    // the boundary tag may already have been reached inside the meta
    // group, in which case the instance body is not read at all
    if until_tag.is_some_and(|tag| meta.element(tag).is_some()) {
        let mut dataset = DataSet::new(data, Endianness::Little);
        for element in meta.into_elements().into_values() {
            dataset.insert(element);
        }
        dataset.extend_warnings(warnings);
        return Ok(dataset);
    }

    let transfer_syntax = match meta.element(Tag::TRANSFER_SYNTAX) {
        // the zero-extent descriptor synthesized for a headerless
        // buffer: the value lives in the option, not in the buffer
        Some(element) if element.length == 0 => options
            .transfer_syntax
            .clone()
            .context(MissingTransferSyntaxSnafu)?,
        Some(_) => meta
            .string(Tag::TRANSFER_SYNTAX)
            .context(MissingTransferSyntaxSnafu)?,
        None => return MissingTransferSyntaxSnafu.fail(),
    };

    // every other syntax, the encapsulated ones included, is explicit
    // VR little endian at the data set level
    let (data, endianness, mode) = match transfer_syntax.as_str() {
        IMPLICIT_VR_LITTLE_ENDIAN => (data, Endianness::Little, VrMode::Implicit),
        EXPLICIT_VR_LITTLE_ENDIAN => (data, Endianness::Little, VrMode::Explicit),
        EXPLICIT_VR_BIG_ENDIAN => (data, Endianness::Big, VrMode::Explicit),
        DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
            let inflated = inflate_body(&data, body_start, options.inflater)?;
            (Bytes::from(inflated), Endianness::Little, VrMode::Explicit)
        }
        _ => (data, Endianness::Little, VrMode::Explicit),
    };
    tracing::debug!(
        "parsing data set with transfer syntax {} from position {}",
        transfer_syntax,
        body_start
    );

    let ctx = ReadContext::new(mode)
        .until_tag(until_tag)
        .vr_index(options.vr_callback);

    let mut stream = ByteStream::with_position(data.clone(), endianness, body_start);
    let mut dataset = DataSet::new(data, endianness);
    let size = stream.len();
    read::read_data_set(&mut stream, &ctx, &mut dataset, size).context(ReadDataSetSnafu)?;

    // body elements first, then the meta group elements, which win on
    // the (normally impossible) key collision
    for element in meta.into_elements().into_values() {
        dataset.insert(element);
    }
    warnings.extend(stream.take_warnings());
    dataset.extend_warnings(warnings);
    Ok(dataset)
}

/// Produce the full inflated buffer for a deflated data set: the bytes
/// up to `body_start` unchanged, followed by the raw-inflated remainder.
/// Meta group element offsets remain valid over the result.
fn inflate_body(data: &Bytes, body_start: usize, inflater: Option<Inflater>) -> Result<Vec<u8>> {
    match inflater {
        Some(inflate) => inflate(data, body_start).context(InflateSnafu),
        None => {
            let mut body = Vec::new();
            flate2::read::DeflateDecoder::new(&data[body_start..])
                .read_to_end(&mut body)
                .context(InflateSnafu)?;
            let mut full = Vec::with_capacity(body_start + body.len());
            full.extend_from_slice(&data[..body_start]);
            full.append(&mut body);
            Ok(full)
        }
    }
}
