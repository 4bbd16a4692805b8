//! Module for reading the DICOM file meta group.
//!
//! The meta group sits right after the 128-byte preamble and the `DICM`
//! magic code, and is always encoded in explicit VR little endian, no
//! matter which transfer syntax the instance body declares.

use crate::{AccessMetaSnafu, Error, NotDicomP10Snafu, Result};
use byteordered::Endianness;
use dicomdex_core::dataset::{DataElement, DataSet};
use dicomdex_core::header::Length;
use dicomdex_core::{Tag, VR};
use dicomdex_parser::element;
use dicomdex_parser::read::{ReadContext, VrMode};
use dicomdex_parser::ByteStream;
use snafu::ResultExt;

/// The DICOM magic code expected right after the preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

/// The size of the P10 preamble, in bytes.
pub const PREAMBLE_LENGTH: usize = 128;

/// The highest possible attribute tag of the file meta group.
const META_LAST_TAG: Tag = Tag(0x0002, 0xFFFF);

/// Read the file meta group from a little endian byte stream positioned
/// at the start of the buffer, leaving the cursor on the first element
/// of the instance body.
///
/// The walk is bounded by peeking at each element's tag: only group
/// `0002` (and lower) elements are ever read, so the instance body is
/// never touched here, no matter which transfer syntax it uses.
/// A `until_tag` boundary stops the walk right after inserting the
/// element with that tag.
///
/// When the buffer does not start with a P10 preamble and magic code,
/// a provided `transfer_syntax_hint` stands in for the missing meta
/// group: the cursor is rewound to the start of the buffer and a minimal
/// meta set holding only a synthesized Transfer Syntax UID descriptor is
/// returned. Without a hint, such a buffer is not parsable.
///
/// A failure while reading a meta element carries the partially
/// populated meta set in [`Error::ReadMetaHeader`].
pub fn read_meta_header(
    stream: &mut ByteStream,
    transfer_syntax_hint: Option<&str>,
    until_tag: Option<Tag>,
) -> Result<DataSet> {
    if stream.len() <= PREAMBLE_LENGTH + DICM_MAGIC_CODE.len() {
        if transfer_syntax_hint.is_some() {
            return Ok(synthesized_meta(stream));
        }
        return NotDicomP10Snafu.fail();
    }
    stream.seek_to(PREAMBLE_LENGTH).context(AccessMetaSnafu {
        position: stream.position(),
    })?;
    let prefix = stream
        .read_fixed_string(DICM_MAGIC_CODE.len())
        .context(AccessMetaSnafu {
            position: stream.position(),
        })?;
    if prefix.as_bytes() != DICM_MAGIC_CODE.as_ref() {
        if transfer_syntax_hint.is_some() {
            stream.seek_to(0).context(AccessMetaSnafu {
                position: stream.position(),
            })?;
            return Ok(synthesized_meta(stream));
        }
        return NotDicomP10Snafu.fail();
    }

    let mut dataset = DataSet::new(stream.share_data(), Endianness::Little);
    let ctx = ReadContext::new(VrMode::Explicit).until_tag(until_tag);
    while stream.remaining() >= 8 {
        // pure boundary check: anything past group 0002 belongs to the
        // instance body, whose encoding may not even be little endian
        let next = stream.peek_tag().context(AccessMetaSnafu {
            position: stream.position(),
        })?;
        if next > META_LAST_TAG {
            break;
        }
        let mut element = match element::read_element_explicit(stream, &ctx) {
            Ok(element) => element,
            Err(source) => {
                return Err(Error::ReadMetaHeader {
                    source,
                    partial: Box::new(dataset),
                })
            }
        };
        let tag = element.tag;
        element.endianness = Some(Endianness::Little);
        dataset.insert(element);
        if until_tag == Some(tag) {
            break;
        }
    }
    Ok(dataset)
}

/// A minimal meta set standing in for an absent meta group: only a
/// zero-extent Transfer Syntax UID descriptor, whose value lives in the
/// caller-provided hint rather than in the buffer.
fn synthesized_meta(stream: &ByteStream) -> DataSet {
    let mut dataset = DataSet::new(stream.share_data(), Endianness::Little);
    let mut element = DataElement::new(Tag::TRANSFER_SYNTAX, Some(VR::UI), Length(0), 0);
    element.endianness = Some(Endianness::Little);
    dataset.insert(element);
    dataset
}
