//! This module contains the sequence (SQ) reader:
//! the item-by-item walk over the nested data sets of a sequence
//! element, for both defined and undefined sequence lengths.

use crate::error::{BadSequenceHeaderSnafu, ReadItemHeaderSnafu, ReadValueSnafu, Result, UnexpectedTagSnafu};
use crate::read::{self, ReadContext, VrMode};
use crate::stream::ByteStream;
use byteordered::Endianness;
use dicomdex_core::dataset::{DataElement, DataSet, ElementValue, SequenceItem, C};
use dicomdex_core::header::{Length, SequenceItemHeader};
use dicomdex_core::Tag;
use snafu::ResultExt;

/// Read a sequence item header (tag and 32-bit length) from the stream.
pub(crate) fn read_item_header(stream: &mut ByteStream) -> Result<SequenceItemHeader> {
    let position = stream.position();
    let tag = stream.read_tag().context(ReadItemHeaderSnafu { position })?;
    let len = Length(stream.read_u32().context(ReadItemHeaderSnafu { position })?);
    SequenceItemHeader::new(tag, len).context(BadSequenceHeaderSnafu { position })
}

/// Read the items of a sequence element onto `element`,
/// leaving the stream just past the end of the sequence.
///
/// With a defined length, items are walked until the element's extent is
/// exhausted. With an undefined length, items are walked until the
/// sequence delimitation item, which is consumed; the element's length is
/// then resolved to the extent of the items alone.
pub(crate) fn read_sequence_items(
    stream: &mut ByteStream,
    ctx: &ReadContext,
    element: &mut DataElement,
) -> Result<()> {
    let mut items: C<SequenceItem> = C::new();
    if element.had_undefined_length {
        loop {
            if stream.remaining() < 8 {
                stream.add_warning(format!(
                    "eof before sequence delimitation item for element {}",
                    element.tag
                ));
                element.length = (stream.len() - element.data_offset) as u32;
                let size = stream.len();
                stream.seek_to(size).context(ReadValueSnafu {
                    position: stream.position(),
                })?;
                break;
            }
            match read_item_header(stream)? {
                SequenceItemHeader::Item { len } => {
                    items.push(read_sequence_item(stream, ctx, len)?);
                }
                SequenceItemHeader::SequenceDelimiter { .. } => {
                    element.length = (stream.position() - 8 - element.data_offset) as u32;
                    break;
                }
                header @ SequenceItemHeader::ItemDelimiter { .. } => {
                    return UnexpectedTagSnafu {
                        tag: header.tag(),
                        position: stream.position() - 8,
                    }
                    .fail();
                }
            }
        }
    } else {
        let end_position = element.data_offset + element.length as usize;
        while stream.position() < end_position {
            match read_item_header(stream)? {
                SequenceItemHeader::Item { len } => {
                    items.push(read_sequence_item(stream, ctx, len)?);
                }
                header => {
                    return UnexpectedTagSnafu {
                        tag: header.tag(),
                        position: stream.position() - 8,
                    }
                    .fail();
                }
            }
        }
        // the nested parses advanced the stream item by item;
        // land exactly on the declared end of the sequence
        stream.seek_to(end_position).context(ReadValueSnafu {
            position: stream.position(),
        })?;
    }
    element.value = ElementValue::Sequence(items);
    Ok(())
}

/// Read the items of a UN element of undefined length.
///
/// Such an element holds an implicit VR little endian data set regardless
/// of the enclosing transfer syntax, so the byte order is switched for
/// the duration of the nested parse and restored afterwards.
pub(crate) fn read_sequence_items_un(
    stream: &mut ByteStream,
    ctx: &ReadContext,
    element: &mut DataElement,
) -> Result<()> {
    let nested = ctx.nested_with_mode(VrMode::Implicit, None)?;
    let previous = stream.set_endianness(Endianness::Little);
    let outcome = read_sequence_items(stream, &nested, element);
    stream.set_endianness(previous);
    outcome
}

/// Read one sequence item whose header was already consumed:
/// a nested data set bounded either by the item's declared length or by
/// an item delimitation item.
fn read_sequence_item(
    stream: &mut ByteStream,
    ctx: &ReadContext,
    len: Length,
) -> Result<SequenceItem> {
    let data_offset = stream.position();
    let mut dataset = DataSet::new(stream.share_data(), stream.endianness());
    match len.get() {
        None => {
            // bounded by an item delimitation item, which the nested walk
            // inserts into the item's data set before stopping
            let nested = ctx.nested(Some(Tag::ITEM_DELIMITER))?;
            let size = stream.len();
            read::read_data_set(stream, &nested, &mut dataset, size)?;
            if dataset.element(Tag::ITEM_DELIMITER).is_none() {
                stream.add_warning(format!(
                    "eof before item delimitation item for item at offset {}",
                    data_offset
                ));
            }
            Ok(SequenceItem {
                data_offset,
                length: (stream.position() - data_offset) as u32,
                had_undefined_length: true,
                dataset,
            })
        }
        Some(length) => {
            let end_position = data_offset + length as usize;
            let nested = ctx.nested(None)?;
            read::read_data_set(stream, &nested, &mut dataset, end_position)?;
            stream.seek_to(end_position).context(ReadValueSnafu {
                position: stream.position(),
            })?;
            Ok(SequenceItem {
                data_offset,
                length,
                had_undefined_length: false,
                dataset,
            })
        }
    }
}
