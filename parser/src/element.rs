//! This module contains the data element readers:
//! one data element header is read and, depending on its VR and length,
//! the element value is skipped over, bounded by a delimiter search,
//! or descended into as a sequence or encapsulated pixel data.

use crate::delimiter;
use crate::error::{ReadHeaderSnafu, ReadValueSnafu, Result};
use crate::pixeldata;
use crate::read::ReadContext;
use crate::sequence;
use crate::stream::ByteStream;
use dicomdex_core::dataset::{DataElement, ElementValue};
use dicomdex_core::header::Length;
use dicomdex_core::{Tag, VR};
use snafu::ResultExt;

/// Read one data element in explicit VR form:
/// `tag | VR | (2 or 4 byte) length`, with 2 reserved bytes before
/// 4-byte length fields.
///
/// Elements with the boundary tag of the context are returned as soon as
/// their header is read, leaving the cursor at the start of the value.
pub fn read_element_explicit(stream: &mut ByteStream, ctx: &ReadContext) -> Result<DataElement> {
    let position = stream.position();
    let tag = stream.read_tag().context(ReadHeaderSnafu { position })?;
    // Unrecognized representations take the plain 2-byte length path.
    // This also covers item and delimitation tags, whose headers carry no
    // VR: the first half of their 32-bit length field reads as a blank
    // VR, the second half as the 16-bit length, for the same 8 byte
    // header in total.
    let vr_string = stream
        .read_fixed_string(2)
        .context(ReadHeaderSnafu { position })?;
    let vr = vr_string.parse::<VR>().ok();
    let len = match vr {
        Some(vr) if vr.has_extended_length() => {
            stream.seek(2).context(ReadHeaderSnafu { position })?;
            Length(stream.read_u32().context(ReadHeaderSnafu { position })?)
        }
        _ => Length(u32::from(
            stream.read_u16().context(ReadHeaderSnafu { position })?,
        )),
    };
    let mut element = DataElement::new(tag, vr, len, stream.position());
    if ctx.until_tag == Some(tag) {
        return Ok(element);
    }
    match vr {
        Some(VR::SQ) => {
            sequence::read_sequence_items(stream, ctx, &mut element)?;
        }
        _ if len.is_undefined() && tag == Tag::PIXEL_DATA => {
            pixeldata::read_encapsulated_pixel_data(stream, &mut element)?;
        }
        Some(VR::UN) if len.is_undefined() => {
            // a UN element of undefined length holds an implicit VR
            // little endian data set, regardless of the enclosing
            // transfer syntax
            sequence::read_sequence_items_un(stream, ctx, &mut element)?;
        }
        _ if len.is_undefined() => {
            delimiter::find_item_delimiter(stream, &mut element)?;
        }
        _ => {
            stream
                .seek(i64::from(element.length))
                .context(ReadValueSnafu {
                    position: stream.position(),
                })?;
        }
    }
    Ok(element)
}

/// Read one data element in implicit VR form: `tag | u32 length`.
/// The VR, if any, comes from the optional lookup in the context.
pub fn read_element_implicit(stream: &mut ByteStream, ctx: &ReadContext) -> Result<DataElement> {
    let position = stream.position();
    let tag = stream.read_tag().context(ReadHeaderSnafu { position })?;
    let len = Length(stream.read_u32().context(ReadHeaderSnafu { position })?);
    let vr = ctx.vr_index.and_then(|lookup| lookup(tag));
    let mut element = DataElement::new(tag, vr, len, stream.position());
    if ctx.until_tag == Some(tag) {
        return Ok(element);
    }
    if len.is_undefined() && tag == Tag::PIXEL_DATA {
        // undefined length pixel data is always encapsulated
        pixeldata::read_encapsulated_pixel_data(stream, &mut element)?;
    } else if is_sequence(stream, &element) {
        if !tag.is_private() || element.had_undefined_length {
            sequence::read_sequence_items(stream, ctx, &mut element)?;
            if tag.is_private() {
                // consumers do not expect a sequence shape on a private
                // tag, so the parsed items are dropped
                element.value = ElementValue::Primitive;
            }
        } else {
            stream
                .seek(i64::from(element.length))
                .context(ReadValueSnafu {
                    position: stream.position(),
                })?;
        }
    } else if element.had_undefined_length {
        delimiter::find_item_delimiter(stream, &mut element)?;
    } else {
        stream
            .seek(i64::from(element.length))
            .context(ReadValueSnafu {
                position: stream.position(),
            })?;
    }
    Ok(element)
}

/// Decide whether an implicit VR element is a sequence:
/// an explicit `SQ` from the VR lookup forces sequence handling,
/// otherwise the decision peeks at the next tag for an item
/// or sequence delimitation marker.
fn is_sequence(stream: &ByteStream, element: &DataElement) -> bool {
    if element.vr == Some(VR::SQ) {
        return true;
    }
    if stream.remaining() < 4 {
        return false;
    }
    match stream.peek_tag() {
        Ok(next) => next == Tag::ITEM || next == Tag::SEQUENCE_DELIMITER,
        Err(_) => false,
    }
}
