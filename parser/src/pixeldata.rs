//! This module contains the encapsulated pixel data reader:
//! it indexes the basic offset table and the ordered fragments of an
//! undefined length pixel data element, without decoding pixel bytes.

use crate::error::{ReadItemHeaderSnafu, ReadValueSnafu, Result, UndefinedItemLengthSnafu, UnexpectedTagSnafu};
use crate::sequence::read_item_header;
use crate::stream::ByteStream;
use dicomdex_core::dataset::{DataElement, ElementValue, Fragment, C};
use dicomdex_core::header::SequenceItemHeader;
use dicomdex_core::Tag;
use snafu::{OptionExt, ResultExt};

/// Read the basic offset table and fragment index of an encapsulated
/// pixel data element onto `element`.
///
/// The cursor is expected to stand on the basic offset table item, right
/// past the element header. Unexpected content inside the element is
/// captured as best-effort fragments with a warning, and an unterminated
/// element is bounded at the end of the buffer with a warning, so that a
/// truncated file still yields a usable index.
pub(crate) fn read_encapsulated_pixel_data(
    stream: &mut ByteStream,
    element: &mut DataElement,
) -> Result<()> {
    let position = stream.position();
    let header = read_item_header(stream)?;
    let SequenceItemHeader::Item { len } = header else {
        return UnexpectedTagSnafu {
            tag: header.tag(),
            position,
        }
        .fail();
    };
    let table_length = len.get().context(UndefinedItemLengthSnafu { position })?;

    let mut offset_table: C<u32> = C::new();
    for _ in 0..table_length / 4 {
        offset_table.push(stream.read_u32().context(ReadValueSnafu {
            position: stream.position(),
        })?);
    }

    // fragment offsets are measured from the end of the basic offset
    // table item
    let base_position = stream.position();
    let mut fragments: C<Fragment> = C::new();
    loop {
        if stream.remaining() < 8 {
            stream.add_warning(format!(
                "eof before sequence delimitation item in encapsulated pixel data element {}",
                element.tag
            ));
            element.length = (stream.position() - element.data_offset) as u32;
            break;
        }
        let item_position = stream.position();
        let tag = stream
            .read_tag()
            .context(ReadItemHeaderSnafu {
                position: item_position,
            })?;
        let length = stream
            .read_u32()
            .context(ReadItemHeaderSnafu {
                position: item_position,
            })?;
        match tag {
            Tag::SEQUENCE_DELIMITER => {
                let skip = (length as usize).min(stream.remaining());
                stream.seek(skip as i64).context(ReadValueSnafu {
                    position: stream.position(),
                })?;
                element.length = (stream.position() - element.data_offset) as u32;
                break;
            }
            Tag::ITEM => {
                let fragment_position = stream.position();
                fragments.push(Fragment {
                    offset: fragment_position - base_position - 8,
                    position: fragment_position,
                    length,
                });
                let skip = (length as usize).min(stream.remaining());
                stream.seek(skip as i64).context(ReadValueSnafu {
                    position: stream.position(),
                })?;
            }
            tag => {
                // tolerant recovery: index the unexpected block as a
                // fragment clamped to the buffer remainder and keep going
                stream.add_warning(format!(
                    "unexpected tag {} in encapsulated pixel data at position {}",
                    tag, item_position
                ));
                let length = (length as usize).min(stream.remaining()) as u32;
                let fragment_position = stream.position();
                fragments.push(Fragment {
                    offset: fragment_position - base_position - 8,
                    position: fragment_position,
                    length,
                });
                stream.seek(i64::from(length)).context(ReadValueSnafu {
                    position: stream.position(),
                })?;
            }
        }
    }
    element.value = ElementValue::PixelSequence {
        offset_table,
        fragments,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::read_element_explicit;
    use crate::read::{ReadContext, VrMode};
    use byteordered::Endianness;
    use bytes::Bytes;

    fn stream_of(data: &'static [u8]) -> ByteStream {
        ByteStream::new(Bytes::from_static(data), Endianness::Little)
    }

    //  (7FE0,0010) OB of undefined length, a basic offset table with two
    //  entries, two fragments of 4 and 2 bytes, then the delimitation
    const RAW_ENCAPSULATED: &[u8] = &[
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, // header
        0xFE, 0xFF, 0x00, 0xE0, 0x08, 0x00, 0x00, 0x00, // offset table item, length 8
        0x00, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, // offsets 0 and 12
        0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, // fragment 0, length 4
        0xA0, 0xA1, 0xA2, 0xA3, // fragment 0 data
        0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, // fragment 1, length 2
        0xB0, 0xB1, // fragment 1 data
        0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, // sequence delimitation
    ];

    #[test]
    fn fragments_and_offset_table() {
        let mut stream = stream_of(RAW_ENCAPSULATED);
        let ctx = ReadContext::new(VrMode::Explicit);
        let element = read_element_explicit(&mut stream, &ctx).unwrap();
        assert!(element.is_pixel_sequence());
        assert_eq!(element.offset_table().unwrap(), &[0, 12]);

        let fragments = element.fragments().unwrap();
        assert_eq!(fragments.len(), 2);
        // fragment offsets are measured from the end of the offset table
        assert_eq!(fragments[0].offset, 0);
        assert_eq!(fragments[0].position, 36);
        assert_eq!(fragments[0].length, 4);
        assert_eq!(fragments[1].offset, 12);
        assert_eq!(fragments[1].position, 48);
        assert_eq!(fragments[1].length, 2);

        // the element extent includes the consumed delimitation item
        assert_eq!(element.data_offset, 12);
        assert_eq!(element.length as usize, RAW_ENCAPSULATED.len() - 12);
        assert_eq!(stream.position(), RAW_ENCAPSULATED.len());
        assert!(stream.warnings().is_empty());
    }

    #[test]
    fn empty_offset_table() {
        //  same element with an empty offset table and one fragment
        const RAW: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, // offset table item, length 0
            0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, // fragment 0, length 2
            0xC0, 0xC1,
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut stream = stream_of(RAW);
        let ctx = ReadContext::new(VrMode::Explicit);
        let element = read_element_explicit(&mut stream, &ctx).unwrap();
        assert_eq!(element.offset_table().unwrap(), &[] as &[u32]);
        let fragments = element.fragments().unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].offset, 0);
        assert_eq!(fragments[0].position, 28);
    }

    #[test]
    fn missing_offset_table_item_is_fatal() {
        //  pixel data element going straight into a non-item tag
        const RAW: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            0x08, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut stream = stream_of(RAW);
        let ctx = ReadContext::new(VrMode::Explicit);
        assert!(read_element_explicit(&mut stream, &ctx).is_err());
    }

    #[test]
    fn unexpected_tag_is_recovered_as_a_fragment() {
        //  a stray element header where a fragment item should be
        const RAW: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, // offset table item, length 0
            0x08, 0x00, 0x18, 0x00, 0xFF, 0x00, 0x00, 0x00, // stray, length clamped
            0xAA, 0xBB,
        ];
        let mut stream = stream_of(RAW);
        let ctx = ReadContext::new(VrMode::Explicit);
        let element = read_element_explicit(&mut stream, &ctx).unwrap();
        let fragments = element.fragments().unwrap();
        assert_eq!(fragments.len(), 1);
        // the stray block's length was clamped to the buffer remainder
        assert_eq!(fragments[0].length, 2);
        assert_eq!(stream.position(), RAW.len());
        // a warning for the stray tag and one for the missing delimiter
        assert_eq!(stream.warnings().len(), 2);
        assert!(stream.warnings()[0].contains("unexpected tag x00080018"));
        assert!(stream.warnings()[1].contains("eof before sequence delimitation item"));
    }

    #[test]
    fn truncated_fragment_is_bounded_at_the_buffer_end() {
        //  fragment declaring more bytes than the buffer holds
        const RAW: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, // offset table item, length 0
            0xFE, 0xFF, 0x00, 0xE0, 0x40, 0x00, 0x00, 0x00, // fragment claims 64 bytes
            0xD0, 0xD1, 0xD2,
        ];
        let mut stream = stream_of(RAW);
        let ctx = ReadContext::new(VrMode::Explicit);
        let element = read_element_explicit(&mut stream, &ctx).unwrap();
        let fragments = element.fragments().unwrap();
        assert_eq!(fragments.len(), 1);
        // the descriptor keeps the declared length
        assert_eq!(fragments[0].length, 64);
        // but the walk stops at the end of the buffer
        assert_eq!(stream.position(), RAW.len());
        assert_eq!(element.length as usize, RAW.len() - 12);
        assert_eq!(stream.warnings().len(), 1);
    }
}
