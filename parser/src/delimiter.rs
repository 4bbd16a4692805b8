//! This module contains the delimiter search:
//! a forward scan for the item delimitation marker which bounds an
//! element of undefined length that is not a sequence.

use crate::error::{ReadValueSnafu, Result};
use crate::stream::ByteStream;
use dicomdex_core::dataset::DataElement;
use snafu::ResultExt;

/// The byte size of a delimitation marker: a 32-bit tag and a 32-bit
/// length field.
const DELIMITER_LENGTH: usize = 8;

/// Scan forward for the item delimitation marker
/// `(FFFE,E00D) | u32 length` and resolve the element's length to the
/// consumed extent, delimiter included.
///
/// The scan advances on 16-bit alignment. A non-zero length field on the
/// delimiter is reported as a warning and otherwise ignored. If the scan
/// comes within fewer than 8 bytes of the end of the buffer without
/// finding a delimiter, the element is bounded at the end of the buffer
/// and the cursor parked there; truncated files are not an error.
pub(crate) fn find_item_delimiter(
    stream: &mut ByteStream,
    element: &mut DataElement,
) -> Result<()> {
    while stream.remaining() >= DELIMITER_LENGTH {
        let group = stream.read_u16().context(ReadValueSnafu {
            position: stream.position(),
        })?;
        if group != 0xFFFE {
            continue;
        }
        let element_number = stream.read_u16().context(ReadValueSnafu {
            position: stream.position(),
        })?;
        if element_number != 0xE00D {
            continue;
        }
        let length = stream.read_u32().context(ReadValueSnafu {
            position: stream.position(),
        })?;
        if length != 0 {
            stream.add_warning(format!(
                "item delimiter with non-zero length {} at position {}",
                length,
                stream.position()
            ));
        }
        element.length = (stream.position() - element.data_offset) as u32;
        return Ok(());
    }
    // no delimiter in sight: bound the element at the end of the buffer
    tracing::warn!(
        "no item delimiter for element {} of undefined length",
        element.tag
    );
    element.length = (stream.len() - element.data_offset) as u32;
    let size = stream.len();
    stream.seek_to(size).context(ReadValueSnafu {
        position: stream.position(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteordered::Endianness;
    use bytes::Bytes;
    use dicomdex_core::header::Length;
    use dicomdex_core::Tag;

    fn element_at(data_offset: usize) -> DataElement {
        DataElement::new(
            Tag(0x0008, 0x0018),
            None,
            Length::UNDEFINED,
            data_offset,
        )
    }

    fn stream_at(data: &'static [u8], position: usize) -> ByteStream {
        let mut stream = ByteStream::new(Bytes::from_static(data), Endianness::Little);
        stream.seek_to(position).unwrap();
        stream
    }

    #[test]
    fn finds_the_delimiter_and_consumes_it() {
        const RAW: &[u8] = &[
            b'v', b'a', b'l', b'u', b'e', b'.', // 6 value bytes
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, // item delimitation
            b'n', b'e', b'x', b't',
        ];
        let mut stream = stream_at(RAW, 0);
        let mut element = element_at(0);
        find_item_delimiter(&mut stream, &mut element).unwrap();
        // the resolved length includes the consumed delimiter
        assert_eq!(element.length, 14);
        assert_eq!(stream.position(), 14);
        assert!(stream.warnings().is_empty());
    }

    #[test]
    fn non_zero_delimiter_length_is_a_warning_only() {
        const RAW: &[u8] = &[
            0xFE, 0xFF, 0x0D, 0xE0, 0x02, 0x00, 0x00, 0x00, // delimiter, length 2
        ];
        let mut stream = stream_at(RAW, 0);
        let mut element = element_at(0);
        find_item_delimiter(&mut stream, &mut element).unwrap();
        assert_eq!(element.length, 8);
        assert_eq!(stream.warnings().len(), 1);
        assert!(stream.warnings()[0].contains("non-zero length 2"));
    }

    #[test]
    fn odd_group_bytes_do_not_derail_the_scan() {
        //  value bytes containing a lone 0xFFFE group that is not a
        //  delimiter, followed by the real one
        const RAW: &[u8] = &[
            0xFE, 0xFF, 0x00, 0x00, // group matches, element does not
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut stream = stream_at(RAW, 0);
        let mut element = element_at(0);
        find_item_delimiter(&mut stream, &mut element).unwrap();
        assert_eq!(element.length, 12);
        assert_eq!(stream.position(), 12);
    }

    #[test]
    fn runs_to_the_end_of_a_truncated_buffer() {
        const RAW: &[u8] = &[b'n', b'o', b' ', b'e', b'n', b'd'];
        let mut stream = stream_at(RAW, 2);
        let mut element = element_at(2);
        find_item_delimiter(&mut stream, &mut element).unwrap();
        assert_eq!(element.length, 4);
        assert_eq!(stream.position(), RAW.len());
    }
}
