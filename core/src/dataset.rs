//! This module contains the in-memory representation of an indexed DICOM
//! data set.
//!
//! A [`DataSet`] maps attribute tags to [`DataElement`] descriptors which
//! locate, type and delimit the encoded value inside the data set's byte
//! buffer. Element values are never copied out of the buffer during
//! parsing; the value accessors in this module decode them on demand.

use crate::decode::{BasicDecode, BasicDecoder};
use crate::header::{Length, Tag, VR};
use byteordered::Endianness;
use bytes::Bytes;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// The type of the container of items, fragments and offsets
/// held by a single data element.
pub type C<T> = SmallVec<[T; 2]>;

/// A descriptor for one occurrence of a tag in a data set's buffer.
///
/// The element does not own its value: `data_offset` and `length` delimit
/// the encoded bytes inside the buffer of the data set which holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    /// the attribute tag
    pub tag: Tag,
    /// the value representation, unknown in implicit VR data sets
    /// unless provided by a VR lookup
    pub vr: Option<VR>,
    /// the byte length of the value; for elements of undefined length
    /// this is resolved during parsing from the delimiting marker
    pub length: u32,
    /// absolute offset into the buffer where the value begins
    pub data_offset: usize,
    /// whether the length field on the wire was the undefined sentinel
    pub had_undefined_length: bool,
    /// endianness override for elements whose encoding differs from the
    /// rest of the data set (file meta elements are always little endian)
    pub endianness: Option<Endianness>,
    /// the shape of the element's value
    pub value: ElementValue,
}

impl DataElement {
    /// Create a fresh primitive element descriptor from the properties
    /// found in its header.
    pub fn new(tag: Tag, vr: Option<VR>, len: Length, data_offset: usize) -> Self {
        DataElement {
            tag,
            vr,
            length: len.0,
            data_offset,
            had_undefined_length: len.is_undefined(),
            endianness: None,
            value: ElementValue::Primitive,
        }
    }

    /// Whether this element holds a sequence of items.
    #[inline]
    pub fn is_sequence(&self) -> bool {
        matches!(self.value, ElementValue::Sequence(_))
    }

    /// Whether this element holds encapsulated pixel data.
    #[inline]
    pub fn is_pixel_sequence(&self) -> bool {
        matches!(self.value, ElementValue::PixelSequence { .. })
    }

    /// Retrieve the sequence items, if this element is a sequence.
    pub fn items(&self) -> Option<&[SequenceItem]> {
        match &self.value {
            ElementValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Retrieve the basic offset table, if this element is encapsulated
    /// pixel data.
    pub fn offset_table(&self) -> Option<&[u32]> {
        match &self.value {
            ElementValue::PixelSequence { offset_table, .. } => Some(offset_table),
            _ => None,
        }
    }

    /// Retrieve the pixel data fragment descriptors, if this element is
    /// encapsulated pixel data.
    pub fn fragments(&self) -> Option<&[Fragment]> {
        match &self.value {
            ElementValue::PixelSequence { fragments, .. } => Some(fragments),
            _ => None,
        }
    }
}

/// The value shape of a data element.
///
/// The variants are mutually exclusive: an element is either a plain
/// extent of value bytes, a sequence of nested data sets, or an
/// encapsulated pixel data fragment index.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// A plain extent of value bytes in the buffer.
    Primitive,
    /// An ordered list of nested data sets.
    Sequence(C<SequenceItem>),
    /// Encapsulated pixel data: a basic offset table and an ordered list
    /// of fragment descriptors. The pixel bytes themselves are not
    /// decoded.
    PixelSequence {
        /// per-frame offsets from the basic offset table item
        offset_table: C<u32>,
        /// the indexed fragments
        fragments: C<Fragment>,
    },
}

/// A descriptor for one fragment of an encapsulated pixel data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// offset of the fragment's item tag, measured from the end of the
    /// basic offset table item (fragment 0 is at offset 0)
    pub offset: usize,
    /// absolute buffer offset of the fragment's first data byte
    pub position: usize,
    /// byte length of the fragment data
    pub length: u32,
}

/// One item of a sequence element: a data set nested inside it,
/// bounded either by an explicit length or an item delimitation marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceItem {
    /// absolute offset of the item's first value byte
    pub data_offset: usize,
    /// the byte length of the item value, resolved during parsing when
    /// the item length was undefined
    pub length: u32,
    /// whether the item length field on the wire was the undefined
    /// sentinel
    pub had_undefined_length: bool,
    /// the nested data set
    pub dataset: DataSet,
}

impl SequenceItem {
    /// Retrieve the item's nested data set.
    #[inline]
    pub fn dataset(&self) -> &DataSet {
        &self.dataset
    }
}

/// An indexed DICOM data set.
///
/// Created empty, populated once by a single traversal of the buffer,
/// and read-only thereafter. The buffer is shared (never copied) between
/// the data set and the nested data sets of its sequence items.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// the byte buffer which all element extents refer to
    data: Bytes,
    /// the byte order of the data set's encoding
    endianness: Endianness,
    /// the element map
    elements: BTreeMap<Tag, DataElement>,
    /// non-fatal anomalies collected while parsing, in order
    warnings: Vec<String>,
}

impl PartialEq for DataSet {
    // This implementation ignores the warning list.
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl DataSet {
    /// Create a new empty data set over the given buffer.
    pub fn new(data: Bytes, endianness: Endianness) -> Self {
        DataSet {
            data,
            endianness,
            elements: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Insert a data element to the object, replacing (and returning) any
    /// previous element of the same attribute.
    pub fn insert(&mut self, element: DataElement) -> Option<DataElement> {
        self.elements.insert(element.tag, element)
    }

    /// Retrieve a particular DICOM element by its tag.
    pub fn element(&self, tag: Tag) -> Option<&DataElement> {
        self.elements.get(&tag)
    }

    /// Retrieve the full element map, ordered by tag.
    pub fn elements(&self) -> &BTreeMap<Tag, DataElement> {
        &self.elements
    }

    /// Take the element map out of the data set.
    pub fn into_elements(self) -> BTreeMap<Tag, DataElement> {
        self.elements
    }

    /// The number of elements in the data set.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the data set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Retrieve the warnings collected while the data set was parsed.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Append warnings to the data set's warning list.
    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    /// The byte order of the data set's encoding.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Retrieve the byte buffer backing this data set.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Retrieve the raw value bytes of the element with the given tag.
    pub fn element_data(&self, tag: Tag) -> Option<&[u8]> {
        let element = self.elements.get(&tag)?;
        self.data
            .get(element.data_offset..element.data_offset + element.length as usize)
    }

    fn decoder_for(&self, element: &DataElement) -> BasicDecoder {
        BasicDecoder::new(element.endianness.unwrap_or(self.endianness))
    }

    /// Read the element value as an ASCII-ish string: the bytes up to
    /// (but not including) the first NUL, decoded lossily.
    fn fixed_string(&self, element: &DataElement) -> Option<String> {
        let bytes = self
            .data
            .get(element.data_offset..element.data_offset + element.length as usize)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Macro for implementing the fixed-width binary value getters,
/// reading with the element's byte order strategy at
/// `data_offset + index * width`.
///
/// Should be placed inside `DataSet`'s impl block.
macro_rules! impl_binary_getters {
    ($name: ident, $name_at: ident, $read: ident, $width: expr, $ret: ty) => {
        #[doc = concat!("Read the first `", stringify!($ret), "` value of the element with the given tag.")]
        pub fn $name(&self, tag: Tag) -> Option<$ret> {
            self.$name_at(tag, 0)
        }

        #[doc = concat!("Read the `", stringify!($ret), "` value at the given value index of the element with the given tag.")]
        pub fn $name_at(&self, tag: Tag, index: usize) -> Option<$ret> {
            let element = self.element(tag)?;
            self.decoder_for(element)
                .$read(&self.data, element.data_offset + index * $width)
                .ok()
        }
    };
}

impl DataSet {
    impl_binary_getters!(uint16, uint16_at, read_u16, 2, u16);
    impl_binary_getters!(int16, int16_at, read_i16, 2, i16);
    impl_binary_getters!(uint32, uint32_at, read_u32, 4, u32);
    impl_binary_getters!(int32, int32_at, read_i32, 4, i32);
    impl_binary_getters!(float32, float32_at, read_f32, 4, f32);
    impl_binary_getters!(float64, float64_at, read_f64, 8, f64);

    /// Read the value of an AT (attribute tag) element.
    /// The element value must be exactly 4 bytes long.
    pub fn attribute_tag(&self, tag: Tag) -> Option<Tag> {
        let element = self.element(tag)?;
        if element.length != 4 {
            return None;
        }
        self.decoder_for(element)
            .read_tag(&self.data, element.data_offset)
            .ok()
    }

    /// Read the whole element value as a string,
    /// trimmed of whitespace on both sides.
    ///
    /// Suitable for the string representations which admit neither
    /// leading nor trailing spaces (UI, DS, IS, AE, CS, SH, LO).
    pub fn string(&self, tag: Tag) -> Option<String> {
        let element = self.element(tag)?;
        if element.length == 0 {
            return None;
        }
        Some(self.fixed_string(element)?.trim().to_string())
    }

    /// Read one value of a multi-valued string element
    /// (values separated by backslashes),
    /// trimmed of whitespace on both sides.
    pub fn string_at(&self, tag: Tag, index: usize) -> Option<String> {
        let element = self.element(tag)?;
        if element.length == 0 {
            return None;
        }
        let string = self.fixed_string(element)?;
        string
            .split('\\')
            .nth(index)
            .map(|value| value.trim().to_string())
    }

    /// Read the whole element value as text,
    /// trimmed of trailing spaces only.
    ///
    /// Suitable for the text representations in which leading spaces are
    /// significant (PN, LT, ST, UT, DT, TM).
    pub fn text(&self, tag: Tag) -> Option<String> {
        let element = self.element(tag)?;
        if element.length == 0 {
            return None;
        }
        Some(self.fixed_string(element)?.trim_end_matches(' ').to_string())
    }

    /// Read one value of a multi-valued text element,
    /// trimmed of trailing spaces only.
    pub fn text_at(&self, tag: Tag, index: usize) -> Option<String> {
        let element = self.element(tag)?;
        if element.length == 0 {
            return None;
        }
        let string = self.fixed_string(element)?;
        string
            .split('\\')
            .nth(index)
            .map(|value| value.trim_end_matches(' ').to_string())
    }

    /// The number of backslash-separated string values
    /// in the element with the given tag.
    pub fn num_string_values(&self, tag: Tag) -> Option<usize> {
        let element = self.element(tag)?;
        if element.length == 0 {
            return None;
        }
        Some(self.fixed_string(element)?.split('\\').count())
    }

    /// Parse one value of a DS (decimal string) element
    /// as a floating point number.
    pub fn float_string(&self, tag: Tag, index: usize) -> Option<f64> {
        self.string_at(tag, index)?.parse().ok()
    }

    /// Parse one value of an IS (integer string) element as an integer.
    pub fn int_string(&self, tag: Tag, index: usize) -> Option<i32> {
        self.string_at(tag, index)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> DataSet {
        // hand-assembled buffer holding, in order:
        //  [0..4)   "12\\7" (IS, two values)
        //  [4..12)  "DOE^JOHN" (PN)
        //  [12..16) (0028,0010) as an AT value, little endian
        //  [16..20) two little endian u16s: 0x0040, 0x1234
        //  [20..28) " 1.5 \0.."
        let data = Bytes::from_static(b"12\\7DOE^JOHN\x28\x00\x10\x00\x40\x00\x34\x12 1.5 \x00..");
        let mut dataset = DataSet::new(data, Endianness::Little);
        let mut insert = |tag: Tag, vr, length, data_offset| {
            dataset.insert(DataElement::new(tag, Some(vr), Length(length), data_offset));
        };
        insert(Tag(0x0020, 0x0013), VR::IS, 4, 0);
        insert(Tag(0x0010, 0x0010), VR::PN, 8, 4);
        insert(Tag(0x0028, 0x0009), VR::AT, 4, 12);
        insert(Tag(0x0028, 0x0010), VR::US, 4, 16);
        insert(Tag(0x0018, 0x0050), VR::DS, 8, 20);
        dataset
    }

    #[test]
    fn binary_getters() {
        let dataset = sample_set();
        assert_eq!(dataset.uint16(Tag(0x0028, 0x0010)), Some(0x0040));
        assert_eq!(dataset.uint16_at(Tag(0x0028, 0x0010), 1), Some(0x1234));
        assert_eq!(dataset.int16(Tag(0x0028, 0x0010)), Some(0x0040));
        assert_eq!(dataset.uint32(Tag(0x0028, 0x0010)), Some(0x1234_0040));
        assert_eq!(dataset.uint16(Tag(0x0008, 0x0000)), None);
    }

    #[test]
    fn string_getters() {
        let dataset = sample_set();
        assert_eq!(
            dataset.string(Tag(0x0010, 0x0010)),
            Some("DOE^JOHN".to_string())
        );
        assert_eq!(
            dataset.string_at(Tag(0x0020, 0x0013), 0),
            Some("12".to_string())
        );
        assert_eq!(
            dataset.string_at(Tag(0x0020, 0x0013), 1),
            Some("7".to_string())
        );
        assert_eq!(dataset.string_at(Tag(0x0020, 0x0013), 2), None);
        assert_eq!(dataset.num_string_values(Tag(0x0020, 0x0013)), Some(2));
        // value " 1.5 \0.." cuts at the NUL, trims both sides
        assert_eq!(dataset.string(Tag(0x0018, 0x0050)), Some("1.5".to_string()));
        // text trims the trailing space but keeps the leading one
        assert_eq!(dataset.text(Tag(0x0018, 0x0050)), Some(" 1.5".to_string()));
    }

    #[test]
    fn numeric_string_getters() {
        let dataset = sample_set();
        assert_eq!(dataset.float_string(Tag(0x0018, 0x0050), 0), Some(1.5));
        assert_eq!(dataset.int_string(Tag(0x0020, 0x0013), 0), Some(12));
        assert_eq!(dataset.int_string(Tag(0x0020, 0x0013), 1), Some(7));
    }

    #[test]
    fn float_getters() {
        // 1.0_f32 followed by 1.0_f64, little endian
        let data = Bytes::from_static(&[
            0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F,
        ]);
        let mut dataset = DataSet::new(data, Endianness::Little);
        dataset.insert(DataElement::new(
            Tag(0x0018, 0x605A),
            Some(VR::FL),
            Length(4),
            0,
        ));
        dataset.insert(DataElement::new(
            Tag(0x0018, 0x1130),
            Some(VR::FD),
            Length(8),
            4,
        ));
        assert_eq!(dataset.float32(Tag(0x0018, 0x605A)), Some(1.0));
        assert_eq!(dataset.float64(Tag(0x0018, 0x1130)), Some(1.0));
        // an out-of-bounds index reads nothing
        assert_eq!(dataset.float64_at(Tag(0x0018, 0x1130), 1), None);
    }

    #[test]
    fn raw_element_data() {
        let dataset = sample_set();
        assert_eq!(
            dataset.element_data(Tag(0x0010, 0x0010)),
            Some(&b"DOE^JOHN"[..])
        );
        assert_eq!(dataset.element_data(Tag(0x0008, 0x0000)), None);
    }

    #[test]
    fn text_values_split_like_string_values() {
        let dataset = sample_set();
        assert_eq!(
            dataset.text_at(Tag(0x0020, 0x0013), 1),
            Some("7".to_string())
        );
    }

    #[test]
    fn attribute_tag_getter() {
        let dataset = sample_set();
        assert_eq!(
            dataset.attribute_tag(Tag(0x0028, 0x0009)),
            Some(Tag(0x0028, 0x0010))
        );
        // wrong length yields nothing
        assert_eq!(dataset.attribute_tag(Tag(0x0010, 0x0010)), None);
    }

    #[test]
    fn meta_elements_keep_their_byte_order() {
        // one u16 at offset 0, in a big endian data set,
        // with a little endian override on the element
        let mut dataset = DataSet::new(Bytes::from_static(&[0x10, 0x00]), Endianness::Big);
        let mut element = DataElement::new(
            Tag(0x0002, 0x0000),
            Some(VR::US),
            Length(2),
            0,
        );
        element.endianness = Some(Endianness::Little);
        dataset.insert(element);
        assert_eq!(dataset.uint16(Tag(0x0002, 0x0000)), Some(0x0010));
    }

    #[test]
    fn equality_ignores_warnings() {
        let mut a = sample_set();
        let b = sample_set();
        a.extend_warnings(["something odd".to_string()]);
        assert_eq!(a, b);
    }
}
