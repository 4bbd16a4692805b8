//! This module contains the data set walker:
//! it drives the element reader across a byte range
//! and accumulates the element map of a data set.

use crate::element;
use crate::error::{DeepSequenceSnafu, Result};
use crate::stream::ByteStream;
use dicomdex_core::dataset::DataSet;
use dicomdex_core::{Tag, VR};

/// Maximum supported sequence nesting depth.
///
/// Inputs with deeper nesting are rejected so that a hand-crafted file
/// cannot exhaust the call stack.
pub const MAX_SEQUENCE_DEPTH: u32 = 64;

/// Whether element headers carry an explicit value representation.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum VrMode {
    /// Element headers carry a two-letter VR
    /// and a VR-dependent length field.
    #[default]
    Explicit,
    /// Element headers carry no VR and a plain 32-bit length field.
    Implicit,
}

/// An optional lookup from attribute tags to value representations,
/// consulted for elements of implicit VR data sets.
pub type VrIndex = fn(Tag) -> Option<VR>;

/// The state shared by one data set traversal:
/// the VR mode and options are fixed when the walk starts,
/// while the nesting depth grows with each sequence item.
#[derive(Debug, Default, Copy, Clone)]
pub struct ReadContext {
    /// element header form, selected once from the transfer syntax
    pub mode: VrMode,
    /// stop the walk right after inserting the element with this tag
    pub until_tag: Option<Tag>,
    /// optional VR lookup for implicit VR data sets
    pub vr_index: Option<VrIndex>,
    depth: u32,
}

impl ReadContext {
    /// Create a read context for the given VR mode.
    pub fn new(mode: VrMode) -> Self {
        ReadContext {
            mode,
            ..Default::default()
        }
    }

    /// Replace the boundary tag of the context.
    pub fn until_tag(mut self, until_tag: Option<Tag>) -> Self {
        self.until_tag = until_tag;
        self
    }

    /// Replace the VR lookup of the context.
    pub fn vr_index(mut self, vr_index: Option<VrIndex>) -> Self {
        self.vr_index = vr_index;
        self
    }

    /// Derive the context for a data set nested one level deeper,
    /// with its own boundary tag.
    /// Fails if the nesting limit is exceeded.
    pub(crate) fn nested(&self, until_tag: Option<Tag>) -> Result<ReadContext> {
        self.nested_with_mode(self.mode, until_tag)
    }

    /// Derive the context for a data set nested one level deeper,
    /// switching the VR mode of the nested content.
    pub(crate) fn nested_with_mode(&self, mode: VrMode, until_tag: Option<Tag>) -> Result<ReadContext> {
        let depth = self.depth + 1;
        if depth > MAX_SEQUENCE_DEPTH {
            return DeepSequenceSnafu {
                depth: MAX_SEQUENCE_DEPTH,
            }
            .fail();
        }
        Ok(ReadContext {
            mode,
            until_tag,
            vr_index: self.vr_index,
            depth,
        })
    }
}

/// Read data elements from the stream into the given data set,
/// until the cursor reaches `max_position` or the context's boundary tag
/// is inserted.
///
/// Fewer than 8 bytes left before the boundary cannot hold another
/// element header; they are reported as a warning and the walk ends
/// successfully.
pub fn read_data_set(
    stream: &mut ByteStream,
    ctx: &ReadContext,
    dataset: &mut DataSet,
    max_position: usize,
) -> Result<()> {
    while stream.position() < max_position {
        let remaining = max_position - stream.position();
        if remaining < 8 {
            stream.add_warning(format!("{} trailing bytes at end of dataset", remaining));
            return Ok(());
        }
        let element = match ctx.mode {
            VrMode::Explicit => element::read_element_explicit(stream, ctx)?,
            VrMode::Implicit => element::read_element_implicit(stream, ctx)?,
        };
        let tag = element.tag;
        dataset.insert(element);
        if ctx.until_tag == Some(tag) {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteordered::Endianness;
    use bytes::Bytes;
    use dicomdex_core::Tag;

    fn explicit_le_set(data: &'static [u8]) -> (ByteStream, DataSet) {
        let data = Bytes::from_static(data);
        let stream = ByteStream::new(data.clone(), Endianness::Little);
        let dataset = DataSet::new(data, Endianness::Little);
        (stream, dataset)
    }

    //  (0010,0010) PN, length 4, "A^B "
    //  (0010,0020) LO, length 2, "ID"
    const TWO_ELEMENTS: &[u8] = &[
        0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x04, 0x00, b'A', b'^', b'B', b' ', // PatientName
        0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x02, 0x00, b'I', b'D', // PatientID
    ];

    #[test]
    fn walks_a_full_range() {
        let (mut stream, mut dataset) = explicit_le_set(TWO_ELEMENTS);
        let ctx = ReadContext::new(VrMode::Explicit);
        read_data_set(&mut stream, &ctx, &mut dataset, TWO_ELEMENTS.len()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.string(Tag(0x0010, 0x0010)), Some("A^B".to_string()));
        assert_eq!(dataset.string(Tag(0x0010, 0x0020)), Some("ID".to_string()));
        assert!(stream.warnings().is_empty());
    }

    #[test]
    fn stops_at_the_boundary_tag() {
        let (mut stream, mut dataset) = explicit_le_set(TWO_ELEMENTS);
        let ctx = ReadContext::new(VrMode::Explicit).until_tag(Some(Tag(0x0010, 0x0010)));
        read_data_set(&mut stream, &ctx, &mut dataset, TWO_ELEMENTS.len()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.element(Tag(0x0010, 0x0020)).is_none());
    }

    #[test]
    fn warns_about_trailing_bytes() {
        //  (0010,0020) LO, length 2, then 3 stray bytes
        const TRAILING: &[u8] = &[
            0x10, 0x00, 0x20, 0x00, b'L', b'O', 0x02, 0x00, b'I', b'D', 0x00, 0x01, 0x02,
        ];
        let (mut stream, mut dataset) = explicit_le_set(TRAILING);
        let ctx = ReadContext::new(VrMode::Explicit);
        read_data_set(&mut stream, &ctx, &mut dataset, TRAILING.len()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(
            stream.warnings(),
            ["3 trailing bytes at end of dataset"]
        );
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let ctx = ReadContext::new(VrMode::Explicit);
        let mut nested = ctx;
        for _ in 0..MAX_SEQUENCE_DEPTH {
            nested = nested.nested(None).unwrap();
        }
        assert!(nested.nested(None).is_err());
    }
}
