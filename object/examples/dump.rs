//! Dump the element index of a DICOM P10 file to standard output.
use dicomdex_core::dataset::{DataSet, ElementValue};
use dicomdex_object::{parse, ParseOptions};

use std::io::{stdout, Write};

type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> DynResult<()> {
    let filename = ::std::env::args()
        .nth(1)
        .expect("Missing path to DICOM file");

    let buffer = std::fs::read(filename)?;
    let dataset = parse(buffer, &ParseOptions::default())?;
    let mut to = stdout();

    dump(&mut to, &dataset, 0)?;

    for warning in dataset.warnings() {
        writeln!(to, "W: {}", warning)?;
    }

    Ok(())
}

fn dump<W>(to: &mut W, dataset: &DataSet, depth: usize) -> DynResult<()>
where
    W: ?Sized + Write,
{
    for (tag, element) in dataset.elements() {
        let indent = "  ".repeat(depth);
        let vr = element.vr.map(|vr| vr.to_string()).unwrap_or("??");
        match &element.value {
            ElementValue::Sequence(items) => {
                writeln!(
                    to,
                    "{}{} {} SQ of {} items, {} bytes at {}",
                    indent,
                    tag,
                    vr,
                    items.len(),
                    element.length,
                    element.data_offset
                )?;
                for item in items {
                    dump(&mut *to, &item.dataset, depth + 1)?;
                }
            }
            ElementValue::PixelSequence {
                offset_table,
                fragments,
            } => {
                writeln!(
                    to,
                    "{}{} {} encapsulated, {} frame offsets, {} fragments",
                    indent,
                    tag,
                    vr,
                    offset_table.len(),
                    fragments.len()
                )?;
                for fragment in fragments {
                    writeln!(
                        to,
                        "{}  fragment of {} bytes at {}",
                        indent, fragment.length, fragment.position
                    )?;
                }
            }
            ElementValue::Primitive => {
                writeln!(
                    to,
                    "{}{} {} {} bytes at {}",
                    indent, tag, vr, element.length, element.data_offset
                )?;
            }
        }
    }

    Ok(())
}
