//! Reading sheets and cells back out of a workbook without extracting it

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{PatchError, PatchResult};
use crate::shared_strings::{decode_excel_escapes, SharedStrings, SHARED_STRINGS_PART};
use crate::workbook::{Manifest, SheetLookup, WORKBOOK_PART, WORKBOOK_RELS_PART};

/// A cell as stored in the worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRecord {
    /// Reference from the `r` attribute, e.g. `J7`
    pub reference: String,
    /// The `t` attribute, if any
    pub cell_type: Option<String>,
    /// Cell text: shared strings and inline strings are resolved
    pub value: Option<String>,
}

/// Read the manifest of the workbook at `path`
pub fn read_manifest<P: AsRef<Path>>(path: P) -> PatchResult<Manifest> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    manifest_from_archive(&mut archive)
}

/// Read every cell of the sheet named `sheet`, in document order
pub fn read_sheet_cells<P: AsRef<Path>>(
    path: P,
    sheet: &str,
    lookup: SheetLookup,
) -> PatchResult<Vec<CellRecord>> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    let manifest = manifest_from_archive(&mut archive)?;
    let part = manifest.locate(sheet, lookup)?;

    let shared_strings = match read_member(&mut archive, SHARED_STRINGS_PART)? {
        Some(bytes) => SharedStrings::parse(bytes.as_slice())?,
        None => SharedStrings::default(),
    };
    let xml = read_member(&mut archive, &part)?.ok_or(PatchError::MissingPart(part))?;

    parse_sheet_cells(&xml, &shared_strings)
}

/// Parse the cells of a worksheet document
pub fn parse_sheet_cells(xml: &[u8], shared_strings: &SharedStrings) -> PatchResult<Vec<CellRecord>> {
    let mut reader = Reader::from_reader(xml);
    let mut cells = Vec::new();

    let mut current: Option<CellRecord> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => current = Some(cell_from_attributes(&e)?),
                b"v" => in_value = true,
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_inline_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                cells.push(cell_from_attributes(&e)?);
            }
            Event::Text(e) if in_value || in_inline_text => {
                if let Some(cell) = current.as_mut() {
                    cell.value
                        .get_or_insert_with(String::new)
                        .push_str(&e.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"c" => {
                    if let Some(mut cell) = current.take() {
                        resolve_text(&mut cell, shared_strings)?;
                        cells.push(cell);
                    }
                }
                b"v" => in_value = false,
                b"rPh" => in_phonetic = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(cells)
}

fn cell_from_attributes(start: &quick_xml::events::BytesStart<'_>) -> PatchResult<CellRecord> {
    let mut reference = String::new();
    let mut cell_type = None;

    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"r" => reference = attr.unescape_value()?.into_owned(),
            b"t" => cell_type = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }

    Ok(CellRecord {
        reference,
        cell_type,
        value: None,
    })
}

/// Replace shared string indexes with their text and decode `_xHHHH_`
/// escapes in string cells
fn resolve_text(cell: &mut CellRecord, shared_strings: &SharedStrings) -> PatchResult<()> {
    match cell.cell_type.as_deref() {
        Some("s") => resolve_shared_string(cell, shared_strings),
        Some("str") | Some("inlineStr") => {
            if let Some(value) = cell.value.as_mut() {
                *value = decode_excel_escapes(value.as_str());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn resolve_shared_string(cell: &mut CellRecord, shared_strings: &SharedStrings) -> PatchResult<()> {
    if let Some(index) = cell.value.as_deref() {
        let index: usize = index.trim().parse().map_err(|_| {
            PatchError::Parse(format!("shared string index {:?} in {}", index, cell.reference))
        })?;
        let text = shared_strings.get(index).ok_or_else(|| {
            PatchError::Parse(format!(
                "shared string {} out of range in {}",
                index, cell.reference
            ))
        })?;
        cell.value = Some(text.to_string());
    }
    Ok(())
}

fn manifest_from_archive<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> PatchResult<Manifest> {
    let workbook = read_member(archive, WORKBOOK_PART)?
        .ok_or_else(|| PatchError::MissingPart(WORKBOOK_PART.into()))?;
    let rels = read_member(archive, WORKBOOK_RELS_PART)?;
    Manifest::parse(workbook.as_slice(), rels.as_deref())
}

fn read_member<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> PatchResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(reference: &str, cell_type: Option<&str>, value: Option<&str>) -> CellRecord {
        CellRecord {
            reference: reference.into(),
            cell_type: cell_type.map(String::from),
            value: value.map(String::from),
        }
    }

    #[test]
    fn test_parse_sheet_cells() {
        let shared = SharedStrings::parse(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Area</t></si><si><t>Value</t></si></sst>"#
                .as_bytes(),
        )
        .unwrap();
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
    <row r="2"><c r="A2" t="inlineStr"><is><t>Pune &amp; Goa</t></is></c><c r="B2"><v>12.5</v></c><c r="C2" s="3"/></row>
    <row r="3"><c r="A3" t="str"><f>A2</f><v>Pune &amp; Goa</v></c></row>
  </sheetData>
</worksheet>"#;

        let cells = parse_sheet_cells(xml.as_bytes(), &shared).unwrap();
        assert_eq!(
            cells,
            vec![
                cell("A1", Some("s"), Some("Area")),
                cell("B1", Some("s"), Some("Value")),
                cell("A2", Some("inlineStr"), Some("Pune & Goa")),
                cell("B2", None, Some("12.5")),
                cell("C2", None, None),
                cell("A3", Some("str"), Some("Pune & Goa")),
            ]
        );
    }

    #[test]
    fn test_string_cells_decode_escapes() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2" t="str"><v>a_x0001_b</v></c><c r="B2" t="inlineStr"><is><t>line_x000a_two</t></is></c><c r="C2"><v>_x0001_</v></c></row></sheetData></worksheet>"#;

        let cells = parse_sheet_cells(xml.as_bytes(), &SharedStrings::default()).unwrap();
        assert_eq!(cells[0].value.as_deref(), Some("a\u{1}b"));
        assert_eq!(cells[1].value.as_deref(), Some("line\ntwo"));
        // Only string cells are decoded
        assert_eq!(cells[2].value.as_deref(), Some("_x0001_"));
    }

    #[test]
    fn test_shared_string_out_of_range() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>4</v></c></row></sheetData></worksheet>"#;
        let result = parse_sheet_cells(xml.as_bytes(), &SharedStrings::default());
        assert!(matches!(result, Err(PatchError::Parse(_))));
    }
}
