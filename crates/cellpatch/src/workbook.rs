//! Sheet lookup through the workbook manifest

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{PatchError, PatchResult};

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// How a sheet's display name is mapped to its worksheet part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetLookup {
    /// Follow the sheet's `r:id` through `xl/_rels/workbook.xml.rels`,
    /// falling back to [`SheetLookup::Positional`] when it cannot be resolved
    #[default]
    Relationships,
    /// The Nth declared sheet lives in `xl/worksheets/sheet<N>.xml`.
    ///
    /// Only correct for workbooks whose sheets were never deleted or reordered.
    Positional,
}

/// A sheet declared in `xl/workbook.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Display name of the tab
    pub name: String,
    /// `sheetId` attribute
    pub sheet_id: Option<u32>,
    /// Relationship id (`r:id`)
    pub r_id: Option<String>,
}

/// The sheets a workbook declares, with the relationship targets needed to
/// find their parts
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    sheets: Vec<SheetEntry>,
    targets: Option<HashMap<String, String>>,
}

impl Manifest {
    /// Build a manifest from `xl/workbook.xml` and, when the archive has one,
    /// `xl/_rels/workbook.xml.rels`
    pub fn parse<R: BufRead, S: BufRead>(workbook: R, rels: Option<S>) -> PatchResult<Self> {
        let sheets = read_workbook_xml(workbook)?;
        let targets = rels.map(read_workbook_rels).transpose()?;
        Ok(Self { sheets, targets })
    }

    /// Declared sheets in document order
    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    /// Declared sheet names in document order
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Find the worksheet part (archive path) for the sheet named `name`.
    ///
    /// Names match exactly: case-sensitive, no trimming.
    pub fn locate(&self, name: &str, lookup: SheetLookup) -> PatchResult<String> {
        let (index, sheet) = self
            .sheets
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == name)
            .ok_or_else(|| PatchError::SheetNotFound(name.to_string()))?;
        let positional = format!("xl/worksheets/sheet{}.xml", index + 1);

        if lookup == SheetLookup::Positional {
            return Ok(positional);
        }

        let target = match (&self.targets, &sheet.r_id) {
            (Some(targets), Some(r_id)) => targets.get(r_id),
            _ => None,
        };
        match target {
            Some(path) => Ok(path.clone()),
            None => {
                log::warn!(
                    "no worksheet relationship for sheet {:?}, assuming {}",
                    name,
                    positional
                );
                Ok(positional)
            }
        }
    }
}

/// Read workbook.xml to get sheet names and rIds
fn read_workbook_xml<R: BufRead>(reader: R) -> PatchResult<Vec<SheetEntry>> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut sheet_id = None;
                let mut r_id = None;

                for attr in e.attributes() {
                    let attr = attr?;
                    let key = attr.key;
                    match key.local_name().as_ref() {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        b"sheetId" => sheet_id = attr.unescape_value()?.parse().ok(),
                        // r:id, whatever prefix the relationships namespace is bound to
                        b"id" if key.prefix().is_some() => {
                            r_id = Some(attr.unescape_value()?.into_owned())
                        }
                        _ => {}
                    }
                }

                let name = name.ok_or_else(|| {
                    PatchError::InvalidFormat("<sheet> without a name attribute".into())
                })?;
                sheets.push(SheetEntry {
                    name,
                    sheet_id,
                    r_id,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Read workbook.xml.rels to get worksheet part paths keyed by relationship id
fn read_workbook_rels<R: BufRead>(reader: R) -> PatchResult<HashMap<String, String>> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;

                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        b"Type" => rel_type = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }

                // Only include worksheet relationships
                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        rels.insert(id, resolve_target(&target));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Targets are relative to `xl/` unless they start with `/`
fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
