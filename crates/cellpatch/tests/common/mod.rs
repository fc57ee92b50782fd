//! Fixture workbooks for integration tests.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

pub const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

pub const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="5"><si><t>Id</t></si><si><t>Area</t></si><si><t>Parent</t></si><si><t>State</t></si><si><t>National</t></si></sst>"#;

/// The "Data Sheet" worksheet: a header row and three data rows
pub const DATA_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:M4"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="J1" t="s"><v>1</v></c><c r="K1" t="s"><v>2</v></c><c r="L1" t="s"><v>3</v></c><c r="M1" t="s"><v>4</v></c></row><row r="2"><c r="A2"><v>1</v></c><c r="M2"><v>10</v></c></row><row r="3"><c r="A3"><v>2</v></c><c r="M3"><v>20</v></c></row><row r="4"><c r="A4"><v>3</v></c><c r="M4"><v>30</v></c></row></sheetData></worksheet>"#;

pub const SUMMARY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Summary</t></is></c></row></sheetData></worksheet>"#;

/// A sheet declared in the fixture workbook
pub struct FixtureSheet<'a> {
    pub name: &'a str,
    /// Part number: the sheet lives in `xl/worksheets/sheet<part>.xml`
    pub part: usize,
    pub xml: &'a str,
}

/// Write an XLSX archive with the given sheets, declared in order.
///
/// Sheets are linked through `xl/_rels/workbook.xml.rels` when `with_rels` is
/// set.
pub fn write_workbook(path: &Path, sheets: &[FixtureSheet<'_>], with_rels: bool) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            sheet.name,
            sheet.part,
            i + 1
        ));
    }
    workbook.push_str("</sheets></workbook>");

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(ROOT_RELS.as_bytes()).unwrap();
    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();

    if with_rels {
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, sheet) in sheets.iter().enumerate() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                sheet.part
            ));
        }
        rels.push_str("</Relationships>");
        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
    }

    for sheet in sheets {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", sheet.part), options)
            .unwrap();
        zip.write_all(sheet.xml.as_bytes()).unwrap();
    }

    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    zip.write_all(SHARED_STRINGS.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// The standard fixture: "Summary" then "Data Sheet"
pub fn write_standard_workbook(path: &Path) {
    write_workbook(
        path,
        &[
            FixtureSheet {
                name: "Summary",
                part: 1,
                xml: SUMMARY_SHEET,
            },
            FixtureSheet {
                name: "Data Sheet",
                part: 2,
                xml: DATA_SHEET,
            },
        ],
        true,
    );
}

/// Read one archive member as bytes
pub fn read_member(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Names of all archive members, in archive order
pub fn member_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}
