//! The `update` operation: extract, locate, patch, repack

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::archive::ExtractedArchive;
use crate::error::{PatchError, PatchResult};
use crate::patcher::patch_worksheet;
use crate::shared_strings::{SharedStrings, SHARED_STRINGS_PART};
use crate::value::Record;
use crate::workbook::{Manifest, SheetLookup, WORKBOOK_PART, WORKBOOK_RELS_PART};

/// Options for [`update_with_options`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Never treat row 1 as a data row (default: true)
    pub skip_header: bool,
    /// How the sheet name is mapped to a worksheet part
    pub sheet_lookup: SheetLookup,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            skip_header: true,
            sheet_lookup: SheetLookup::default(),
        }
    }
}

/// What an update changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Number of rows that received a record
    pub rows_updated: usize,
    /// Those rows' numbers, in document order
    pub updated_rows: Vec<u32>,
    /// Archive path of the patched worksheet
    pub sheet_part: String,
}

/// Write `records` into successive rows of the sheet named `sheet_name` and
/// save the result to `output`.
///
/// Returns the number of rows updated: the smaller of the number of data rows
/// and the number of records.
///
/// ```no_run
/// use cellpatch::{update, CellValue, Record};
///
/// let mut record = Record::new();
/// record.insert("J".into(), CellValue::text("Mumbai"));
/// record.insert("L".into(), CellValue::from(76.5));
///
/// let rows = update("test.xlsx", "updated.xlsx", &[record], "Data Sheet", true)?;
/// assert_eq!(rows, 1);
/// # Ok::<(), cellpatch::PatchError>(())
/// ```
pub fn update<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    records: &[Record],
    sheet_name: &str,
    skip_header: bool,
) -> PatchResult<usize> {
    let options = UpdateOptions {
        skip_header,
        ..UpdateOptions::default()
    };
    update_with_options(input, output, records, sheet_name, &options).map(|r| r.rows_updated)
}

/// [`update`] with explicit options and a detailed report.
///
/// Nothing is written to `output` unless every step succeeds. The scratch
/// directory is removed on return, success or failure.
pub fn update_with_options<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    records: &[Record],
    sheet_name: &str,
    options: &UpdateOptions,
) -> PatchResult<UpdateReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    let archive = ExtractedArchive::extract(input)?;

    if !archive.contains(WORKBOOK_PART) {
        return Err(PatchError::MissingPart(WORKBOOK_PART.into()));
    }
    let workbook = BufReader::new(File::open(archive.part_path(WORKBOOK_PART))?);
    let rels = if archive.contains(WORKBOOK_RELS_PART) {
        Some(BufReader::new(File::open(archive.part_path(WORKBOOK_RELS_PART))?))
    } else {
        None
    };
    let manifest = Manifest::parse(workbook, rels)?;

    let sheet_part = manifest.locate(sheet_name, options.sheet_lookup)?;
    if !archive.contains(&sheet_part) {
        return Err(PatchError::MissingPart(sheet_part));
    }
    log::debug!("sheet {:?} is {}", sheet_name, sheet_part);

    if archive.contains(SHARED_STRINGS_PART) {
        let file = BufReader::new(File::open(archive.part_path(SHARED_STRINGS_PART))?);
        let shared_strings = SharedStrings::parse(file)?;
        log::debug!("{} shared strings", shared_strings.len());
    }

    let xml = archive.read_part(&sheet_part)?;
    let outcome = patch_worksheet(&xml, records, options.skip_header)?;
    archive.write_part(&sheet_part, &outcome.xml)?;

    archive.repack(output)?;
    log::info!(
        "updated {} row(s) of {:?}, saved to {}",
        outcome.rows_updated(),
        sheet_name,
        output.display()
    );

    Ok(UpdateReport {
        rows_updated: outcome.rows_updated(),
        updated_rows: outcome.updated_rows,
        sheet_part,
    })
}
