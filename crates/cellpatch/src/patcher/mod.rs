//! Worksheet cell patcher
//!
//! The worksheet is streamed with quick-xml and copied through unchanged,
//! except for the rows that receive a record. Those rows are buffered, their
//! cells located or created, and written back out.
//!
//! ```text
//! <row r="2">                         <row r="2">
//!   <c r="A2" s="1"><v>7</v></c>   =>   <c r="A2" s="1"><v>7</v></c>
//! </row>                                <c r="J2" t="str"><v>Mumbai</v></c>
//!                                     </row>
//! ```

mod row;

use std::slice;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::address::MAX_ROWS;
use crate::error::{PatchError, PatchResult};
use crate::value::Record;

use row::RowPatch;

/// Result of patching one worksheet document
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// The rewritten worksheet XML (UTF-8, with an XML declaration)
    pub xml: Vec<u8>,
    /// Row numbers that received a record, in document order
    pub updated_rows: Vec<u32>,
}

impl PatchOutcome {
    /// Number of rows that received a record
    pub fn rows_updated(&self) -> usize {
        self.updated_rows.len()
    }
}

/// Write `records` into successive rows of a worksheet document.
///
/// Rows are visited in document order. With `skip_header`, row 1 is copied
/// through without consuming a record. Processing stops when either the rows
/// or the records run out; leftover records are dropped and leftover rows are
/// left untouched.
///
/// For every column/value pair of a record the cell `<COLUMN><row>` is
/// located, or created in column order, its `t` attribute is set to `n` for
/// numbers and `str` otherwise, and its `<v>` child is set to the value text.
pub fn patch_worksheet(
    xml: &[u8],
    records: &[Record],
    skip_header: bool,
) -> PatchResult<PatchOutcome> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut feed = RecordFeed::new(records, skip_header);

    let mut in_sheet_data = false;
    let mut last_row = 0u32;
    let mut updated_rows = Vec::new();
    let mut first_event = true;

    loop {
        let event = reader.read_event()?;

        if first_event {
            first_event = false;
            if !matches!(event, Event::Decl(_)) {
                let decl = BytesDecl::new("1.0", Some("UTF-8"), Some("yes"));
                writer.write_event(Event::Decl(decl))?;
            }
        }

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = false;
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                last_row = row_number(&e, last_row)?;
                match feed.next_for(last_row) {
                    Some(record) => {
                        let mut row = RowPatch::read(&mut reader, e)?;
                        row.apply(record, last_row)?;
                        row.write(&mut writer)?;
                        log::info!("updated row {}", last_row);
                        updated_rows.push(last_row);
                    }
                    None => writer.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                last_row = row_number(&e, last_row)?;
                match feed.next_for(last_row) {
                    Some(record) => {
                        let mut row = RowPatch::empty(e);
                        row.apply(record, last_row)?;
                        row.write(&mut writer)?;
                        log::info!("updated row {}", last_row);
                        updated_rows.push(last_row);
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    let dropped = feed.remaining();
    if dropped > 0 {
        log::debug!("{} record(s) left over after the last row", dropped);
    }

    Ok(PatchOutcome {
        xml: writer.into_inner(),
        updated_rows,
    })
}

/// Hands out records to data rows until it runs dry
struct RecordFeed<'r> {
    records: slice::Iter<'r, Record>,
    skip_header: bool,
    exhausted: bool,
}

impl<'r> RecordFeed<'r> {
    fn new(records: &'r [Record], skip_header: bool) -> Self {
        Self {
            records: records.iter(),
            skip_header,
            exhausted: false,
        }
    }

    /// The record for row `row`, or `None` if the row is the skipped header or
    /// the records are used up
    fn next_for(&mut self, row: u32) -> Option<&'r Record> {
        if self.exhausted || (self.skip_header && row == 1) {
            return None;
        }
        let record = self.records.next();
        if record.is_none() {
            log::debug!("records exhausted at row {}", row);
            self.exhausted = true;
        }
        record
    }

    fn remaining(&self) -> usize {
        self.records.len()
    }
}

/// Row number from the `r` attribute; rows without one follow the previous row.
///
/// Numbers outside `1..=MAX_ROWS` are rejected.
fn row_number(start: &BytesStart<'_>, previous: u32) -> PatchResult<u32> {
    match start.try_get_attribute("r")? {
        Some(attr) => {
            let value = attr.unescape_value()?;
            value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0 && n <= MAX_ROWS)
                .ok_or_else(|| PatchError::Parse(format!("invalid row number {:?}", value)))
        }
        None => previous
            .checked_add(1)
            .filter(|&n| n <= MAX_ROWS)
            .ok_or_else(|| PatchError::Parse(format!("no row follows row {}", previous))),
    }
}
