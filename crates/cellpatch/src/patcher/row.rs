//! A buffered `<row>` element and the cells inside it

use std::borrow::Cow;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::address::{letters_to_column, CellRef};
use crate::error::{PatchError, PatchResult};
use crate::shared_strings::encode_excel_escapes;
use crate::value::{CellValue, Record};

/// Direct child of a row
#[derive(Debug)]
enum RowChild<'a> {
    Cell(CellNode<'a>),
    /// Anything else (whitespace, comments, `<extLst>` events), kept verbatim
    Other(Event<'a>),
}

/// A `<row>` whose children have been read into memory
#[derive(Debug)]
pub(super) struct RowPatch<'a> {
    start: BytesStart<'a>,
    children: Vec<RowChild<'a>>,
    /// Namespace prefix including the colon, e.g. `x:`, or empty
    prefix: String,
}

impl<'a> RowPatch<'a> {
    /// Read the children of a row whose start tag was just consumed, up to
    /// and including its end tag
    pub(super) fn read(reader: &mut Reader<&'a [u8]>, start: BytesStart<'a>) -> PatchResult<Self> {
        let mut children = Vec::new();
        let mut depth = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(e) if depth == 0 && e.local_name().as_ref() == b"c" => {
                    children.push(RowChild::Cell(CellNode::read(reader, e)?));
                }
                Event::Empty(e) if depth == 0 && e.local_name().as_ref() == b"c" => {
                    children.push(RowChild::Cell(CellNode::empty(e)));
                }
                Event::Start(e) => {
                    depth += 1;
                    children.push(RowChild::Other(Event::Start(e)));
                }
                Event::End(_) if depth == 0 => break,
                Event::End(e) => {
                    depth -= 1;
                    children.push(RowChild::Other(Event::End(e)));
                }
                Event::Eof => {
                    return Err(PatchError::InvalidFormat("unterminated <row> element".into()))
                }
                other => children.push(RowChild::Other(other)),
            }
        }

        Ok(Self::with_children(start, children))
    }

    /// A row written as `<row .../>`
    pub(super) fn empty(start: BytesStart<'a>) -> Self {
        Self::with_children(start, Vec::new())
    }

    fn with_children(start: BytesStart<'a>, children: Vec<RowChild<'a>>) -> Self {
        let prefix = match start.name().prefix() {
            Some(prefix) => format!("{}:", String::from_utf8_lossy(prefix.as_ref())),
            None => String::new(),
        };
        Self {
            start,
            children,
            prefix,
        }
    }

    /// Write every column/value pair of `record` into this row
    pub(super) fn apply(&mut self, record: &Record, row: u32) -> PatchResult<()> {
        for (column, value) in record {
            let reference = CellRef::new(row, letters_to_column(column)?);
            let index = match self.find_cell(reference) {
                Some(index) => index,
                None => self.insert_cell(reference),
            };
            if let RowChild::Cell(cell) = &mut self.children[index] {
                cell.set_value(value, &self.prefix)?;
            }
        }
        Ok(())
    }

    fn find_cell(&self, reference: CellRef) -> Option<usize> {
        self.children.iter().position(|child| match child {
            RowChild::Cell(cell) => cell.reference() == Some(reference),
            RowChild::Other(_) => false,
        })
    }

    /// Insert an empty cell for `reference`, keeping addressed cells in column
    /// order, and return its index
    fn insert_cell(&mut self, reference: CellRef) -> usize {
        let mut after_last_cell = None;
        let mut first_element = None;
        let mut position = None;

        for (index, child) in self.children.iter().enumerate() {
            match child {
                RowChild::Cell(cell) => {
                    if let Some(existing) = cell.reference() {
                        if existing.col > reference.col {
                            position = Some(index);
                            break;
                        }
                    }
                    after_last_cell = Some(index + 1);
                }
                RowChild::Other(Event::Start(_) | Event::Empty(_)) if first_element.is_none() => {
                    first_element = Some(index);
                }
                RowChild::Other(_) => {}
            }
        }

        let index = position
            .or(after_last_cell)
            .or(first_element)
            .unwrap_or(self.children.len());
        let cell = CellNode::new(&self.prefix, reference);
        self.children.insert(index, RowChild::Cell(cell));
        index
    }

    pub(super) fn write<W: Write>(&self, writer: &mut Writer<W>) -> PatchResult<()> {
        if self.children.is_empty() {
            writer.write_event(Event::Empty(self.start.borrow()))?;
            return Ok(());
        }

        writer.write_event(Event::Start(self.start.borrow()))?;
        for child in &self.children {
            match child {
                RowChild::Cell(cell) => cell.write(writer)?,
                RowChild::Other(event) => writer.write_event(event)?,
            }
        }
        writer.write_event(Event::End(self.start.to_end()))?;
        Ok(())
    }
}

/// A `<c>` element
#[derive(Debug)]
struct CellNode<'a> {
    start: BytesStart<'a>,
    /// Events between `<c>` and `</c>`
    inner: Vec<Event<'a>>,
    self_closing: bool,
}

impl<'a> CellNode<'a> {
    fn read(reader: &mut Reader<&'a [u8]>, start: BytesStart<'a>) -> PatchResult<Self> {
        let mut inner = Vec::new();
        let mut depth = 0usize;

        loop {
            match reader.read_event()? {
                Event::End(_) if depth == 0 => break,
                Event::Start(e) => {
                    depth += 1;
                    inner.push(Event::Start(e));
                }
                Event::End(e) => {
                    depth -= 1;
                    inner.push(Event::End(e));
                }
                Event::Eof => {
                    return Err(PatchError::InvalidFormat("unterminated <c> element".into()))
                }
                other => inner.push(other),
            }
        }

        Ok(Self {
            start,
            inner,
            self_closing: false,
        })
    }

    fn empty(start: BytesStart<'a>) -> Self {
        Self {
            start,
            inner: Vec::new(),
            self_closing: true,
        }
    }

    fn new(prefix: &str, reference: CellRef) -> Self {
        let mut start = BytesStart::new(format!("{}c", prefix));
        start.push_attribute(("r", reference.to_string().as_str()));
        Self::empty(start)
    }

    fn reference(&self) -> Option<CellRef> {
        let attr = self.start.try_get_attribute("r").ok()??;
        CellRef::parse(&attr.unescape_value().ok()?)
    }

    /// Set `t` and `<v>` for `value`; a stale inline string `<is>` is dropped
    fn set_value(&mut self, value: &CellValue, prefix: &str) -> PatchResult<()> {
        self.set_type(value.cell_type())?;

        for span in element_spans(&self.inner).into_iter().rev() {
            if span.name == b"is" {
                self.inner.drain(span.first..=span.last);
            }
        }

        let raw = value.to_string();
        let text = Event::Text(BytesText::new(&encode_excel_escapes(&raw)).into_owned());
        let spans = element_spans(&self.inner);

        match spans.iter().find(|span| span.name == b"v") {
            Some(span) if span.first == span.last => {
                // <v/>
                let name = qualified(prefix, "v");
                let replacement = [
                    Event::Start(BytesStart::new(name.clone())),
                    text,
                    Event::End(BytesEnd::new(name)),
                ];
                self.inner.splice(span.first..=span.last, replacement);
            }
            Some(span) => {
                self.inner.splice(span.first + 1..span.last, [text]);
            }
            None => {
                // CT_Cell children are ordered f, v, is, extLst
                let index = spans
                    .iter()
                    .find(|span| span.name != b"f")
                    .map(|span| span.first)
                    .unwrap_or(self.inner.len());
                let name = qualified(prefix, "v");
                let created = [
                    Event::Start(BytesStart::new(name.clone())),
                    text,
                    Event::End(BytesEnd::new(name)),
                ];
                self.inner.splice(index..index, created);
            }
        }

        self.self_closing = false;
        Ok(())
    }

    /// Replace the `t` attribute, keeping every other attribute as written
    fn set_type(&mut self, cell_type: &str) -> PatchResult<()> {
        let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut replaced = false;

        for attr in self.start.attributes() {
            let attr = attr?;
            let key = attr.key.as_ref().to_vec();
            if key == b"t" {
                attrs.push((key, cell_type.as_bytes().to_vec()));
                replaced = true;
            } else {
                attrs.push((key, attr.value.into_owned()));
            }
        }
        if !replaced {
            attrs.push((b"t".to_vec(), cell_type.as_bytes().to_vec()));
        }

        self.start.clear_attributes();
        for (key, value) in &attrs {
            // raw bytes: values are already escaped
            self.start.push_attribute((key.as_slice(), value.as_slice()));
        }
        Ok(())
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> PatchResult<()> {
        if self.self_closing && self.inner.is_empty() {
            writer.write_event(Event::Empty(self.start.borrow()))?;
            return Ok(());
        }

        writer.write_event(Event::Start(self.start.borrow()))?;
        for event in &self.inner {
            writer.write_event(event)?;
        }
        writer.write_event(Event::End(self.start.to_end()))?;
        Ok(())
    }
}

/// Location of a top-level element inside a buffered event list
#[derive(Debug)]
struct ElementSpan {
    name: Vec<u8>,
    first: usize,
    /// Index of the end event (equal to `first` for empty elements)
    last: usize,
}

fn element_spans(events: &[Event<'_>]) -> Vec<ElementSpan> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<(Vec<u8>, usize)> = None;

    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Empty(e) if depth == 0 => spans.push(ElementSpan {
                name: e.local_name().as_ref().to_vec(),
                first: index,
                last: index,
            }),
            Event::Start(e) => {
                if depth == 0 {
                    open = Some((e.local_name().as_ref().to_vec(), index));
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some((name, first)) = open.take() {
                        spans.push(ElementSpan {
                            name,
                            first,
                            last: index,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

fn qualified(prefix: &str, local: &str) -> Cow<'static, str> {
    Cow::Owned(format!("{}{}", prefix, local))
}
