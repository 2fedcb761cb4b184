//! Forward-only worksheet reader
//!
//! Streams `<row>` elements out of a worksheet part and binds each one to a
//! record through the read side of a class map. Only the current row is
//! materialised.

use std::io::BufRead;
use std::rc::Rc;

use ahash::AHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use sheetmap_core::row::find_header;
use sheetmap_core::{BiMap, ClassMap, ColumnCache, Error, ReaderRow, Value};

use crate::error::{XlsxError, XlsxResult};
use crate::shared_strings::SharedStringTable;
use crate::xml::{attr, decode_excel_escapes, local_name};

/// Text of the non-empty cells of one row, keyed by 1-based column
#[derive(Debug, Default)]
struct RawRow {
    index: u32,
    cells: AHashMap<u32, String>,
}

#[derive(Debug)]
enum CursorState {
    /// Positioned between rows
    BeforeRow,
    /// A row has been read ahead but not consumed
    AtRowStart(RawRow),
    Eof,
}

/// A cell whose value elements are still being read
#[derive(Debug)]
struct PendingCell {
    column: u32,
    cell_type: Option<String>,
    text: String,
    has_value: bool,
}

/// Reads records of type `T` from one worksheet
pub struct WorksheetReader<'a, T: 'static> {
    class_map: Rc<ClassMap<T>>,
    shared_strings: &'a SharedStringTable,
    xml: Reader<Box<dyn BufRead + 'a>>,
    buf: Vec<u8>,
    columns: ColumnCache,
    headers: Option<BiMap<u32, String>>,
    /// Resolved column of each read map, in `read_maps()` order
    bindings: Vec<Option<u32>>,
    state: CursorState,
    /// Number of the last consumed row
    current_row: u32,
    /// Number of the last row seen, for rows without an `r` attribute
    last_seen_row: u32,
}

impl<'a, T: Default + 'static> WorksheetReader<'a, T> {
    /// Open a cursor over the worksheet XML streamed from `part`
    ///
    /// With `header_row_index > 0` the first row at or after that index is
    /// taken as the header row; `0` reads data from the first row and every
    /// column must then be bound by index.
    pub fn new<R: BufRead + 'a>(
        part: R,
        shared_strings: &'a SharedStringTable,
        class_map: Rc<ClassMap<T>>,
        header_row_index: u32,
    ) -> XlsxResult<Self> {
        let mut xml = Reader::from_reader(Box::new(part) as Box<dyn BufRead + 'a>);
        xml.trim_text(false);

        let mut reader = Self {
            class_map,
            shared_strings,
            xml,
            buf: Vec::new(),
            columns: ColumnCache::new(),
            headers: None,
            bindings: Vec::new(),
            state: CursorState::BeforeRow,
            current_row: 0,
            last_seen_row: 0,
        };

        if header_row_index > 0 {
            reader.read_header(header_row_index)?;
        }
        reader.bindings = reader.resolve_bindings()?;
        Ok(reader)
    }

    /// Header captions by column, when a header row was read
    pub fn headers(&self) -> Option<&BiMap<u32, String>> {
        self.headers.as_ref()
    }

    /// Number of the last row consumed (header, skipped or read), `0` before any
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    /// Bind the next row, `None` at the end of the sheet
    pub fn read_row(&mut self) -> XlsxResult<Option<T>> {
        let row = match self.next_row()? {
            Some(row) => row,
            None => return Ok(None),
        };
        self.current_row = row.index;

        let mut record = T::default();
        let reader_row = ReaderRow::new(self.headers.as_ref(), &row.cells);

        for (map, column) in self.class_map.read_maps().zip(&self.bindings) {
            let Some(field) = &map.field else {
                continue;
            };

            let value = if let Some(constant) = &map.constant_read {
                Some(constant.clone())
            } else if let Some(convert) = &map.read_using {
                convert(&reader_row)?
            } else {
                let text = column
                    .and_then(|c| row.cells.get(&c))
                    .map(String::as_str)
                    .unwrap_or("");
                if text.is_empty() {
                    map.default_read.clone()
                } else {
                    Some(Value::Text(text.to_string()))
                }
            };

            field.set(&mut record, value)?;
        }

        Ok(Some(record))
    }

    /// Read every remaining row
    pub fn read_rows(&mut self) -> XlsxResult<Vec<T>> {
        self.rows().collect()
    }

    /// Iterate over the remaining rows
    pub fn rows(&mut self) -> Rows<'_, 'a, T> {
        Rows { reader: self }
    }

    /// Skip the next row
    pub fn skip_row(&mut self) -> XlsxResult<()> {
        self.skip_rows(1)
    }

    /// Advance past the next `count` row numbers
    ///
    /// Gaps count: rows absent from the sheet are skipped too. Stops quietly
    /// at the end of the sheet.
    pub fn skip_rows(&mut self, count: u32) -> XlsxResult<()> {
        let target = self.current_row.saturating_add(count);
        while let Some(row) = self.next_row()? {
            if row.index > target {
                self.state = CursorState::AtRowStart(row);
                break;
            }
            self.current_row = row.index;
        }
        self.current_row = self.current_row.max(target);
        Ok(())
    }

    fn read_header(&mut self, header_row_index: u32) -> XlsxResult<()> {
        let row = loop {
            match self.next_row()? {
                Some(row) if row.index >= header_row_index => break row,
                Some(row) => self.current_row = row.index,
                None => return Err(Error::NoRows.into()),
            }
        };
        self.current_row = row.index;

        let mut columns: Vec<_> = row.cells.into_iter().collect();
        columns.sort_by_key(|(column, _)| *column);

        let mut headers = BiMap::with_capacity(columns.len());
        for (column, caption) in columns {
            if caption.is_empty() {
                continue;
            }
            if headers.insert(column, caption.clone()).is_err() {
                log::warn!(
                    "duplicate header '{}' in column {} ignored",
                    caption,
                    column
                );
            }
        }
        self.headers = Some(headers);
        Ok(())
    }

    fn resolve_bindings(&self) -> XlsxResult<Vec<Option<u32>>> {
        let mut bindings = Vec::new();
        for map in self.class_map.read_maps() {
            let binding = if map.index_read > 0 {
                Some(map.index_read)
            } else {
                let header = map.header_read().unwrap_or("");
                let found = self
                    .headers
                    .as_ref()
                    .filter(|_| !header.is_empty())
                    .and_then(|headers| find_header(headers, header));

                if found.is_none() && map.field.is_some() && !map.is_computed_on_read() {
                    return Err(Error::UnresolvableBinding {
                        field: map.field_name().unwrap_or_default().to_string(),
                        header: header.to_string(),
                    }
                    .into());
                }
                found
            };
            bindings.push(binding);
        }
        Ok(bindings)
    }

    /// Take the read-ahead row, or parse the next one
    fn next_row(&mut self) -> XlsxResult<Option<RawRow>> {
        match std::mem::replace(&mut self.state, CursorState::BeforeRow) {
            CursorState::AtRowStart(row) => return Ok(Some(row)),
            CursorState::Eof => {
                self.state = CursorState::Eof;
                return Ok(None);
            }
            CursorState::BeforeRow => {}
        }

        match self.parse_row() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.state = CursorState::Eof;
                Ok(None)
            }
            Err(e) => {
                self.state = CursorState::Eof;
                Err(e)
            }
        }
    }

    fn parse_row(&mut self) -> XlsxResult<Option<RawRow>> {
        let (number, is_empty) = loop {
            self.buf.clear();
            match self.xml.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"row" => {
                    break (row_number(&e), false)
                }
                Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"row" => {
                    break (row_number(&e), true)
                }
                Ok(Event::End(e)) if local_name(e.name().as_ref()) == b"sheetData" => {
                    return Ok(None)
                }
                Ok(Event::Eof) => return Ok(None),
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        };

        let index = number.unwrap_or(self.last_seen_row + 1);
        self.last_seen_row = index;

        let cells = if is_empty {
            AHashMap::new()
        } else {
            self.parse_cells()?
        };
        Ok(Some(RawRow { index, cells }))
    }

    fn parse_cells(&mut self) -> XlsxResult<AHashMap<u32, String>> {
        let mut cells = AHashMap::new();
        let mut last_column = 0;
        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_phonetic = false;

        loop {
            self.buf.clear();
            match self.xml.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                    b"c" => {
                        let pending = start_cell(&mut self.columns, &e, last_column)?;
                        last_column = pending.column;
                        cell = Some(pending);
                    }
                    b"v" | b"t" => {
                        in_value = true;
                        if let Some(cell) = cell.as_mut() {
                            cell.has_value = true;
                        }
                    }
                    b"rPh" => in_phonetic = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => {
                    if local_name(e.name().as_ref()) == b"c" {
                        last_column = start_cell(&mut self.columns, &e, last_column)?.column;
                    }
                }
                Ok(Event::Text(t)) if in_value && !in_phonetic => {
                    let text = t.unescape()?;
                    if let Some(cell) = cell.as_mut() {
                        cell.text.push_str(&text);
                    }
                }
                Ok(Event::CData(c)) if in_value && !in_phonetic => {
                    if let Some(cell) = cell.as_mut() {
                        cell.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                    b"v" | b"t" => in_value = false,
                    b"rPh" => in_phonetic = false,
                    b"c" => {
                        if let Some(done) = cell.take() {
                            let column = done.column;
                            if let Some(text) = resolve_cell(self.shared_strings, done)? {
                                cells.insert(column, text);
                            }
                        }
                    }
                    b"row" => break,
                    _ => {}
                },
                Ok(Event::Eof) => {
                    return Err(XlsxError::InvalidFormat("unterminated <row> element".into()))
                }
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        }

        Ok(cells)
    }
}

fn row_number(e: &BytesStart<'_>) -> Option<u32> {
    attr(e, b"r").and_then(|r| r.trim().parse().ok())
}

fn start_cell(
    columns: &mut ColumnCache,
    e: &BytesStart<'_>,
    last_column: u32,
) -> XlsxResult<PendingCell> {
    let column = match attr(e, b"r") {
        Some(reference) => columns.column_of(&reference)?,
        None => last_column + 1,
    };
    Ok(PendingCell {
        column,
        cell_type: attr(e, b"t"),
        text: String::new(),
        has_value: false,
    })
}

/// Cell text as it should be bound; `None` for cells without a value
fn resolve_cell(shared_strings: &SharedStringTable, cell: PendingCell) -> XlsxResult<Option<String>> {
    if !cell.has_value {
        return Ok(None);
    }
    let text = match cell.cell_type.as_deref() {
        Some("s") => {
            let index: u32 = cell.text.trim().parse().map_err(|_| {
                XlsxError::InvalidFormat(format!("invalid shared string index '{}'", cell.text))
            })?;
            shared_strings
                .get(index)
                .map(str::to_string)
                .ok_or_else(|| {
                    XlsxError::InvalidFormat(format!("shared string index {} out of range", index))
                })?
        }
        Some("inlineStr") | Some("str") => decode_excel_escapes(&cell.text),
        None | Some("n") | Some("b") | Some("e") | Some("d") => cell.text,
        Some(other) => {
            log::warn!("unknown cell type '{}' read as text", other);
            cell.text
        }
    };
    Ok(Some(text))
}

/// Iterator over the remaining rows of a [`WorksheetReader`]
pub struct Rows<'r, 'a, T: 'static> {
    reader: &'r mut WorksheetReader<'a, T>,
}

impl<'r, 'a, T: Default + 'static> Iterator for Rows<'r, 'a, T> {
    type Item = XlsxResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetmap_core::{field, ClassMapper};

    #[derive(Debug, Default, PartialEq)]
    struct Line {
        name: String,
        qty: i32,
        note: Option<String>,
    }

    struct LineMap;

    impl ClassMapper for LineMap {
        type Record = Line;

        fn configure(map: &mut ClassMap<Line>) {
            map.map(field!(Line, name)).name("Name");
            map.map(field!(Line, qty)).name("Quantity").default(1);
            map.map(field!(Line, note)).index(4);
        }
    }

    fn strings() -> SharedStringTable {
        let mut table = SharedStringTable::new();
        table.intern("Name");
        table.intern("Quantity");
        table.intern("bolt");
        table
    }

    const SHEET: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>12</v></c><c r="D2" t="inlineStr"><is><t xml:space="preserve"> loose </t></is></c></row>
<row r="3"><c r="A3" t="str"><v>nut</v></c><c r="B3"/></row>
<row r="6"><c r="A6" t="s"><v>2</v></c><c r="B6"><v>5.0</v></c></row>
</sheetData></worksheet>"#;

    #[test]
    fn test_read_rows_by_header() {
        let strings = strings();
        let mut reader =
            WorksheetReader::new(SHEET.as_bytes(), &strings, Rc::new(LineMap::build()), 1).unwrap();

        assert_eq!(reader.headers().unwrap().get(&2), Some(&"Quantity".to_string()));
        assert_eq!(reader.current_row(), 1);

        let rows = reader.read_rows().unwrap();
        assert_eq!(
            rows,
            vec![
                Line {
                    name: "bolt".into(),
                    qty: 12,
                    note: Some(" loose ".into()),
                },
                Line {
                    name: "nut".into(),
                    qty: 1,
                    note: None,
                },
                Line {
                    name: "bolt".into(),
                    qty: 5,
                    note: None,
                },
            ]
        );
        assert!(reader.read_row().unwrap().is_none());
    }

    #[test]
    fn test_skip_rows_counts_gaps() {
        let strings = strings();
        let mut reader =
            WorksheetReader::new(SHEET.as_bytes(), &strings, Rc::new(LineMap::build()), 1).unwrap();

        // Rows 2..=4 are skipped; 4 and 5 do not exist
        reader.skip_rows(3).unwrap();
        assert_eq!(reader.current_row(), 4);
        let line = reader.read_row().unwrap().unwrap();
        assert_eq!(line.qty, 5);
        assert_eq!(reader.current_row(), 6);

        reader.skip_rows(10).unwrap();
        assert!(reader.read_row().unwrap().is_none());
    }

    #[test]
    fn test_unresolvable_header() {
        struct Missing;
        impl ClassMapper for Missing {
            type Record = Line;
            fn configure(map: &mut ClassMap<Line>) {
                map.map(field!(Line, name)).name("Product");
            }
        }

        let strings = strings();
        let result = WorksheetReader::new(SHEET.as_bytes(), &strings, Rc::new(Missing::build()), 1);
        match result {
            Err(XlsxError::Core(Error::UnresolvableBinding { field, header })) => {
                assert_eq!(field, "name");
                assert_eq!(header, "Product");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_sheet_has_no_header() {
        let strings = SharedStringTable::new();
        let empty = r#"<worksheet><sheetData/></worksheet>"#;
        let result = WorksheetReader::new(empty.as_bytes(), &strings, Rc::new(LineMap::build()), 1);
        assert!(matches!(result, Err(XlsxError::Core(Error::NoRows))));
    }

    #[test]
    fn test_conversion_error_is_fatal() {
        let strings = strings();
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="B2" t="str"><v>many</v></c></row></sheetData></worksheet>"#;
        let mut reader =
            WorksheetReader::new(sheet.as_bytes(), &strings, Rc::new(LineMap::build()), 1).unwrap();
        assert!(matches!(
            reader.read_row(),
            Err(XlsxError::Core(Error::Conversion { .. }))
        ));
    }

    #[test]
    fn test_headerless_read_by_index() {
        struct ByIndex;
        impl ClassMapper for ByIndex {
            type Record = Line;
            fn configure(map: &mut ClassMap<Line>) {
                map.map(field!(Line, name)).index(1);
                map.map(field!(Line, qty)).index(2);
                map.map(field!(Line, note)).read_using(|row| {
                    Ok(Some(format!("{}x{}", row.value(1)?, row.value(2)?)))
                });
            }
        }

        let strings = SharedStringTable::new();
        let sheet = r#"<worksheet><sheetData><row><c t="str"><v>washer</v></c><c><v>3</v></c></row></sheetData></worksheet>"#;
        let mut reader =
            WorksheetReader::new(sheet.as_bytes(), &strings, Rc::new(ByIndex::build()), 0).unwrap();
        let line = reader.read_row().unwrap().unwrap();
        assert_eq!(
            line,
            Line {
                name: "washer".into(),
                qty: 3,
                note: Some("washerx3".into()),
            }
        );
        assert_eq!(reader.current_row(), 1);
    }
}
