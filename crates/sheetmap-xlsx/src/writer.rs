//! Forward-only worksheet writer
//!
//! The part is spooled to a temp file: everything up to `<sheetData>` is
//! written when the writer is created and each row as it arrives. On
//! [`WorksheetWriter::finish`] (or drop) the part is closed and handed to the
//! package. With auto-fit enabled a second pass copies the spooled part and
//! swaps in the measured `<cols>` element.

use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use tempfile::NamedTempFile;

use sheetmap_core::{
    column_to_letters, datetime_to_serial, ClassMap, ColumnType, Error, PropertyMapData, Value,
    ValueKind, WorksheetStyle,
};

use crate::document::Document;
use crate::error::{XlsxError, XlsxResult};
use crate::shared_strings::SharedStringTable;
use crate::xml::escape_cell_text;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Extra width given to columns carrying the autofilter drop-down
const AUTO_FILTER_PADDING: usize = 3;

/// One output column
#[derive(Debug)]
struct WriterColumn {
    /// Position of the property map in the class map
    position: usize,
    index: u32,
    letters: String,
    kind: ColumnType,
    style_id: u32,
    /// Longest text written, in characters
    width: usize,
}

/// Writes records of type `T` to a new worksheet
pub struct WorksheetWriter<'d, T: 'static> {
    doc: &'d mut Document,
    class_map: Rc<ClassMap<T>>,
    name: String,
    position: usize,
    style: WorksheetStyle,
    columns: Vec<WriterColumn>,
    header_style_id: u32,
    out: Option<BufWriter<NamedTempFile>>,
    /// Byte range of `<cols>` in the spooled part
    cols_span: (u64, u64),
    /// Row the next header or record goes to
    current_row: u32,
    finished: bool,
}

impl<'d, T: 'static> WorksheetWriter<'d, T> {
    /// Start a worksheet named `name`, registered at `position` once finished
    ///
    /// The header row is written immediately when the style asks for it.
    pub fn new(
        doc: &'d mut Document,
        class_map: Rc<ClassMap<T>>,
        name: &str,
        position: usize,
        style: WorksheetStyle,
    ) -> XlsxResult<Self> {
        let header_style_id = doc.styles.add_header_style(&style);
        let columns = plan_columns(&class_map, doc)?;

        let mut writer = Self {
            doc,
            class_map,
            name: name.to_string(),
            position,
            current_row: style.header_row_index.max(1),
            style,
            columns,
            header_style_id,
            out: None,
            cols_span: (0, 0),
            finished: false,
        };

        writer.start_part()?;
        if writer.style.should_write_header_row {
            writer.write_header()?;
        }
        Ok(writer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row the next header or record will be written to
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    /// Write the header captions at the current row
    pub fn write_header(&mut self) -> XlsxResult<()> {
        let row = self.current_row;
        let mut xml = format!("<row r=\"{}\">", row);

        for column in self.columns.iter_mut() {
            let caption = self
                .class_map
                .get(column.position)
                .map(PropertyMapData::header_write)
                .unwrap_or("");
            let id = self.doc.shared_strings.intern(caption);
            xml.push_str(&format!(
                "<c r=\"{}{}\" s=\"{}\" t=\"s\"><v>{}</v></c>",
                column.letters, row, self.header_style_id, id
            ));
            if self.style.should_auto_fit_columns {
                column.width = column.width.max(caption.chars().count());
            }
        }

        xml.push_str("</row>");
        self.write_raw(&xml)?;
        self.current_row += 1;
        Ok(())
    }

    /// Write one record at the current row
    pub fn write_record(&mut self, record: &T) -> XlsxResult<()> {
        let row = self.current_row;
        let mut xml = format!("<row r=\"{}\">", row);
        let mut widths = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let map = self
                .class_map
                .get(column.position)
                .ok_or_else(|| Error::other(format!("no property map at {}", column.position)))?;
            let value = cell_value(map, record);
            let (cell, width) = cell_xml(&mut self.doc.shared_strings, column, row, value)?;
            xml.push_str(&cell);
            widths.push(width);
        }

        xml.push_str("</row>");
        self.write_raw(&xml)?;
        self.current_row += 1;

        if self.style.should_auto_fit_columns {
            for (column, width) in self.columns.iter_mut().zip(widths) {
                column.width = column.width.max(width);
            }
        }
        Ok(())
    }

    /// Write every record, in order
    pub fn write_records<'r, I>(&mut self, records: I) -> XlsxResult<()>
    where
        I: IntoIterator<Item = &'r T>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Leave the current row empty
    pub fn skip_row(&mut self) {
        self.skip_rows(1);
    }

    /// Leave the next `count` rows empty
    pub fn skip_rows(&mut self, count: u32) {
        self.current_row = self.current_row.saturating_add(count);
    }

    /// Store the worksheet part and register the sheet with the workbook
    pub fn finish(mut self) -> XlsxResult<()> {
        self.finish_inner()
    }

    /// Spool everything up to `<sheetData>`, noting where `<cols>` sits
    fn start_part(&mut self) -> XlsxResult<()> {
        let mut head = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        head.push_str(&format!(
            "<worksheet xmlns=\"{}\" xmlns:r=\"{}\">",
            MAIN_NS, REL_NS
        ));
        head.push_str(&self.sheet_views_xml());
        head.push_str(r#"<sheetFormatPr defaultRowHeight="15"/>"#);
        let cols_start = head.len() as u64;
        head.push_str(&self.cols_xml());
        self.cols_span = (cols_start, head.len() as u64);
        head.push_str("<sheetData>");

        let mut out = BufWriter::new(NamedTempFile::new()?);
        out.write_all(head.as_bytes())?;
        self.out = Some(out);
        Ok(())
    }

    fn write_raw(&mut self, xml: &str) -> XlsxResult<()> {
        let out = self.out.as_mut().ok_or_else(|| {
            XlsxError::InvalidFormat(format!("worksheet '{}' is already finished", self.name))
        })?;
        out.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn finish_inner(&mut self) -> XlsxResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        out.write_all(b"</sheetData>")?;
        if self.style.should_auto_filter {
            if let (Some(first), Some(last)) = (self.columns.first(), self.columns.last()) {
                let h = self.style.header_row_index.max(1);
                out.write_all(
                    format!(
                        "<autoFilter ref=\"{}{}:{}{}\"/>",
                        first.letters, h, last.letters, h
                    )
                    .as_bytes(),
                )?;
            }
        }
        out.write_all(b"</worksheet>")?;

        let mut spooled = out
            .into_inner()
            .map_err(|e| XlsxError::Io(e.into_error()))?;
        if self.style.should_auto_fit_columns {
            spooled = self.refit_columns(&spooled)?;
        }

        let part = self.doc.workbook.next_sheet_part(&self.doc.package);
        self.doc.package.set_part_file(part.clone(), spooled);
        self.doc.workbook.add_sheet(&self.name, &part, self.position);

        log::debug!(
            "finished worksheet '{}' ({} rows) into {}",
            self.name,
            self.current_row.saturating_sub(1),
            part
        );
        Ok(())
    }

    /// Copy of `spooled` with `<cols>` regenerated from the measured widths
    fn refit_columns(&self, spooled: &NamedTempFile) -> XlsxResult<NamedTempFile> {
        let (cols_start, cols_end) = self.cols_span;
        let mut source = spooled.reopen()?;
        let mut target = BufWriter::new(NamedTempFile::new()?);

        io::copy(&mut (&mut source).take(cols_start), &mut target)?;
        target.write_all(self.cols_xml().as_bytes())?;
        source.seek(SeekFrom::Start(cols_end))?;
        io::copy(&mut source, &mut target)?;

        target.into_inner().map_err(|e| XlsxError::Io(e.into_error()))
    }

    fn sheet_views_xml(&self) -> String {
        let mut xml = String::from(r#"<sheetViews><sheetView workbookViewId="0">"#);
        if self.style.should_freeze_header_row {
            let h = self.style.header_row_index.max(1);
            xml.push_str(&format!(
                "<pane ySplit=\"{}\" topLeftCell=\"A{}\" activePane=\"bottomLeft\" state=\"frozen\"/>",
                h,
                h + 1
            ));
            xml.push_str(&format!(
                "<selection pane=\"bottomLeft\" activeCell=\"A{0}\" sqref=\"A{0}\"/>",
                h + 1
            ));
        }
        xml.push_str("</sheetView></sheetViews>");
        xml
    }

    fn cols_xml(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        let padding = if self.style.should_auto_filter {
            AUTO_FILTER_PADDING
        } else {
            0
        };

        let mut xml = String::from("<cols>");
        for column in &self.columns {
            let width = ((column.width + padding) as f64)
                .max(self.style.min_column_width)
                .min(self.style.max_column_width);
            xml.push_str(&format!(
                "<col min=\"{0}\" max=\"{0}\" width=\"{1}\" bestFit=\"1\" customWidth=\"1\"/>",
                column.index, width
            ));
        }
        xml.push_str("</cols>");
        xml
    }
}

impl<T: 'static> Drop for WorksheetWriter<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.finish_inner() {
            log::error!("failed to finish worksheet '{}': {}", self.name, e);
        }
    }
}

/// Assign write indices, resolve cell kinds and intern column styles
fn plan_columns<T: 'static>(
    class_map: &ClassMap<T>,
    doc: &mut Document,
) -> XlsxResult<Vec<WriterColumn>> {
    let active: Vec<(usize, &PropertyMapData<T>)> = class_map
        .property_maps()
        .enumerate()
        .filter(|(_, m)| !m.ignore_write)
        .collect();

    let mut used: Vec<u32> = active
        .iter()
        .map(|(_, m)| m.index_write)
        .filter(|&i| i > 0)
        .collect();

    let mut columns = Vec::with_capacity(active.len());
    for (position, map) in active {
        let index = if map.index_write > 0 {
            map.index_write
        } else {
            let free = (1..).find(|i| !used.contains(i)).unwrap_or(1);
            used.push(free);
            free
        };

        let kind = resolve_kind(map);
        let style_id = doc
            .styles
            .add_column_style(&map.style, kind == ColumnType::Date);

        columns.push(WriterColumn {
            position,
            index,
            letters: column_to_letters(index)?,
            kind,
            style_id,
            width: 0,
        });
    }

    columns.sort_by_key(|c| c.index);
    Ok(columns)
}

fn resolve_kind<T>(map: &PropertyMapData<T>) -> ColumnType {
    if map.column_type != ColumnType::Unset {
        return map.column_type;
    }
    match (&map.field, &map.constant_write) {
        (Some(field), _) => ColumnType::infer(field.kind()),
        (None, Some(constant)) => ColumnType::infer(constant.kind()),
        (None, None) => ColumnType::Text,
    }
}

/// Converter, then constant, then field, then default
fn cell_value<T>(map: &PropertyMapData<T>, record: &T) -> Option<Value> {
    if let Some(convert) = &map.write_using {
        return convert(record);
    }
    if let Some(constant) = &map.constant_write {
        return Some(constant.clone());
    }
    map.field
        .as_ref()
        .and_then(|field| field.get(record))
        .or_else(|| map.default_write.clone())
}

/// Cell element and the length of its text
fn cell_xml(
    shared_strings: &mut SharedStringTable,
    column: &WriterColumn,
    row: u32,
    value: Option<Value>,
) -> XlsxResult<(String, usize)> {
    let empty = || -> XlsxResult<(String, usize)> {
        Ok((
            format!("<c r=\"{}{}\" s=\"{}\"/>", column.letters, row, column.style_id),
            0,
        ))
    };

    let value = match value {
        Some(value) => value,
        None => return empty(),
    };
    let textual = matches!(
        column.kind,
        ColumnType::Text | ColumnType::RichText | ColumnType::Formula | ColumnType::Unset
    );
    if !textual && value.is_blank() {
        return empty();
    }

    let (cell_type, inner, width) = match column.kind {
        ColumnType::Boolean => {
            let flag = u8::from(value.as_bool()?);
            ("b", format!("<v>{}</v>", flag), 1)
        }
        ColumnType::Date => {
            let serial = datetime_to_serial(value.as_datetime()?).to_string();
            let width = serial.len();
            ("n", format!("<v>{}</v>", serial), width)
        }
        ColumnType::Number => {
            let number = number_text(&value)?;
            let width = number.len();
            ("n", format!("<v>{}</v>", number), width)
        }
        ColumnType::Formula => {
            let text = value.to_text();
            let width = text.chars().count();
            ("str", format!("<v>{}</v>", escape_cell_text(&text)), width)
        }
        ColumnType::RichText => {
            let text = value.to_text();
            let width = text.chars().count();
            let space = if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            (
                "inlineStr",
                format!("<is><t{}>{}</t></is>", space, escape_cell_text(&text)),
                width,
            )
        }
        ColumnType::Text | ColumnType::Unset => {
            let text = value.to_text();
            let width = text.chars().count();
            let id = shared_strings.intern(&text);
            ("s", format!("<v>{}</v>", id), width)
        }
    };

    Ok((
        format!(
            "<c r=\"{}{}\" s=\"{}\" t=\"{}\">{}</c>",
            column.letters, row, column.style_id, cell_type, inner
        ),
        width,
    ))
}

/// Invariant text of a numeric cell; integers and decimals keep full precision
fn number_text(value: &Value) -> XlsxResult<String> {
    match value {
        Value::Integer(i) => Ok(i.to_string()),
        Value::Decimal(d) => Ok(d.to_string()),
        other => {
            let number = other.as_f64()?;
            if number.is_finite() {
                Ok(number.to_string())
            } else {
                Err(Error::conversion(other.to_text(), ValueKind::Float).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sheetmap_core::{field, ClassMapper, ColumnStyle, NumberFormat};

    #[derive(Debug, Default)]
    struct Entry {
        label: String,
        amount: f64,
        active: bool,
        due: Option<NaiveDate>,
    }

    struct EntryMap;

    impl ClassMapper for EntryMap {
        type Record = Entry;

        fn configure(map: &mut ClassMap<Entry>) {
            map.map(field!(Entry, amount)).index(3).name("Amount");
            map.map(field!(Entry, label)).name("Label");
            map.map(field!(Entry, active)).name("Active");
            map.map(field!(Entry, due))
                .name("Due")
                .style(ColumnStyle::new().with_number_format(NumberFormat::custom("yyyy-mm-dd")));
            map.map_constant().index(6).name("Source").constant("ledger");
        }
    }

    fn new_document(dir: &tempfile::TempDir) -> Document {
        Document::open_or_create(dir.path().join("out.xlsx")).unwrap()
    }

    fn part_text(doc: &Document, name: &str) -> String {
        let entry = doc.workbook().sheet(name).unwrap();
        String::from_utf8(doc.package().part(&entry.part).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_index_assignment_and_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        let map = EntryMap::build();
        let columns = plan_columns(&map, &mut doc).unwrap();

        let indices: Vec<_> = columns.iter().map(|c| (c.index, c.kind)).collect();
        assert_eq!(
            indices,
            vec![
                (1, ColumnType::Text),
                (2, ColumnType::Boolean),
                (3, ColumnType::Number),
                (4, ColumnType::Date),
                (6, ColumnType::Text),
            ]
        );
        assert!(doc.styles().number_formats().iter().any(|(id, _)| *id == 165));
    }

    #[test]
    fn test_write_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        {
            let mut writer = WorksheetWriter::new(
                &mut doc,
                Rc::new(EntryMap::build()),
                "Ledger",
                0,
                WorksheetStyle::default(),
            )
            .unwrap();
            writer
                .write_record(&Entry {
                    label: "rent".into(),
                    amount: 1200.5,
                    active: true,
                    due: NaiveDate::from_ymd_opt(2024, 1, 1),
                })
                .unwrap();
            writer.skip_row();
            writer.write_record(&Entry::default()).unwrap();
            assert_eq!(writer.current_row(), 5);
            writer.finish().unwrap();
        }

        let xml = part_text(&doc, "Ledger");
        assert!(xml.contains(r#"<row r="1"><c r="A1" s="1" t="s"><v>0</v></c>"#));
        assert!(xml.contains(r#"<c r="B2" s="0" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"t="n"><v>1200.5</v></c>"#));
        assert!(xml.contains(r#"t="n"><v>45292</v></c>"#));
        assert!(!xml.contains(r#"<row r="3">"#));
        assert!(xml.contains(r#"<row r="4">"#));
        // Absent optional date is a style-only cell
        assert!(xml.contains(r#"<c r="D4" s=""#));
        assert!(xml.contains(r#"<col min="6" max="6" width="5" bestFit="1" customWidth="1"/>"#));
        assert_eq!(doc.shared_strings().get(0), Some("Label"));
        assert!(doc.shared_strings().len() >= 7);
    }

    #[test]
    fn test_layout_options() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        let style = WorksheetStyle::default()
            .with_header_row_index(2)
            .with_auto_filter(true)
            .with_auto_fit_columns(true)
            .with_freeze_header_row(true)
            .with_column_width_range(4.0, 12.0);

        let mut writer =
            WorksheetWriter::new(&mut doc, Rc::new(EntryMap::build()), "Layout", 0, style).unwrap();
        writer
            .write_record(&Entry {
                label: "a much longer label than allowed".into(),
                ..Entry::default()
            })
            .unwrap();
        drop(writer);

        let xml = part_text(&doc, "Layout");
        assert!(xml.contains(r#"<pane ySplit="2" topLeftCell="A3" activePane="bottomLeft" state="frozen"/>"#));
        assert!(xml.contains(r#"<autoFilter ref="A2:F2"/>"#));
        // "Label" + filter padding, then clamped
        assert!(xml.contains(r#"<col min="1" max="1" width="12""#));
        assert!(xml.contains(r#"<col min="2" max="2" width="9""#));
        assert!(xml.contains(r#"<row r="3">"#));
    }

    #[test]
    fn test_auto_fit_replaces_only_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        let style = WorksheetStyle::default()
            .with_auto_fit_columns(true)
            .with_freeze_header_row(true);

        let mut writer =
            WorksheetWriter::new(&mut doc, Rc::new(EntryMap::build()), "Fit", 0, style).unwrap();
        for label in ["short", "a label of twenty-two!"] {
            writer
                .write_record(&Entry {
                    label: label.into(),
                    ..Entry::default()
                })
                .unwrap();
        }
        writer.finish().unwrap();

        let xml = part_text(&doc, "Fit");
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet"#));
        assert_eq!(xml.matches("<cols>").count(), 1);
        assert!(xml.contains(r#"<col min="1" max="1" width="22""#));
        // "Amount" header outlasts its "0" values
        assert!(xml.contains(r#"<col min="3" max="3" width="6""#));
        assert!(xml.contains(r#"<col min="4" max="4" width="5""#));

        let cols = xml.find("<cols>").unwrap();
        assert!(xml.find(r#"<pane ySplit="1""#).unwrap() < cols);
        assert!(cols < xml.find("<sheetData><row r=\"1\">").unwrap());
        assert!(xml.ends_with(r#"</row></sheetData></worksheet>"#));
    }

    #[test]
    fn test_headerless_skip_leaves_gap() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        let style = WorksheetStyle::default().with_write_header_row(false);

        let mut writer =
            WorksheetWriter::new(&mut doc, Rc::new(EntryMap::build()), "Gaps", 0, style).unwrap();
        assert_eq!(writer.current_row(), 1);
        writer.write_record(&Entry::default()).unwrap();
        writer.skip_rows(5);
        writer.write_record(&Entry::default()).unwrap();
        writer.finish().unwrap();

        let xml = part_text(&doc, "Gaps");
        let first = xml.find(r#"<row r="1">"#).unwrap();
        let second = xml.find(r#"<row r="7">"#).unwrap();
        let between = &xml[first..second];
        assert_eq!(between.matches("<row ").count(), 1);
        assert!(between.ends_with("</row>"));
        assert!(xml.contains(r#"<sheetData><row r="1">"#));
    }

    #[test]
    fn test_number_text() {
        assert_eq!(number_text(&Value::Integer(-4)).unwrap(), "-4");
        assert_eq!(number_text(&Value::Text(" 2.50 ".into())).unwrap(), "2.5");
        assert_eq!(
            number_text(&Value::Decimal("12345678901234567890.125".parse().unwrap())).unwrap(),
            "12345678901234567890.125"
        );
        assert!(number_text(&Value::Float(f64::NAN)).is_err());
        assert!(number_text(&Value::Text("abc".into())).is_err());
    }

    #[test]
    fn test_sheet_registered_at_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(&dir);
        for (name, position) in [("First", 0), ("Second", 5), ("Zeroth", 0)] {
            WorksheetWriter::new(
                &mut doc,
                Rc::new(EntryMap::build()),
                name,
                position,
                WorksheetStyle::default(),
            )
            .unwrap()
            .finish()
            .unwrap();
        }

        let names: Vec<_> = doc.workbook().sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zeroth", "First", "Second"]);
        let ids: Vec<_> = doc.workbook().sheets().iter().map(|s| s.sheet_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
