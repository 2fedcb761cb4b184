//! Stylesheet (`xl/styles.xml`) interning table
//!
//! Every font, fill, border and cell format is kept as its canonical XML
//! text. Adding a component returns the index of an identical entry when one
//! exists, otherwise appends it, so indices are stable and only ever grow.
//! Entries loaded from an existing stylesheet are kept verbatim under their
//! original indices.

use std::io::BufRead;

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use sheetmap_core::{
    BorderLineStyle, BorderPlacement, Color, ColumnStyle, FontStyle, HorizontalAlignment,
    NumberFormat, PatternType, VerticalAlignment, WorksheetStyle,
};

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{attr, capture_element, escape_xml, local_name};

const STYLESHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Sections carried through unchanged, in the order they are written back
const PRESERVED_SECTIONS: [&str; 5] = ["cellStyles", "dxfs", "tableStyles", "colors", "extLst"];

/// Append-only list of XML fragments with reverse lookup
#[derive(Debug, Default)]
struct InternTable {
    entries: Vec<String>,
    index: AHashMap<String, u32>,
}

impl InternTable {
    fn intern(&mut self, xml: String) -> u32 {
        if let Some(&id) = self.index.get(&xml) {
            return id;
        }
        self.push(xml)
    }

    /// Append without deduplication; a loaded duplicate still takes its own slot
    fn push(&mut self, xml: String) -> u32 {
        let id = self.entries.len() as u32;
        self.index.entry(xml.clone()).or_insert(id);
        self.entries.push(xml);
        id
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write(&self, xml: &mut String, tag: &str) {
        xml.push_str(&format!("<{} count=\"{}\">", tag, self.entries.len()));
        for entry in &self.entries {
            xml.push_str(entry);
        }
        xml.push_str(&format!("</{}>", tag));
    }
}

/// Component indices and alignment of one `<xf>` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFormat {
    pub num_fmt_id: u32,
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
}

impl CellFormat {
    fn to_xml(self, in_cell_xfs: bool) -> String {
        let xf_id = if in_cell_xfs { " xfId=\"0\"" } else { "" };
        format!(
            "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\"{} applyNumberFormat=\"{}\" applyFill=\"{}\"><alignment horizontal=\"{}\" vertical=\"{}\"/></xf>",
            self.num_fmt_id,
            self.font_id,
            self.fill_id,
            self.border_id,
            xf_id,
            u8::from(self.num_fmt_id != 0),
            u8::from(self.fill_id != 0),
            self.horizontal.as_str(),
            self.vertical.as_str(),
        )
    }
}

/// Custom number formats keyed by format code
#[derive(Debug, Default)]
struct NumberFormatTable {
    formats: Vec<(u32, String)>,
    by_code: AHashMap<String, u32>,
}

impl NumberFormatTable {
    fn add(&mut self, code: &str) -> u32 {
        if let Some(&id) = self.by_code.get(code) {
            return id;
        }
        let next = self
            .formats
            .iter()
            .map(|(id, _)| id + 1)
            .max()
            .unwrap_or(0)
            .max(NumberFormat::FIRST_CUSTOM_ID);
        self.insert(next, code.to_string());
        next
    }

    fn insert(&mut self, id: u32, code: String) {
        self.by_code.entry(code.clone()).or_insert(id);
        self.formats.push((id, code));
    }
}

/// Interned stylesheet of one workbook
#[derive(Debug, Default)]
pub struct StyleTable {
    number_formats: NumberFormatTable,
    fonts: InternTable,
    fills: InternTable,
    borders: InternTable,
    cell_style_xfs: InternTable,
    cell_xfs: InternTable,
    /// Loaded sections written back verbatim, keyed by element name
    preserved: Vec<(String, String)>,
}

impl StyleTable {
    /// Stylesheet of a new workbook: the entries every consumer expects at index 0
    /// (plus the mandatory `gray125` fill at index 1)
    pub fn with_defaults() -> Self {
        let mut table = Self::default();
        table.seed_defaults();
        table
    }

    fn seed_defaults(&mut self) {
        if self.borders.is_empty() {
            self.add_border(BorderPlacement::NONE, BorderLineStyle::None, Color::BLACK);
        }
        if self.cell_xfs.is_empty() {
            self.add_cell_format(&CellFormat::default());
        }
        if self.cell_style_xfs.is_empty() {
            self.add_cell_style_format(&CellFormat::default());
        }
        if self.fills.is_empty() {
            self.add_pattern_fill(Color::TRANSPARENT, PatternType::None);
            self.add_pattern_fill(Color::TRANSPARENT, PatternType::Gray125);
        }
        if self.fonts.is_empty() {
            self.add_font(&FontStyle::default(), Color::BLACK);
        }
    }

    /// Border drawn on the sides in `placement`
    pub fn add_border(
        &mut self,
        placement: BorderPlacement,
        line: BorderLineStyle,
        color: Color,
    ) -> u32 {
        let drawn = line != BorderLineStyle::None;
        let edge = |tag: &str, side: BorderPlacement| {
            if drawn && placement.intersects(side) {
                format!(
                    "<{tag} style=\"{}\"><color rgb=\"{}\"/></{tag}>",
                    line.as_str(),
                    color.to_argb_hex()
                )
            } else {
                format!("<{}/>", tag)
            }
        };

        let mut xml = String::from("<border");
        if drawn && placement.contains(BorderPlacement::DIAGONAL_UP) {
            xml.push_str(" diagonalUp=\"1\"");
        }
        if drawn && placement.contains(BorderPlacement::DIAGONAL_DOWN) {
            xml.push_str(" diagonalDown=\"1\"");
        }
        xml.push('>');
        xml.push_str(&edge("left", BorderPlacement::LEFT));
        xml.push_str(&edge("right", BorderPlacement::RIGHT));
        xml.push_str(&edge("top", BorderPlacement::TOP));
        xml.push_str(&edge("bottom", BorderPlacement::BOTTOM));
        xml.push_str(&edge(
            "diagonal",
            BorderPlacement::DIAGONAL_UP | BorderPlacement::DIAGONAL_DOWN,
        ));
        xml.push_str("</border>");

        self.borders.intern(xml)
    }

    /// Pattern fill; a transparent color writes no `fgColor`
    pub fn add_pattern_fill(&mut self, color: Color, pattern: PatternType) -> u32 {
        let xml = if pattern == PatternType::None || color.is_transparent() {
            format!(
                "<fill><patternFill patternType=\"{}\"/></fill>",
                pattern.as_str()
            )
        } else {
            format!(
                "<fill><patternFill patternType=\"{}\"><fgColor rgb=\"{}\"/></patternFill></fill>",
                pattern.as_str(),
                color.to_argb_hex()
            )
        };
        self.fills.intern(xml)
    }

    pub fn add_font(&mut self, font: &FontStyle, color: Color) -> u32 {
        let mut xml = String::from("<font>");
        if font.bold {
            xml.push_str("<b/>");
        }
        if font.italic {
            xml.push_str("<i/>");
        }
        if font.strikethrough {
            xml.push_str("<strike/>");
        }
        if font.underline {
            xml.push_str("<u/>");
        }
        xml.push_str(&format!("<sz val=\"{}\"/>", font.size));
        xml.push_str(&format!("<color rgb=\"{}\"/>", color.to_argb_hex()));
        xml.push_str(&format!("<name val=\"{}\"/>", escape_xml(&font.name)));
        xml.push_str("</font>");

        self.fonts.intern(xml)
    }

    /// ID of a custom number format code
    pub fn add_number_format(&mut self, code: &str) -> u32 {
        self.number_formats.add(code)
    }

    /// ID to reference `format` by, interning custom codes
    pub fn number_format_id(&mut self, format: &NumberFormat) -> u32 {
        match format {
            NumberFormat::BuiltIn(id) => *id,
            NumberFormat::Custom(code) => self.add_number_format(code),
        }
    }

    /// Index of a `cellXfs` record, the value written to a cell's `s` attribute
    pub fn add_cell_format(&mut self, format: &CellFormat) -> u32 {
        self.cell_xfs.intern(format.to_xml(true))
    }

    pub fn add_cell_style_format(&mut self, format: &CellFormat) -> u32 {
        self.cell_style_xfs.intern(format.to_xml(false))
    }

    /// Cell format of a data column; `is_date` picks the short date format
    /// when the column has none
    pub fn add_column_style(&mut self, style: &ColumnStyle, is_date: bool) -> u32 {
        let border_id =
            self.add_border(style.border_placement, style.border_line, style.border_color);
        let fill_id = self.add_pattern_fill(style.background_color, style.background_pattern);
        let font_id = self.add_font(&style.font, style.foreground_color);
        let num_fmt_id = match &style.number_format {
            Some(format) => self.number_format_id(format),
            None if is_date => NumberFormat::ID_DATE_SHORT,
            None => NumberFormat::ID_GENERAL,
        };

        self.add_cell_format(&CellFormat {
            num_fmt_id,
            font_id,
            fill_id,
            border_id,
            horizontal: style.horizontal_alignment,
            vertical: style.vertical_alignment,
        })
    }

    /// Cell format of the header row
    pub fn add_header_style(&mut self, style: &WorksheetStyle) -> u32 {
        let fill_id = self.add_pattern_fill(
            style.header_background_color,
            style.header_background_pattern,
        );
        let font_id = self.add_font(&style.header_font, style.header_foreground_color);

        self.add_cell_format(&CellFormat {
            num_fmt_id: NumberFormat::ID_GENERAL,
            font_id,
            fill_id,
            border_id: 0,
            horizontal: style.header_horizontal_alignment,
            vertical: style.header_vertical_alignment,
        })
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len()
    }

    pub fn border_count(&self) -> usize {
        self.borders.len()
    }

    pub fn cell_format_count(&self) -> usize {
        self.cell_xfs.len()
    }

    pub fn cell_style_format_count(&self) -> usize {
        self.cell_style_xfs.len()
    }

    /// Custom number formats as `(id, code)`, in insertion order
    pub fn number_formats(&self) -> &[(u32, String)] {
        &self.number_formats.formats
    }

    /// Replay an existing stylesheet, keeping every index
    pub fn parse<R: BufRead>(reader: R) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut table = Self::default();
        let mut section: Option<Vec<u8>> = None;
        let mut buf = Vec::new();

        loop {
            let (e, is_empty) = match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => (e.into_owned(), false),
                Ok(Event::Empty(e)) => (e.into_owned(), true),
                Ok(Event::End(e)) => {
                    if section.as_deref() == Some(local_name(e.name().as_ref())) {
                        section = None;
                    }
                    buf.clear();
                    continue;
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {
                    buf.clear();
                    continue;
                }
            };
            buf.clear();

            let name = local_name(e.name().as_ref()).to_vec();
            match (section.as_deref(), name.as_slice()) {
                (_, b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellStyleXfs" | b"cellXfs") => {
                    if !is_empty {
                        section = Some(name);
                    }
                }
                (Some(b"numFmts"), b"numFmt") => {
                    let id = attr(&e, b"numFmtId").and_then(|v| v.parse::<u32>().ok());
                    let code = attr(&e, b"formatCode");
                    if let (Some(id), Some(code)) = (id, code) {
                        table.number_formats.insert(id, code);
                    }
                    if !is_empty {
                        capture_element(&mut xml_reader, &e, false)?;
                    }
                }
                (Some(b"fonts"), b"font") => {
                    let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                    table.fonts.push(xml);
                }
                (Some(b"fills"), b"fill") => {
                    let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                    table.fills.push(xml);
                }
                (Some(b"borders"), b"border") => {
                    let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                    table.borders.push(xml);
                }
                (Some(b"cellStyleXfs"), b"xf") => {
                    let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                    table.cell_style_xfs.push(xml);
                }
                (Some(b"cellXfs"), b"xf") => {
                    let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                    table.cell_xfs.push(xml);
                }
                (None, tag) => {
                    let tag = String::from_utf8_lossy(tag).into_owned();
                    if PRESERVED_SECTIONS.contains(&tag.as_str()) {
                        let xml = capture_element(&mut xml_reader, &e, is_empty)?;
                        table.preserved.push((tag, xml));
                    }
                }
                _ => {}
            }
        }

        log::debug!(
            "loaded stylesheet: {} fonts, {} fills, {} borders, {} cell formats",
            table.fonts.len(),
            table.fills.len(),
            table.borders.len(),
            table.cell_xfs.len()
        );

        table.seed_defaults();
        Ok(table)
    }

    /// Serialize in schema order
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!("<styleSheet xmlns=\"{}\">", STYLESHEET_NS));

        if !self.number_formats.formats.is_empty() {
            xml.push_str(&format!(
                "<numFmts count=\"{}\">",
                self.number_formats.formats.len()
            ));
            for (id, code) in &self.number_formats.formats {
                xml.push_str(&format!(
                    "<numFmt numFmtId=\"{}\" formatCode=\"{}\"/>",
                    id,
                    escape_xml(code)
                ));
            }
            xml.push_str("</numFmts>");
        }

        self.fonts.write(&mut xml, "fonts");
        self.fills.write(&mut xml, "fills");
        self.borders.write(&mut xml, "borders");
        self.cell_style_xfs.write(&mut xml, "cellStyleXfs");
        self.cell_xfs.write(&mut xml, "cellXfs");

        for section in PRESERVED_SECTIONS {
            match self.preserved.iter().find(|(tag, _)| tag == section) {
                Some((_, part)) => xml.push_str(part),
                None if section == "cellStyles" => xml.push_str(
                    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
                ),
                None => {}
            }
        }

        xml.push_str("</styleSheet>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let table = StyleTable::with_defaults();
        assert_eq!(table.font_count(), 1);
        assert_eq!(table.fill_count(), 2);
        assert_eq!(table.border_count(), 1);
        assert_eq!(table.cell_format_count(), 1);
        assert_eq!(table.cell_style_format_count(), 1);

        let xml = table.to_xml();
        assert!(xml.contains(r#"<patternFill patternType="gray125"/>"#));
        assert!(xml.contains(r#"<cellStyle name="Normal" xfId="0" builtinId="0"/>"#));
        assert!(!xml.contains("<numFmts"));
    }

    #[test]
    fn test_identical_components_share_index() {
        let mut table = StyleTable::with_defaults();

        let red = table.add_pattern_fill(Color::RED, PatternType::Solid);
        let blue = table.add_pattern_fill(Color::BLUE, PatternType::Solid);
        assert_eq!(red, 2);
        assert_eq!(blue, 3);
        assert_eq!(table.add_pattern_fill(Color::RED, PatternType::Solid), red);

        // Same as the seeded default font
        assert_eq!(table.add_font(&FontStyle::default(), Color::BLACK), 0);
        let bold = table.add_font(&FontStyle::header(), Color::BLACK);
        assert_eq!(bold, 1);

        let border = table.add_border(
            BorderPlacement::OUTSIDE,
            BorderLineStyle::Thin,
            Color::BLACK,
        );
        assert_eq!(border, 1);
        assert_eq!(
            table.add_border(BorderPlacement::NONE, BorderLineStyle::Thick, Color::RED),
            0
        );
    }

    #[test]
    fn test_number_format_ids() {
        let mut table = StyleTable::with_defaults();
        assert_eq!(table.add_number_format("0.000"), 165);
        assert_eq!(table.add_number_format("#,##0.0"), 166);
        assert_eq!(table.add_number_format("0.000"), 165);
        assert_eq!(table.number_format_id(&NumberFormat::percent()), 9);
        assert_eq!(table.number_format_id(&NumberFormat::custom("#,##0.0")), 166);
    }

    #[test]
    fn test_cell_format_xml() {
        let format = CellFormat {
            num_fmt_id: 14,
            font_id: 1,
            fill_id: 2,
            border_id: 0,
            horizontal: HorizontalAlignment::Left,
            vertical: VerticalAlignment::Top,
        };
        assert_eq!(
            format.to_xml(true),
            r#"<xf numFmtId="14" fontId="1" fillId="2" borderId="0" xfId="0" applyNumberFormat="1" applyFill="1"><alignment horizontal="left" vertical="top"/></xf>"#
        );
        assert!(!format.to_xml(false).contains("xfId"));
    }

    #[test]
    fn test_column_style_uses_date_format() {
        let mut table = StyleTable::with_defaults();
        let plain = table.add_column_style(&ColumnStyle::default(), false);
        let date = table.add_column_style(&ColumnStyle::default(), true);
        assert_ne!(plain, date);
        assert_eq!(table.add_column_style(&ColumnStyle::default(), true), date);
        assert!(table.to_xml().contains(r#"numFmtId="14""#));
    }

    #[test]
    fn test_parse_keeps_indices() {
        let source = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="170" formatCode="0.0000"/></numFmts>
  <fonts count="2">
    <font><sz val="10"/><name val="Arial"/></font>
    <font><b/><sz val="10"/><name val="Arial"/></font>
  </fonts>
  <fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
  </fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="170" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
  </cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
  <dxfs count="0"/>
</styleSheet>"#;

        let mut table = StyleTable::parse(source.as_bytes()).unwrap();
        assert_eq!(table.font_count(), 2);
        assert_eq!(table.cell_format_count(), 2);
        assert_eq!(table.number_formats(), &[(170, "0.0000".to_string())]);

        // New entries append after the loaded ones
        assert_eq!(table.add_number_format("0.0"), 171);
        assert_eq!(table.add_number_format("0.0000"), 170);
        assert_eq!(table.add_font(&FontStyle::default(), Color::BLACK), 2);

        let xml = table.to_xml();
        assert!(xml.contains(r#"<font><b/><sz val="10"/><name val="Arial"/></font>"#));
        assert!(xml.contains(r#"<dxfs count="0"/>"#));
        assert_eq!(xml.matches("<cellStyles").count(), 1);
    }
}
