//! Shared string table (`xl/sharedStrings.xml`)

use std::io::BufRead;

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{capture_element, decode_excel_escapes, escape_cell_text, local_name};

const SST_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Workbook-wide string table referenced by `t="s"` cells
#[derive(Debug, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
    index: AHashMap<String, u32>,
    /// `<si>` elements of the loaded part, written back verbatim
    loaded_xml: Vec<String>,
}

impl SharedStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `text`, appending it when new
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(text.to_string());
        self.index.insert(text.to_string(), id);
        id
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Whether strings were added since loading
    pub fn is_modified(&self) -> bool {
        self.strings.len() > self.loaded_xml.len()
    }

    /// Load an existing table, keeping every index
    pub fn parse<R: BufRead>(reader: R) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut table = Self::new();
        let mut buf = Vec::new();

        loop {
            let (e, is_empty) = match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"si" => {
                    (e.into_owned(), false)
                }
                Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"si" => {
                    (e.into_owned(), true)
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {
                    buf.clear();
                    continue;
                }
            };
            buf.clear();

            let xml = capture_element(&mut xml_reader, &e, is_empty)?;
            let text = string_item_text(&xml)?;
            let id = table.strings.len() as u32;
            if table.index.contains_key(&text) {
                log::warn!("duplicate shared string at index {}", id);
            } else {
                table.index.insert(text.clone(), id);
            }
            table.strings.push(text);
            table.loaded_xml.push(xml);
        }

        log::debug!("loaded {} shared strings", table.strings.len());
        Ok(table)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!(
            "<sst xmlns=\"{}\" count=\"{}\" uniqueCount=\"{}\">",
            SST_NS,
            self.strings.len(),
            self.strings.len()
        ));

        for (i, text) in self.strings.iter().enumerate() {
            match self.loaded_xml.get(i) {
                Some(loaded) => xml.push_str(loaded),
                None if needs_space_preserve(text) => {
                    xml.push_str("<si><t xml:space=\"preserve\">");
                    xml.push_str(&escape_cell_text(text));
                    xml.push_str("</t></si>");
                }
                None => {
                    xml.push_str("<si><t>");
                    xml.push_str(&escape_cell_text(text));
                    xml.push_str("</t></si>");
                }
            }
        }

        xml.push_str("</sst>");
        xml
    }
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// Plain text of one `<si>`: its `<t>` runs concatenated, phonetic runs skipped
fn string_item_text(xml: &str) -> XlsxResult<String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(false);

    let mut text = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && !in_phonetic => {
                text.push_str(&t.unescape()?);
            }
            Ok(Event::CData(c)) if in_text && !in_phonetic => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(decode_excel_escapes(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SharedStringTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        assert_eq!(table.intern("alpha"), a);
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("beta"));
        assert!(table.is_modified());
    }

    #[test]
    fn test_parse_plain_and_rich() {
        let source = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>Name</t></si>
  <si><r><rPr><b/></rPr><t xml:space="preserve">Bold </t></r><r><t>tail</t></r><rPh><t>ignored</t></rPh></si>
  <si><t>Line_x000D__x000A_two &amp; more</t></si>
</sst>"#;
        let mut table = SharedStringTable::parse(source.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some("Name"));
        assert_eq!(table.get(1), Some("Bold tail"));
        assert_eq!(table.get(2), Some("Line\r\ntwo & more"));
        assert!(!table.is_modified());

        assert_eq!(table.intern("Name"), 0);
        assert!(!table.is_modified());
        assert_eq!(table.intern("new"), 3);
        assert!(table.is_modified());
    }

    #[test]
    fn test_to_xml_keeps_loaded_items() {
        let source = r#"<sst><si><r><t>rich</t></r></si></sst>"#;
        let mut table = SharedStringTable::parse(source.as_bytes()).unwrap();
        table.intern(" padded ");
        table.intern("a<b");

        let xml = table.to_xml();
        assert!(xml.contains(r#"count="3" uniqueCount="3""#));
        assert!(xml.contains("<si><r><t>rich</t></r></si>"));
        assert!(xml.contains(r#"<si><t xml:space="preserve"> padded </t></si>"#));
        assert!(xml.contains("<si><t>a&lt;b</t></si>"));
    }
}
