//! Small XML text helpers shared by the part readers and writers

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

/// Escape text for element content or attribute values
pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not representable in XML 1.0
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {
                out.push_str(&format!("_x{:04X}_", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape cell text so it survives [`decode_excel_escapes`] unchanged
///
/// A literal `_xHHHH_` in the text gets its underscore encoded as `_x005F_`.
pub(crate) fn escape_cell_text(s: &str) -> String {
    if !s.contains("_x") {
        return escape_xml(s);
    }
    let mut guarded = String::with_capacity(s.len() + 8);
    for (i, c) in s.char_indices() {
        if c == '_' && looks_like_escape(&s[i..]) {
            guarded.push_str("_x005F_");
        } else {
            guarded.push(c);
        }
    }
    escape_xml(&guarded)
}

fn looks_like_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 7
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Unescaped value of attribute `name`, if present
pub(crate) fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Local part of a possibly prefixed element name (`x:row` -> `row`)
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Re-serialize the element opened by `start` and its whole subtree
///
/// Used to carry parts of a loaded document through unchanged. Text keeps its
/// original escaping.
pub(crate) fn capture_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart<'_>,
    is_empty: bool,
) -> XlsxResult<String> {
    let mut out = String::new();
    out.push('<');
    out.push_str(&String::from_utf8_lossy(start));
    if is_empty {
        out.push_str("/>");
        return Ok(out);
    }
    out.push('>');

    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                out.push('<');
                out.push_str(&String::from_utf8_lossy(&e));
                out.push('>');
            }
            Ok(Event::Empty(e)) => {
                out.push('<');
                out.push_str(&String::from_utf8_lossy(&e));
                out.push_str("/>");
            }
            Ok(Event::Text(t)) => out.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::CData(c)) => {
                out.push_str("<![CDATA[");
                out.push_str(&String::from_utf8_lossy(&c));
                out.push_str("]]>");
            }
            Ok(Event::End(e)) => {
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                out.push('>');
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(XlsxError::InvalidFormat(format!(
                    "unterminated element <{}>",
                    String::from_utf8_lossy(start.name().as_ref())
                )))
            }
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_excel_escapes() {
        assert_eq!(decode_excel_escapes("a_x000d_b"), "a\rb");
        assert_eq!(decode_excel_escapes("_x005F_x"), "_x");
        assert_eq!(decode_excel_escapes("plain"), "plain");
        assert_eq!(decode_excel_escapes("_x12_"), "_x12_");
        assert_eq!(decode_excel_escapes("end_x"), "end_x");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell_x0007_");
        assert_eq!(escape_xml("tab\there"), "tab\there");
    }

    #[test]
    fn test_capture_element_keeps_subtree() {
        let xml = r#"<root><font><b/><sz val="11"/><name val="A &amp; B"/></font><next/></root>"#;
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut buf = Vec::new();
        let captured = loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) if e.name().as_ref() == b"font" => {
                    let e = e.into_owned();
                    break capture_element(&mut reader, &e, false).unwrap();
                }
                Event::Eof => panic!("no font element"),
                _ => {}
            }
            buf.clear();
        };
        assert_eq!(
            captured,
            r#"<font><b/><sz val="11"/><name val="A &amp; B"/></font>"#
        );
    }

    #[test]
    fn test_cell_text_escape_roundtrip() {
        for text in ["plain", "_x0041_", "a_x000D_b", "line\u{1}break", "_x", "_x\u{1}"] {
            assert_eq!(decode_excel_escapes(&escape_cell_text(text)), text);
        }
        assert_eq!(escape_cell_text("_x0041_"), "_x005F_x0041_");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"x:row"), b"row");
        assert_eq!(local_name(b"row"), b"row");
    }
}
