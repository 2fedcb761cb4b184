//! Workbook part, its relationships and the package content types

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::{Package, CONTENT_TYPES_PART};
use crate::xml::{attr, escape_xml, local_name};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub(crate) const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const CT_XML: &str = "application/xml";
const CT_WORKBOOK: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";

const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// A worksheet registered in the workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// Part name inside the package, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

/// Loaded `workbook.xml` text and where its `<sheets>` element sits
#[derive(Debug)]
struct LoadedWorkbookXml {
    text: String,
    sheets_span: (usize, usize),
    /// Namespace prefix of the spreadsheet elements, e.g. `"x:"`
    element_prefix: String,
    /// Prefix bound to the relationships namespace
    rel_prefix: String,
}

/// Sheet list and relationship bookkeeping of one package
#[derive(Debug)]
pub struct Workbook {
    part: String,
    sheets: Vec<SheetEntry>,
    relationships: Vec<Relationship>,
    loaded: Option<LoadedWorkbookXml>,
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self {
            part: DEFAULT_WORKBOOK_PART.to_string(),
            sheets: Vec::new(),
            relationships: Vec::new(),
            loaded: None,
            defaults: vec![
                ("rels".to_string(), CT_RELS.to_string()),
                ("xml".to_string(), CT_XML.to_string()),
            ],
            overrides: Vec::new(),
        }
    }
}

impl Workbook {
    /// Empty workbook for a new package
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the sheet list, relationships and content types of a loaded package
    pub fn parse(package: &Package) -> XlsxResult<Self> {
        let mut workbook = Self::new();

        if let Some(bytes) = package.part(ROOT_RELS_PART)? {
            let office_document = parse_relationships(&bytes)?
                .into_iter()
                .find(|r| r.rel_type == REL_OFFICE_DOCUMENT);
            if let Some(rel) = office_document {
                workbook.part = rel.target.trim_start_matches('/').to_string();
            }
        }

        let rels_part = rels_part_for(&workbook.part);
        if let Some(bytes) = package.part(&rels_part)? {
            workbook.relationships = parse_relationships(&bytes)?;
        }

        let (loaded, sheets) = parse_workbook_xml(&package.required_part(&workbook.part)?)?;
        workbook.loaded = Some(loaded);

        for (name, sheet_id, rel_id) in sheets {
            let part = workbook
                .relationships
                .iter()
                .find(|r| r.id == rel_id)
                .map(|r| workbook.resolve_target(&r.target))
                .ok_or_else(|| {
                    XlsxError::InvalidFormat(format!(
                        "sheet '{}' refers to unknown relationship '{}'",
                        name, rel_id
                    ))
                })?;
            workbook.sheets.push(SheetEntry {
                name,
                sheet_id,
                rel_id,
                part,
            });
        }

        if let Some(bytes) = package.part(CONTENT_TYPES_PART)? {
            let (defaults, overrides) = parse_content_types(&bytes)?;
            workbook.defaults = defaults;
            workbook.overrides = overrides;
        }

        log::debug!(
            "loaded workbook {} with {} sheets",
            workbook.part,
            workbook.sheets.len()
        );
        Ok(workbook)
    }

    /// Registered sheets in workbook order
    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    /// Sheet named `name`; an exact match wins over a case-insensitive one
    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    /// Part name for a new worksheet, unused in both the package and the sheet list
    pub fn next_sheet_part(&self, package: &Package) -> String {
        let dir = self.part_dir();
        (1..)
            .map(|n| format!("{}worksheets/sheet{}.xml", dir, n))
            .find(|p| !package.contains(p) && !self.sheets.iter().any(|s| &s.part == p))
            .unwrap_or_default()
    }

    /// Register a written worksheet at `position` (clamped to the end)
    pub fn add_sheet(&mut self, name: &str, part: &str, position: usize) -> &SheetEntry {
        let sheet_id = self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
        let target = self.relative_target(part);
        let rel_id = self.add_relationship(REL_WORKSHEET, &target);

        let position = position.min(self.sheets.len());
        self.sheets.insert(
            position,
            SheetEntry {
                name: name.to_string(),
                sheet_id,
                rel_id,
                part: part.to_string(),
            },
        );

        log::debug!(
            "registered sheet '{}' (sheetId {}) at position {}",
            name,
            sheet_id,
            position
        );
        &self.sheets[position]
    }

    /// Make sure a relationship of `rel_type` exists, pointing at `part` when
    /// it has to be added; returns its id
    pub fn ensure_relationship(&mut self, rel_type: &str, part: &str) -> String {
        if let Some(rel) = self.relationships.iter().find(|r| r.rel_type == rel_type) {
            return rel.id.clone();
        }
        let target = self.relative_target(part);
        self.add_relationship(rel_type, &target)
    }

    /// Part name of the workbook-level part of `rel_type`, if related
    pub fn related_part(&self, rel_type: &str) -> Option<String> {
        self.relationships
            .iter()
            .find(|r| r.rel_type == rel_type)
            .map(|r| self.resolve_target(&r.target))
    }

    /// Store `workbook.xml`, its relationships, the content types and, for a
    /// new package, the root relationships
    pub fn write_parts(&self, package: &mut Package) {
        package.set_part(self.part.clone(), self.workbook_xml().into_bytes());
        package.set_part(
            rels_part_for(&self.part),
            self.relationships_xml().into_bytes(),
        );
        if !package.contains(ROOT_RELS_PART) {
            package.set_part(ROOT_RELS_PART, self.root_relationships_xml().into_bytes());
        }
        let content_types = self.content_types_xml(package);
        package.set_part(CONTENT_TYPES_PART, content_types.into_bytes());
    }

    fn add_relationship(&mut self, rel_type: &str, target: &str) -> String {
        let id = (1..)
            .map(|n| format!("rId{}", n))
            .find(|id| !self.relationships.iter().any(|r| &r.id == id))
            .unwrap_or_default();
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
        });
        id
    }

    /// Directory of the workbook part, with trailing slash
    fn part_dir(&self) -> &str {
        match self.part.rfind('/') {
            Some(pos) => &self.part[..=pos],
            None => "",
        }
    }

    fn resolve_target(&self, target: &str) -> String {
        match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("{}{}", self.part_dir(), target),
        }
    }

    fn relative_target(&self, part: &str) -> String {
        part.strip_prefix(self.part_dir()).unwrap_or(part).to_string()
    }

    fn sheets_xml(&self, prefix: &str, rel_prefix: &str) -> String {
        let mut xml = format!("<{}sheets>", prefix);
        for sheet in &self.sheets {
            xml.push_str(&format!(
                "<{}sheet name=\"{}\" sheetId=\"{}\" {}id=\"{}\"/>",
                prefix,
                escape_xml(&sheet.name),
                sheet.sheet_id,
                rel_prefix,
                escape_xml(&sheet.rel_id)
            ));
        }
        xml.push_str(&format!("</{}sheets>", prefix));
        xml
    }

    fn workbook_xml(&self) -> String {
        match &self.loaded {
            Some(loaded) => {
                let (start, end) = loaded.sheets_span;
                let mut xml = String::with_capacity(loaded.text.len() + 256);
                xml.push_str(&loaded.text[..start]);
                xml.push_str(&self.sheets_xml(&loaded.element_prefix, &loaded.rel_prefix));
                xml.push_str(&loaded.text[end..]);
                xml
            }
            None => format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{}" xmlns:r="{}"><bookViews><workbookView/></bookViews>{}</workbook>"#,
                MAIN_NS,
                REL_NS,
                self.sheets_xml("", "r:")
            ),
        }
    }

    fn relationships_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!("<Relationships xmlns=\"{}\">", PACKAGE_REL_NS));
        for rel in &self.relationships {
            xml.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
                escape_xml(&rel.id),
                escape_xml(&rel.rel_type),
                escape_xml(&rel.target)
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn root_relationships_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="{}"/></Relationships>"#,
            PACKAGE_REL_NS,
            REL_OFFICE_DOCUMENT,
            escape_xml(&self.part)
        )
    }

    /// Loaded content types plus overrides for every workbook part, dropping
    /// overrides whose part no longer exists
    fn content_types_xml(&self, package: &Package) -> String {
        let mut overrides: Vec<(String, String)> = self
            .overrides
            .iter()
            .filter(|(part, _)| package.contains(part.trim_start_matches('/')))
            .cloned()
            .collect();

        let mut ensure = |part: &str, content_type: &str| {
            let name = format!("/{}", part);
            if !overrides.iter().any(|(p, _)| *p == name) {
                overrides.push((name, content_type.to_string()));
            }
        };
        ensure(&self.part, CT_WORKBOOK);
        for sheet in &self.sheets {
            ensure(&sheet.part, CT_WORKSHEET);
        }
        if let Some(part) = self.related_part(REL_STYLES) {
            ensure(&part, CT_STYLES);
        }
        if let Some(part) = self.related_part(REL_SHARED_STRINGS) {
            ensure(&part, CT_SHARED_STRINGS);
        }

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!("<Types xmlns=\"{}\">", CONTENT_TYPES_NS));
        for (extension, content_type) in &self.defaults {
            xml.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_xml(extension),
                escape_xml(content_type)
            ));
        }
        for (part, content_type) in &overrides {
            xml.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape_xml(part),
                escape_xml(content_type)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
fn rels_part_for(part: &str) -> String {
    match part.rfind('/') {
        Some(pos) => format!("{}_rels/{}.rels", &part[..=pos], &part[pos + 1..]),
        None => format!("_rels/{}.rels", part),
    }
}

fn parse_relationships(bytes: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let id = attr(&e, b"Id");
                let rel_type = attr(&e, b"Type");
                let target = attr(&e, b"Target");
                if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

type SheetRecord = (String, u32, String);

fn parse_workbook_xml(bytes: &[u8]) -> XlsxResult<(LoadedWorkbookXml, Vec<SheetRecord>)> {
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|_| XlsxError::InvalidFormat("workbook part is not UTF-8".into()))?;

    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut span: Option<(usize, usize)> = None;
    let mut sheets_start = None;
    let mut element_prefix = String::new();
    let mut rel_prefix = String::from("r:");
    let mut workbook_end = None;

    loop {
        let before = xml_reader.buffer_position();
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"sheets" => {
                element_prefix = prefix_of(&e);
                sheets_start = Some(before);
            }
            Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"sheets" => {
                element_prefix = prefix_of(&e);
                span = Some((before, xml_reader.buffer_position()));
            }
            Ok(Event::End(e)) if local_name(e.name().as_ref()) == b"sheets" => {
                if let Some(start) = sheets_start.take() {
                    span = Some((start, xml_reader.buffer_position()));
                }
            }
            Ok(Event::End(e)) if local_name(e.name().as_ref()) == b"workbook" => {
                workbook_end = Some(before);
            }
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"sheet" =>
            {
                let mut name = None;
                let mut sheet_id = 0;
                let mut rel_id = None;
                for a in e.attributes().flatten() {
                    let key = a.key.as_ref();
                    match local_name(key) {
                        b"name" => name = a.unescape_value().ok().map(|v| v.into_owned()),
                        b"sheetId" => {
                            sheet_id = a
                                .unescape_value()
                                .ok()
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0)
                        }
                        b"id" if key.contains(&b':') => {
                            rel_prefix = String::from_utf8_lossy(
                                &key[..=key.iter().position(|&b| b == b':').unwrap_or(0)],
                            )
                            .into_owned();
                            rel_id = a.unescape_value().ok().map(|v| v.into_owned());
                        }
                        _ => {}
                    }
                }
                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    sheets.push((name, sheet_id, rel_id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    // A workbook without a <sheets> element gets one inserted before its end tag
    let sheets_span = match (span, workbook_end) {
        (Some(span), _) => span,
        (None, Some(end)) => (end, end),
        (None, None) => {
            return Err(XlsxError::InvalidFormat(
                "workbook part has no <workbook> element".into(),
            ))
        }
    };

    Ok((
        LoadedWorkbookXml {
            text,
            sheets_span,
            element_prefix,
            rel_prefix,
        },
        sheets,
    ))
}

fn prefix_of(e: &BytesStart<'_>) -> String {
    let name = e.name();
    let name = name.as_ref();
    match name.iter().position(|&b| b == b':') {
        Some(pos) => String::from_utf8_lossy(&name[..=pos]).into_owned(),
        None => String::new(),
    }
}

fn parse_content_types(bytes: &[u8]) -> XlsxResult<(Vec<(String, String)>, Vec<(String, String)>)> {
    let mut xml_reader = Reader::from_reader(bytes);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut defaults = Vec::new();
    let mut overrides = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"Default" => {
                    if let (Some(ext), Some(ct)) = (attr(&e, b"Extension"), attr(&e, b"ContentType")) {
                        defaults.push((ext, ct));
                    }
                }
                b"Override" => {
                    if let (Some(part), Some(ct)) = (attr(&e, b"PartName"), attr(&e, b"ContentType")) {
                        overrides.push((part, ct));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok((defaults, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loaded_package() -> Package {
        let mut package = Package::create("unused.xlsx");
        package.set_part(
            CONTENT_TYPES_PART,
            br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#.to_vec(),
        );
        package.set_part(
            ROOT_RELS_PART,
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_vec(),
        );
        package.set_part(
            "xl/workbook.xml",
            br#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <bookViews><workbookView activeTab="0"/></bookViews>
  <sheets><sheet name="Data" sheetId="3" r:id="rId7"/></sheets>
  <definedNames><definedName name="Total">Data!$A$1</definedName></definedNames>
</workbook>"#
                .to_vec(),
        );
        package.set_part(
            "xl/_rels/workbook.xml.rels",
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_vec(),
        );
        package.set_part("xl/worksheets/sheet1.xml", b"<worksheet/>".to_vec());
        package
    }

    #[test]
    fn test_parse_sheets() {
        let package = loaded_package();
        let workbook = Workbook::parse(&package).unwrap();

        assert_eq!(
            workbook.sheets(),
            &[SheetEntry {
                name: "Data".into(),
                sheet_id: 3,
                rel_id: "rId7".into(),
                part: "xl/worksheets/sheet1.xml".into(),
            }]
        );
        assert!(workbook.sheet("data").is_some());
        assert!(workbook.sheet("Other").is_none());
    }

    #[test]
    fn test_add_sheet_keeps_loaded_content() {
        let mut package = loaded_package();
        let mut workbook = Workbook::parse(&package).unwrap();

        let part = workbook.next_sheet_part(&package);
        assert_eq!(part, "xl/worksheets/sheet2.xml");
        package.set_part(part.clone(), b"<worksheet/>".to_vec());

        let entry = workbook.add_sheet("Summary", &part, 0).clone();
        assert_eq!(entry.sheet_id, 4);
        assert_eq!(entry.rel_id, "rId1");
        workbook.ensure_relationship(REL_STYLES, "xl/styles.xml");
        workbook.write_parts(&mut package);

        let xml = String::from_utf8(package.part("xl/workbook.xml").unwrap().unwrap()).unwrap();
        assert!(xml.contains(
            r#"<sheets><sheet name="Summary" sheetId="4" r:id="rId1"/><sheet name="Data" sheetId="3" r:id="rId7"/></sheets>"#
        ));
        assert!(xml.contains("<definedNames>"));
        assert!(xml.contains(r#"<workbookView activeTab="0"/>"#));

        let types =
            String::from_utf8(package.part(CONTENT_TYPES_PART).unwrap().unwrap()).unwrap();
        assert!(types.contains(r#"PartName="/xl/worksheets/sheet2.xml""#));
        assert!(types.contains(r#"PartName="/xl/worksheets/sheet1.xml""#));
        // Override for a part the package does not contain is dropped
        assert!(!types.contains("/docProps/core.xml"));

        let reparsed = Workbook::parse(&package).unwrap();
        let names: Vec<_> = reparsed.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Summary", "Data"]);
        assert_eq!(
            reparsed.related_part(REL_STYLES).as_deref(),
            Some("xl/styles.xml")
        );
    }

    #[test]
    fn test_new_workbook_parts() {
        let mut package = Package::create("unused.xlsx");
        let mut workbook = Workbook::new();
        let part = workbook.next_sheet_part(&package);
        package.set_part(part.clone(), b"<worksheet/>".to_vec());
        workbook.add_sheet("First", &part, 5);
        workbook.write_parts(&mut package);

        assert!(package.contains(ROOT_RELS_PART));
        let reparsed = Workbook::parse(&package).unwrap();
        assert_eq!(reparsed.sheets().len(), 1);
        assert_eq!(reparsed.sheets()[0].sheet_id, 1);
        assert_eq!(reparsed.sheets()[0].part, "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn test_rels_part_for() {
        assert_eq!(rels_part_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_part_for("book.xml"), "_rels/book.xml.rels");
    }
}
