//! Loaded workbook state shared by the worksheet cursors

use std::path::Path;

use crate::error::XlsxResult;
use crate::package::Package;
use crate::shared_strings::SharedStringTable;
use crate::styles::StyleTable;
use crate::workbook::{Workbook, REL_SHARED_STRINGS, REL_STYLES};

const DEFAULT_STYLES_PART: &str = "xl/styles.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// A package plus the workbook-wide tables decoded from it
#[derive(Debug)]
pub struct Document {
    pub(crate) package: Package,
    pub(crate) workbook: Workbook,
    pub(crate) styles: StyleTable,
    pub(crate) shared_strings: SharedStringTable,
}

impl Document {
    /// Load `path`, or start a new workbook with the default styles when it
    /// does not exist
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let package = Package::open_or_create(path)?;
        if !package.existed() {
            return Ok(Self {
                package,
                workbook: Workbook::new(),
                styles: StyleTable::with_defaults(),
                shared_strings: SharedStringTable::new(),
            });
        }

        let workbook = Workbook::parse(&package)?;

        let styles = match workbook.related_part(REL_STYLES) {
            Some(part) => match package.open_part(&part)? {
                Some(reader) => StyleTable::parse(reader)?,
                None => StyleTable::with_defaults(),
            },
            None => StyleTable::with_defaults(),
        };

        let shared_strings = match workbook.related_part(REL_SHARED_STRINGS) {
            Some(part) => match package.open_part(&part)? {
                Some(reader) => SharedStringTable::parse(reader)?,
                None => SharedStringTable::new(),
            },
            None => SharedStringTable::new(),
        };

        Ok(Self {
            package,
            workbook,
            styles,
            shared_strings,
        })
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn shared_strings(&self) -> &SharedStringTable {
        &self.shared_strings
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Store the workbook-wide parts and write the archive
    ///
    /// The shared-string part is only rewritten when strings were added.
    pub fn save(&mut self) -> XlsxResult<()> {
        if self.shared_strings.is_modified() {
            let part = self
                .workbook
                .related_part(REL_SHARED_STRINGS)
                .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
            self.package
                .set_part(part.clone(), self.shared_strings.to_xml().into_bytes());
            self.workbook.ensure_relationship(REL_SHARED_STRINGS, &part);
        }

        let part = self
            .workbook
            .related_part(REL_STYLES)
            .unwrap_or_else(|| DEFAULT_STYLES_PART.to_string());
        self.package
            .set_part(part.clone(), self.styles.to_xml().into_bytes());
        self.workbook.ensure_relationship(REL_STYLES, &part);

        self.workbook.write_parts(&mut self.package);
        self.package.save()
    }
}
