//! Spreadsheet facade
//!
//! Owns one package for its whole lifetime and hands out worksheet cursors.
//! Class maps are built and validated once per mapper type.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use sheetmap_core::{validate, ClassMap, ClassMapper, Error, WorksheetStyle, MAX_SHEET_NAME_LEN};

use crate::document::Document;
use crate::error::{XlsxError, XlsxResult};
use crate::reader::WorksheetReader;
use crate::writer::WorksheetWriter;

const INVALID_SHEET_NAME_CHARS: [char; 7] = ['\\', '/', '*', '?', ':', '[', ']'];

/// An `.xlsx` file opened for reading and writing worksheets
///
/// ```no_run
/// use sheetmap_core::{field, ClassMap, ClassMapper, WorksheetStyle};
/// use sheetmap_xlsx::Spreadsheet;
///
/// #[derive(Default)]
/// struct Person { name: String, age: u32 }
///
/// struct PersonMap;
///
/// impl ClassMapper for PersonMap {
///     type Record = Person;
///
///     fn configure(map: &mut ClassMap<Person>) {
///         map.map(field!(Person, name)).name("Name");
///         map.map(field!(Person, age)).name("Age");
///     }
/// }
///
/// # fn main() -> sheetmap_xlsx::XlsxResult<()> {
/// let mut spreadsheet = Spreadsheet::open_or_create("people.xlsx")?;
/// let people = vec![Person { name: "Ada".into(), age: 36 }];
/// spreadsheet.write_worksheet::<PersonMap, _>("People", &people, WorksheetStyle::default())?;
/// let read = spreadsheet.read_worksheet::<PersonMap>("People", 1)?;
/// assert_eq!(read.len(), 1);
/// spreadsheet.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Spreadsheet {
    doc: Document,
    /// Lower-cased names of existing and pending sheets
    sheet_names: AHashSet<String>,
    class_maps: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
    closed: bool,
}

impl Spreadsheet {
    /// Open `path`, or prepare a new workbook there when it does not exist
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let doc = Document::open_or_create(path)?;
        let sheet_names = doc
            .workbook()
            .sheets()
            .iter()
            .map(|s| s.name.to_lowercase())
            .collect();

        Ok(Self {
            doc,
            sheet_names,
            class_maps: RefCell::new(AHashMap::new()),
            closed: false,
        })
    }

    /// Path the workbook is saved to
    pub fn path(&self) -> &Path {
        self.doc.package().path()
    }

    /// Names of the registered worksheets in workbook order
    pub fn worksheet_names(&self) -> Vec<&str> {
        self.doc
            .workbook()
            .sheets()
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Open a reader over worksheet `name`
    ///
    /// `header_row_index` is the 1-based header row, `0` when the sheet has none.
    pub fn create_worksheet_reader<M>(
        &self,
        name: &str,
        header_row_index: u32,
    ) -> XlsxResult<WorksheetReader<'_, M::Record>>
    where
        M: ClassMapper,
        M::Record: Default,
    {
        let class_map = self.class_map::<M>()?;
        let entry = self
            .doc
            .workbook()
            .sheet(name)
            .ok_or_else(|| XlsxError::WorksheetNotFound(name.to_string()))?;
        let part = self.doc.package().open_required_part(&entry.part)?;

        WorksheetReader::new(part, self.doc.shared_strings(), class_map, header_row_index)
    }

    /// Start a new worksheet after the existing ones
    pub fn create_worksheet_writer<M: ClassMapper>(
        &mut self,
        name: &str,
        style: WorksheetStyle,
    ) -> XlsxResult<WorksheetWriter<'_, M::Record>> {
        let position = self.doc.workbook().sheets().len();
        self.create_worksheet_writer_at::<M>(name, position, style)
    }

    /// Start a new worksheet at `position` in the sheet order
    ///
    /// Fails with [`XlsxError::Closed`] once the spreadsheet has been closed.
    pub fn create_worksheet_writer_at<M: ClassMapper>(
        &mut self,
        name: &str,
        position: usize,
        style: WorksheetStyle,
    ) -> XlsxResult<WorksheetWriter<'_, M::Record>> {
        if self.closed {
            return Err(XlsxError::Closed);
        }
        let class_map = self.class_map::<M>()?;
        self.add_sheet_name(name)?;
        WorksheetWriter::new(&mut self.doc, class_map, name, position, style)
    }

    /// Read every record of worksheet `name`
    pub fn read_worksheet<M>(&self, name: &str, header_row_index: u32) -> XlsxResult<Vec<M::Record>>
    where
        M: ClassMapper,
        M::Record: Default,
    {
        self.create_worksheet_reader::<M>(name, header_row_index)?
            .read_rows()
    }

    /// Write `records` to a new worksheet after the existing ones
    pub fn write_worksheet<'r, M, I>(
        &mut self,
        name: &str,
        records: I,
        style: WorksheetStyle,
    ) -> XlsxResult<()>
    where
        M: ClassMapper,
        I: IntoIterator<Item = &'r M::Record>,
    {
        let position = self.doc.workbook().sheets().len();
        self.write_worksheet_at::<M, I>(name, position, records, style)
    }

    /// Write `records` to a new worksheet at `position`
    ///
    /// The sheet is finished even when a record fails to convert.
    pub fn write_worksheet_at<'r, M, I>(
        &mut self,
        name: &str,
        position: usize,
        records: I,
        style: WorksheetStyle,
    ) -> XlsxResult<()>
    where
        M: ClassMapper,
        I: IntoIterator<Item = &'r M::Record>,
    {
        let mut writer = self.create_worksheet_writer_at::<M>(name, position, style)?;
        let written = writer.write_records(records);
        let finished = writer.finish();
        written.and(finished)
    }

    /// Save the workbook; later calls do nothing
    ///
    /// A failed save leaves the spreadsheet open so the call can be retried.
    pub fn close(&mut self) -> XlsxResult<()> {
        if self.closed {
            return Ok(());
        }
        self.doc.save()?;
        self.closed = true;
        Ok(())
    }

    /// Built and validated class map of mapper `M`
    fn class_map<M: ClassMapper>(&self) -> XlsxResult<Rc<ClassMap<M::Record>>> {
        let key = TypeId::of::<M>();
        if let Some(cached) = self.class_maps.borrow().get(&key) {
            if let Ok(map) = Rc::clone(cached).downcast::<ClassMap<M::Record>>() {
                return Ok(map);
            }
        }

        let map = M::build();
        let errors = validate(&map);
        if !errors.is_empty() {
            return Err(Error::Configuration {
                class_map: map.name(),
                errors,
            }
            .into());
        }

        let map = Rc::new(map);
        self.class_maps
            .borrow_mut()
            .insert(key, Rc::clone(&map) as Rc<dyn Any>);
        Ok(map)
    }

    fn add_sheet_name(&mut self, name: &str) -> XlsxResult<()> {
        validate_sheet_name(name)?;
        if !self.sheet_names.insert(name.to_lowercase()) {
            return Err(Error::DuplicateSheetName(name.to_string()).into());
        }
        Ok(())
    }
}

impl Drop for Spreadsheet {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!(
                "failed to save spreadsheet {}: {}",
                self.doc.package().path().display(),
                e
            );
        }
    }
}

fn validate_sheet_name(name: &str) -> XlsxResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some("name is longer than 31 characters")
    } else if name.contains(&INVALID_SHEET_NAME_CHARS[..]) {
        Some("name contains one of \\ / * ? : [ ]")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidSheetName {
            name: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}
