//! OPC package
//!
//! An opened archive stays on disk: parts are read from their zip entries on
//! demand, and only the parts replaced or added since opening are held by the
//! package (small parts as bytes, worksheets as spooled temp files). Saving
//! raw-copies every untouched entry into a temp file next to the target and
//! moves it into place.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{XlsxError, XlsxResult};

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Content of a part staged since opening
enum StagedPart {
    Bytes(Vec<u8>),
    Spooled(NamedTempFile),
}

/// One `.xlsx` archive addressed by part name (`xl/workbook.xml`)
#[derive(Default)]
pub struct Package {
    path: PathBuf,
    archive: Option<RefCell<ZipArchive<File>>>,
    /// Entry names of the opened archive, in archive order
    entries: Vec<String>,
    staged: BTreeMap<String, StagedPart>,
    existed: bool,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("entries", &self.entries)
            .field("staged", &self.staged.keys().collect::<Vec<_>>())
            .field("existed", &self.existed)
            .finish()
    }
}

impl Package {
    /// Open the archive at `path`, reading only its central directory
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let path = path.as_ref();
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            entries.push(archive.by_index_raw(i)?.name().to_string());
        }
        if !entries.iter().any(|name| name == CONTENT_TYPES_PART) {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        log::debug!("opened {} with {} entries", path.display(), entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(RefCell::new(archive)),
            entries,
            staged: BTreeMap::new(),
            existed: true,
        })
    }

    /// Start an empty package that will be saved to `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Open `path` when it exists, otherwise start an empty package for it
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Ok(Self::create(path))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the package was loaded from an existing file
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Whole bytes of a part. Meant for the small workbook-level parts;
    /// worksheets go through [`Package::open_part`].
    pub fn part(&self, name: &str) -> XlsxResult<Option<Vec<u8>>> {
        match self.open_part(name)? {
            Some(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Bytes of a part that must be present
    pub fn required_part(&self, name: &str) -> XlsxResult<Vec<u8>> {
        self.part(name)?
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    /// Buffered reader over a part.
    ///
    /// An archive entry is inflated into an anonymous temp file first, so the
    /// reader does not borrow the archive and memory stays bounded by the
    /// buffer size.
    pub fn open_part(&self, name: &str) -> XlsxResult<Option<Box<dyn BufRead>>> {
        if let Some(staged) = self.staged.get(name) {
            let reader: Box<dyn BufRead> = match staged {
                StagedPart::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
                StagedPart::Spooled(file) => Box::new(BufReader::new(file.reopen()?)),
            };
            return Ok(Some(reader));
        }

        let Some(archive) = self.archive.as_ref() else {
            return Ok(None);
        };
        if !self.entries.iter().any(|entry| entry == name) {
            return Ok(None);
        }

        let mut archive = archive.borrow_mut();
        let mut entry = archive.by_name(name)?;
        let mut spool = tempfile::tempfile()?;
        io::copy(&mut entry, &mut spool)?;
        spool.rewind()?;
        Ok(Some(Box::new(BufReader::new(spool))))
    }

    /// Like [`Package::open_part`] for a part that must be present
    pub fn open_required_part(&self, name: &str) -> XlsxResult<Box<dyn BufRead>> {
        self.open_part(name)?
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    pub fn set_part<S: Into<String>>(&mut self, name: S, bytes: Vec<u8>) {
        self.staged.insert(name.into(), StagedPart::Bytes(bytes));
    }

    /// Stage a part whose content lives in a temp file
    pub fn set_part_file<S: Into<String>>(&mut self, name: S, file: NamedTempFile) {
        self.staged.insert(name.into(), StagedPart::Spooled(file));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.staged.contains_key(name) || self.entries.iter().any(|entry| entry == name)
    }

    /// Archive entries in archive order, then parts added since opening
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        let added = self
            .staged
            .keys()
            .filter(|name| !self.entries.contains(*name));
        self.entries.iter().chain(added).map(String::as_str)
    }

    /// Write the archive to a temp file beside the target, then move it over
    /// the target and reopen it
    pub fn save(&mut self) -> XlsxResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir)?;
        let tmp = self
            .write(BufWriter::new(tmp))?
            .into_inner()
            .map_err(|e| XlsxError::Io(e.into_error()))?;

        tmp.persist(&self.path).map_err(|e| XlsxError::Io(e.error))?;

        log::debug!(
            "saved {} parts to {}",
            self.part_names().count(),
            self.path.display()
        );

        // Staged temp files are released with the old state
        *self = Self::open(&self.path)?;
        Ok(())
    }

    /// Write the archive, content types first. Untouched entries are copied
    /// without recompressing.
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<W> {
        let mut zip = ZipWriter::new(writer);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        self.copy_part(&mut zip, CONTENT_TYPES_PART, options)?;
        for name in self.part_names().filter(|n| *n != CONTENT_TYPES_PART) {
            self.copy_part(&mut zip, name, options)?;
        }

        let mut inner = zip.finish()?;
        inner.flush()?;
        Ok(inner)
    }

    fn copy_part<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        name: &str,
        options: SimpleFileOptions,
    ) -> XlsxResult<()> {
        match self.staged.get(name) {
            Some(StagedPart::Bytes(bytes)) => {
                zip.start_file(name, options)?;
                zip.write_all(bytes)?;
            }
            Some(StagedPart::Spooled(file)) => {
                zip.start_file(name, options)?;
                io::copy(&mut BufReader::new(file.reopen()?), zip)?;
            }
            None => {
                let Some(archive) = self.archive.as_ref() else {
                    return Ok(());
                };
                let Some(index) = self.entries.iter().position(|entry| entry == name) else {
                    return Ok(());
                };
                zip.raw_copy_file(archive.borrow_mut().by_index_raw(index)?)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut package = Package::open_or_create(&path).unwrap();
        assert!(!package.existed());
        package.set_part(CONTENT_TYPES_PART, b"<Types/>".to_vec());
        package.set_part("xl/workbook.xml", b"<workbook/>".to_vec());
        package.save().unwrap();
        assert!(package.existed());

        let reopened = Package::open_or_create(&path).unwrap();
        assert!(reopened.existed());
        assert_eq!(
            reopened.part("xl/workbook.xml").unwrap(),
            Some(b"<workbook/>".to_vec())
        );
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_untouched_entries_copied_and_staged_parts_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_zip(
            &path,
            &[
                (CONTENT_TYPES_PART, b"<Types/>"),
                ("xl/worksheets/sheet1.xml", b"<worksheet>old</worksheet>"),
                ("docProps/custom.xml", b"<Properties/>"),
            ],
        );

        let mut package = Package::open(&path).unwrap();
        let mut spool = NamedTempFile::new().unwrap();
        spool.write_all(b"<worksheet>new</worksheet>").unwrap();
        package.set_part_file("xl/worksheets/sheet1.xml", spool);
        package.set_part("xl/worksheets/sheet2.xml", b"<worksheet/>".to_vec());
        package.save().unwrap();

        let reopened = Package::open(&path).unwrap();
        assert_eq!(
            reopened.part_names().collect::<Vec<_>>(),
            vec![
                CONTENT_TYPES_PART,
                "xl/worksheets/sheet1.xml",
                "docProps/custom.xml",
                "xl/worksheets/sheet2.xml",
            ]
        );
        assert_eq!(
            reopened.part("xl/worksheets/sheet1.xml").unwrap(),
            Some(b"<worksheet>new</worksheet>".to_vec())
        );
        assert_eq!(
            reopened.part("docProps/custom.xml").unwrap(),
            Some(b"<Properties/>".to_vec())
        );
    }

    #[test]
    fn test_open_part_streams_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let rows = "<row/>".repeat(10_000);
        write_zip(
            &path,
            &[
                (CONTENT_TYPES_PART, b"<Types/>"),
                ("xl/worksheets/sheet1.xml", rows.as_bytes()),
            ],
        );

        let package = Package::open(&path).unwrap();
        let mut reader = package.open_part("xl/worksheets/sheet1.xml").unwrap().unwrap();
        let mut first = String::new();
        reader.by_ref().take(6).read_to_string(&mut first).unwrap();
        assert_eq!(first, "<row/>");
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), rows.len() - 6);
        assert!(package.open_part("xl/missing.xml").unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.zip");
        write_zip(&path, &[("readme.txt", b"hello")]);
        assert!(matches!(
            Package::open(&path),
            Err(XlsxError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_missing_required_part() {
        let package = Package::create("unused.xlsx");
        assert!(matches!(
            package.required_part("xl/workbook.xml"),
            Err(XlsxError::MissingPart(_))
        ));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = Package::create(dir.path().join("absent").join("book.xlsx"));
        package.set_part(CONTENT_TYPES_PART, b"<Types/>".to_vec());
        assert!(matches!(package.save(), Err(XlsxError::Io(_))));
        assert!(package.contains(CONTENT_TYPES_PART));
    }
}
