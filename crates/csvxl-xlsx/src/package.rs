use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use csvxl_model::{Range, Workbook, WorksheetId};

use crate::{read_workbook, read_workbook_from_reader, write_workbook, write_workbook_to_writer, Error};

/// A workbook plus the file it is saved to.
///
/// Packages opened from a path remember it, so [`Package::save`] writes back in
/// place. Packages created in memory or read from a stream are unbound until
/// [`Package::save_as`] is called.
#[derive(Clone, Debug, Default)]
pub struct Package {
    workbook: Workbook,
    path: Option<PathBuf>,
}

impl Package {
    /// An empty, unbound package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing workbook in an unbound package.
    pub fn from_workbook(workbook: Workbook) -> Self {
        Self {
            workbook,
            path: None,
        }
    }

    /// Open `path`, or start an empty package bound to it when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let workbook = if path.exists() {
            read_workbook(path)?
        } else {
            log::debug!("`{}` does not exist; starting an empty package", path.display());
            Workbook::new()
        };
        Ok(Self {
            workbook,
            path: Some(path.to_path_buf()),
        })
    }

    /// Read an `.xlsx` package from a stream. The result is unbound.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, Error> {
        Ok(Self::from_workbook(read_workbook_from_reader(reader)?))
    }

    /// Open `path`, first creating it with a single `sheet_name` worksheet when missing.
    pub fn get_or_create(path: impl AsRef<Path>, sheet_name: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            let mut workbook = Workbook::new();
            workbook.add_sheet(sheet_name)?;
            write_workbook(&workbook, path)?;
            log::debug!("created `{}` with sheet `{sheet_name}`", path.display());
        }
        Self::open(path)
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    /// The file this package saves to, if bound.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Id of the worksheet named `name` (case-insensitive), adding it when missing.
    pub fn get_or_add_worksheet(&mut self, name: &str) -> Result<WorksheetId, Error> {
        Ok(self.workbook.get_or_add_sheet(name)?)
    }

    /// Recalculate formula cells inside `range` of `sheet_id`.
    pub fn calculate(&mut self, sheet_id: WorksheetId, range: Range) -> usize {
        csvxl_calc::calculate_range(&mut self.workbook, sheet_id, range)
    }

    /// Recalculate every formula cell in the workbook.
    pub fn calculate_all(&mut self) -> usize {
        csvxl_calc::calculate_workbook(&mut self.workbook)
    }

    /// Save to the bound path.
    pub fn save(&self) -> Result<(), Error> {
        let path = self.path.as_deref().ok_or(Error::Unbound)?;
        write_workbook(&self.workbook, path)
    }

    /// Save to `path` and bind the package to it.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        write_workbook(&self.workbook, path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Encode the package into `writer` without changing its binding.
    pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        write_workbook_to_writer(&self.workbook, writer)
    }
}
