use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

use super::table::HistoryTable;
use crate::error::{Error, Result};

/// The on-disk home of the history CSV. Read once at the start of a run and
/// written once at the end.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored table, or an empty one when no file exists yet.
    #[instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<HistoryTable> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no history file yet; starting empty");
                return Ok(HistoryTable::new());
            }
            Err(source) => {
                return Err(Error::Io {
                    action: "reading history",
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let table = HistoryTable::from_csv(&self.path.display().to_string(), &bytes)?;
        info!(
            months = table.months().count(),
            practices = table.practices().count(),
            "loaded history"
        );
        Ok(table)
    }

    /// Replace the file with `table`. The CSV is written to `<file>.tmp` and
    /// renamed into place, so readers never see a half-written file.
    #[instrument(level = "info", skip(self, table), fields(path = %self.path.display()))]
    pub fn save(&self, table: &HistoryTable) -> Result<()> {
        let bytes = table.to_csv()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err("creating directory", parent))?;
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        fs::write(&tmp, &bytes).map_err(io_err("writing", &tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err("renaming into", &self.path))?;
        info!(bytes = bytes.len(), "wrote history");
        Ok(())
    }
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::Io {
        action,
        path,
        source,
    }
}
