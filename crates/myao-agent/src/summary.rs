//! On-disk summary snapshot, one flat text file per persona.

use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;

/// Reads and atomically overwrites a persona's summary file
#[derive(Debug)]
pub struct SummaryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Conventional location: `<dir>/<character>-summary.txt`
    pub fn for_character(dir: &Path, character: &str) -> Self {
        Self::new(dir.join(format!("{}-summary.txt", character)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored summary. A missing or blank file is `None`.
    pub fn load(&self) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the summary: write a sibling temp file, then rename over the target.
    pub fn save(&self, summary: &str) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(summary.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), bytes = summary.len(), "saved summary");
        Ok(())
    }
}
