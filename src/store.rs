use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::SampleKey;
use crate::error::CardLiveError;

/// Source of raw sample records addressed by a stable key.
pub trait RecordStore: Send + Sync {
    /// All available keys, sorted.
    fn list(&self) -> Result<Vec<SampleKey>, CardLiveError>;
    fn read(&self, key: &SampleKey) -> Result<Vec<u8>, CardLiveError>;
}

/// One file per record in a flat directory; the file name is the sample key.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: Utf8PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn record_path(&self, key: &SampleKey) -> Utf8PathBuf {
        self.root.join(key.as_str())
    }
}

impl RecordStore for DirectoryStore {
    fn list(&self) -> Result<Vec<SampleKey>, CardLiveError> {
        if !self.root.as_std_path().is_dir() {
            return Err(CardLiveError::MissingDataDirectory(
                self.root.as_std_path().to_path_buf(),
            ));
        }
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                debug!(path = %path.display(), "skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match name.parse::<SampleKey>() {
                Ok(key) => keys.push(key),
                Err(err) => debug!(name, error = %err, "skipping file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn read(&self, key: &SampleKey) -> Result<Vec<u8>, CardLiveError> {
        let path = self.record_path(key);
        fs::read(path.as_std_path())
            .map_err(|err| CardLiveError::Filesystem(format!("read {path}: {err}")))
    }
}
