use crate::error::SourceError;
use crate::message::Message;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Index-addressed view of a mailbox.
///
/// Indices are only meaningful until the next `count()`; a mailbox may
/// reorder underneath the reader, in which case `read` returns
/// [`SourceError::NotFound`] and the caller skips the index.
pub trait MessageSource: Send {
    fn count(&mut self) -> Result<usize, SourceError>;
    fn read(&mut self, index: usize) -> Result<Message, SourceError>;
}

/// Reads messages from a spool directory of `*.json` files, one serialized
/// [`Message`] per file.
///
/// Index 0 is the newest message: files are ordered by name, descending, so
/// time-stamped names put fresh arrivals inside a sweep's window.
pub struct SpoolSource {
    dir: PathBuf,
    entries: Vec<PathBuf>,
}

impl SpoolSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<Vec<PathBuf>, SourceError> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| {
            SourceError::Unavailable(format!("{}: {e}", self.dir.display()))
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| SourceError::Unavailable(e.to_string()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                entries.push(path);
            }
        }
        entries.sort_by(|a, b| b.cmp(a));
        Ok(entries)
    }
}

impl MessageSource for SpoolSource {
    fn count(&mut self) -> Result<usize, SourceError> {
        self.entries = self.scan()?;
        Ok(self.entries.len())
    }

    fn read(&mut self, index: usize) -> Result<Message, SourceError> {
        let path = self.entries.get(index).ok_or(SourceError::NotFound(index))?;
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(index),
            _ => SourceError::Unavailable(format!("{}: {e}", path.display())),
        })?;

        serde_json::from_str(&content).map_err(|e| SourceError::Malformed {
            index,
            reason: format!("{}: {e}", path.display()),
        })
    }
}
