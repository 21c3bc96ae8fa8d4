// src/source.rs

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, Cursor},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{Error, Result};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Something a reader can open at position zero, any number of times.
pub trait Source: Send + fmt::Debug {
    fn open(&self) -> Result<Box<dyn BufRead + Send>>;

    /// Display name used in logs and errors.
    fn name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        let file = File::open(&self.path).map_err(|e| Error::io(self.name(), e))?;
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Bytes held in memory; cheap to reopen.
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// `Cursor` over a shared slice, so each open reads from the start.
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Source for MemorySource {
    fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(Cursor::new(SharedBytes(Arc::clone(&self.bytes)))))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
