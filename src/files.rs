//! Macro file storage (the dongle's SD card).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Most files a listing returns.
pub const MAX_LISTED_FILES: usize = 15;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: \"{0}\"")]
    InvalidName(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait FileStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, FileError>;

    /// Create or truncate.
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), FileError>;

    /// Append, creating the file if needed.
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError>;

    /// Every file name in the store, unordered.
    fn list(&self) -> Result<Vec<String>, FileError>;

    fn exists(&self, name: &str) -> bool;
}

/// Normalize a user-supplied macro name: trimmed, `.txt` appended when
/// missing. Path separators and `..` are rejected.
pub fn macro_file_name(name: &str) -> Result<String, FileError> {
    let name = name.trim();
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(char::is_control)
    {
        return Err(FileError::InvalidName(name.to_string()));
    }
    if name.to_ascii_lowercase().ends_with(".txt") {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.txt"))
    }
}

fn stem(name: &str) -> &str {
    name.len()
        .checked_sub(4)
        .filter(|&i| name.is_char_boundary(i))
        .map_or(name, |i| &name[..i])
}

/// All-digit names compare numerically, anything else lexicographically.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let (sa, sb) = (stem(a), stem(b));
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(sa) && numeric(sb) {
        let trimmed = |s: &str| s.trim_start_matches('0').len();
        trimmed(sa)
            .cmp(&trimmed(sb))
            .then_with(|| sa.trim_start_matches('0').cmp(sb.trim_start_matches('0')))
            .then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// `.txt` files, sorted, at most [`MAX_LISTED_FILES`].
pub fn list_text_files(files: &dyn FileStore) -> Result<Vec<String>, FileError> {
    let mut names: Vec<String> = files
        .list()?
        .into_iter()
        .filter(|n| n.to_ascii_lowercase().ends_with(".txt"))
        .collect();
    names.sort_by(|a, b| compare_names(a, b));
    names.truncate(MAX_LISTED_FILES);
    Ok(names)
}

/// Files in a host directory.
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    /// Use `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FileError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!("Macro files in {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, FileError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(FileError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

impl FileStore for DirFileStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, FileError> {
        match std::fs::read(self.path(name)?) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FileError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        std::fs::write(self.path(name)?, data)?;
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)?;
        file.write_all(data)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, FileError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|p| p.is_file())
    }
}

/// In-memory files. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file (builder style, for tests and demos).
    pub fn with_file(self, name: &str, content: &str) -> Self {
        self.files
            .lock()
            .insert(name.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn contents(&self, name: &str) -> Option<String> {
        self.files
            .lock()
            .get(name)
            .map(|d| String::from_utf8_lossy(d).into_owned())
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, FileError> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| FileError::NotFound(name.to_string()))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        self.files.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        self.files
            .lock()
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, FileError> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }
}
