/// Local filesystem backend.
///
/// Maps vault-relative `/`-separated paths onto a root directory on disk.
/// Directory listings are sorted by name so lane and card enumeration order
/// is the same on every platform.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use super::{BoardFs, DirEntry, EntryKind, FileStat, StorageError};

pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a vault path to a path on disk, refusing `..` and absolute segments.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::OutsideVault(path.to_string())),
            }
        }
        Ok(resolved)
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

impl BoardFs for LocalFs {
    fn entry_kind(&self, path: &str) -> Option<EntryKind> {
        let resolved = self.resolve(path).ok()?;
        let meta = fs::metadata(resolved).ok()?;
        if meta.is_dir() {
            Some(EntryKind::Dir)
        } else if meta.is_file() {
            Some(EntryKind::File)
        } else {
            None
        }
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
        let resolved = self.resolve(path)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(resolved)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            // Follow symlinks like the rest of the backend does.
            let kind = match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_dir() => EntryKind::Dir,
                Ok(meta) if meta.is_file() => EntryKind::File,
                _ => continue,
            };
            entries.push(DirEntry { name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_to_string(&self, path: &str) -> Result<String, StorageError> {
        Ok(fs::read_to_string(self.resolve(path)?)?)
    }

    fn stat(&self, path: &str) -> Result<FileStat, StorageError> {
        let meta = fs::metadata(self.resolve(path)?)?;
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        // Not every filesystem records a birth time.
        let created = meta.created().unwrap_or(modified);
        Ok(FileStat {
            created: to_utc(created),
            modified: to_utc(modified),
        })
    }

    fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        fs::create_dir_all(self.resolve(path)?)?;
        Ok(())
    }

    fn write_new(&self, path: &str, content: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(path)?)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn write(&self, path: &str, content: &str) -> Result<(), StorageError> {
        // In place rather than tmp+rename: the card's birth time is its creation date.
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.resolve(path)?)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        fs::rename(self.resolve(from)?, self.resolve(to)?)?;
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), StorageError> {
        fs::remove_file(self.resolve(path)?)?;
        Ok(())
    }

    fn remove_dir_all(&self, path: &str) -> Result<(), StorageError> {
        fs::remove_dir_all(self.resolve(path)?)?;
        Ok(())
    }
}

/// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let tmp_path = path.with_extension("taskboard.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    // fsync directory for rename durability
    if let Some(dir) = path.parent() {
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}
