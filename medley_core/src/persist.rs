//! Locked, atomic JSON file persistence.
//!
//! Shared by the record store and the file-backed notification facility.
//! Reads take a shared lock; writes go to a locked temp file in the same
//! directory which is synced and renamed over the target.
//!
//! The rename replaces the document's inode, so a load-modify-save
//! sequence is serialized with [`exclusive_lock`] on a `<file>.lock`
//! sidecar that is never replaced.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Load a JSON document with shared locking
///
/// Returns `None` if the file doesn't exist.
/// Open, lock and read failures are returned as IO errors.
pub fn read_locked(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let mut reader = std::io::BufReader::new(&file);
    if let Err(e) = reader.read_to_string(&mut contents) {
        let _ = file.unlock();
        return Err(Error::Io(e));
    }

    file.unlock()?;
    Ok(Some(contents))
}

/// Exclusive hold on a document's sidecar lock file, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release lock {:?}: {}", self.path, e);
        }
    }
}

/// Sidecar lock path for a document (`medications.json.lock`)
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

/// Block until the document's sidecar lock is held exclusively
///
/// Hold the returned guard across the whole load-modify-save sequence.
pub fn exclusive_lock(path: &Path) -> Result<FileLock> {
    let lock_path = lock_path_for(path);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    file.lock_exclusive()?;
    tracing::trace!("Locked {:?}", lock_path);

    Ok(FileLock {
        file,
        path: lock_path,
    })
}

/// Load and parse a JSON document, tolerating corruption
///
/// Missing files yield the default value. A file that fails to parse is
/// logged and also yields the default, so a damaged document never blocks
/// the application from starting.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let contents = match read_locked(path)? {
        Some(contents) => contents,
        None => {
            tracing::debug!("No file at {:?}, using default", path);
            return Ok(T::default());
        }
    };

    if contents.trim().is_empty() {
        return Ok(T::default());
    }

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => {
            tracing::debug!("Loaded {:?}", path);
            Ok(value)
        }
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
            Ok(T::default())
        }
    }
}

/// Save a JSON document atomically with exclusive locking
///
/// Atomically writes by:
/// 1. Writing to a temp file in the target directory
/// 2. Syncing to disk
/// 3. Renaming over the original
pub fn save_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "path missing parent directory")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}
