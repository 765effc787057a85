//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure, plus the
//! lock helpers shared by every repository.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{EnvelopeError, EnvelopeResult};

fn open_reader(path: &Path) -> EnvelopeResult<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| EnvelopeError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;
    Ok(BufReader::new(file))
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> EnvelopeResult<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(T::default());
    }
    read_json_required(path)
}

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> EnvelopeResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(EnvelopeError::Storage(format!(
            "File not found: {}",
            path.display()
        )));
    }

    serde_json::from_reader(open_reader(path)?)
        .map_err(|e| EnvelopeError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> EnvelopeResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            EnvelopeError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file must live in the same directory for the rename to be atomic
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| EnvelopeError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| EnvelopeError::Storage(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| EnvelopeError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| EnvelopeError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        EnvelopeError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Acquire a read guard, mapping lock poisoning to a storage error
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> EnvelopeResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire read lock: {}", e)))
}

/// Acquire a write guard, mapping lock poisoning to a storage error
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> EnvelopeResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire write lock: {}", e)))
}
