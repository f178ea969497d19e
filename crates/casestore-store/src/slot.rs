// ABOUTME: Host-provided persistent slot holding the serialized store under one fixed key.
// ABOUTME: FileSlot writes atomically to disk; MemorySlot keeps the bytes in-process.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors raised by a snapshot slot.
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("slot unavailable: {0}")]
    Unavailable(String),
}

/// A single-key persistent byte slot. The store reads it once at
/// initialization and overwrites it after every mutation.
pub trait SnapshotSlot: Send + Sync {
    /// The fixed key the snapshot lives under.
    fn key(&self) -> &str;

    /// Read the stored bytes, or `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<u8>>, SlotError>;

    /// Replace the stored bytes.
    fn store(&self, bytes: &[u8]) -> Result<(), SlotError>;
}

/// Keeps the snapshot in `<dir>/<key>.snapshot.json`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
    key: String,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Full path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.snapshot.json", self.key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotSlot for FileSlot {
    fn key(&self) -> &str {
        &self.key
    }

    fn load(&self) -> Result<Option<Vec<u8>>, SlotError> {
        match fs::read(self.path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SlotError::Io(e)),
        }
    }

    /// Write to a `.tmp` sibling, fsync, then rename over the final path.
    fn store(&self, bytes: &[u8]) -> Result<(), SlotError> {
        fs::create_dir_all(&self.dir)?;

        let tmp_path = self.dir.join(format!("{}.snapshot.tmp", self.key));
        let final_path = self.path();

        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

/// In-process slot for tests and throwaway sessions.
#[derive(Debug)]
pub struct MemorySlot {
    key: String,
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            bytes: Mutex::new(None),
        }
    }

    /// A slot that already holds `bytes`, as if a previous session wrote them.
    pub fn with_bytes(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            bytes: Mutex::new(Some(bytes)),
        }
    }

    /// Copy of the currently stored bytes.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SnapshotSlot for MemorySlot {
    fn key(&self) -> &str {
        &self.key
    }

    fn load(&self) -> Result<Option<Vec<u8>>, SlotError> {
        Ok(self.contents())
    }

    fn store(&self, bytes: &[u8]) -> Result<(), SlotError> {
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_slot_round_trip_and_missing() {
        let dir = TempDir::new().unwrap();
        let slot = FileSlot::new(dir.path().join("nested"), "crm_local_db");

        assert!(slot.load().unwrap().is_none());

        slot.store(b"first").unwrap();
        slot.store(b"second").unwrap();

        assert_eq!(slot.load().unwrap().as_deref(), Some(&b"second"[..]));
        assert!(slot.path().ends_with("crm_local_db.snapshot.json"));
        assert!(!slot.dir().join("crm_local_db.snapshot.tmp").exists());
    }

    #[test]
    fn memory_slot_starts_with_given_bytes() {
        let slot = MemorySlot::with_bytes("k", vec![1, 2, 3]);
        assert_eq!(slot.key(), "k");
        assert_eq!(slot.load().unwrap(), Some(vec![1, 2, 3]));

        slot.store(&[9]).unwrap();
        assert_eq!(slot.contents(), Some(vec![9]));
    }
}
