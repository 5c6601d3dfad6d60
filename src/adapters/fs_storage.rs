//! SD-card log storage adapter.
//!
//! Implements [`StoragePort`] over `std::fs` rooted at the card's mount
//! point.  On the device the FAT volume is mounted under VFS (at
//! [`SD_MOUNT_POINT`]) before this adapter is built; on the host any
//! directory stands in for the card.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::{LogFile, StorageError, StoragePort, StoredFile};

/// VFS mount point of the card on the device.
pub const SD_MOUNT_POINT: &str = "/sd";

pub struct SdStorage {
    root: PathBuf,
}

impl SdStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl StoragePort for SdStorage {
    fn is_present(&self) -> bool {
        fs::metadata(&self.root).is_ok_and(|m| m.is_dir())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn open_append(&mut self, path: &str) -> Result<Box<dyn LogFile>, StorageError> {
        if !self.is_present() {
            return Err(StorageError::NotPresent);
        }
        let full = self.resolve(path);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .map_err(|e| {
                warn!("SD: open {} failed: {}", full.display(), e);
                StorageError::OpenFailed
            })?;
        debug!("SD: opened {}", full.display());
        Ok(Box::new(SdLogFile {
            writer: BufWriter::new(file),
        }))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        if !self.is_present() {
            return Err(StorageError::NotPresent);
        }
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::ReadFailed,
        })
    }

    fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        if !self.is_present() {
            return Err(StorageError::NotPresent);
        }
        let entries = fs::read_dir(&self.root).map_err(|e| {
            warn!("SD: list {} failed: {}", self.root.display(), e);
            StorageError::ReadFailed
        })?;
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_file() {
                files.push(StoredFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                });
            }
        }
        Ok(files)
    }
}

struct SdLogFile {
    writer: BufWriter<File>,
}

impl LogFile for SdLogFile {
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.writer.write_all(data).map_err(|_| StorageError::WriteFailed)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.writer.flush().map_err(|_| StorageError::WriteFailed)
    }

    fn close(mut self: Box<Self>) -> Result<(), StorageError> {
        self.writer.flush().map_err(|_| StorageError::WriteFailed)?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|_| StorageError::WriteFailed)
    }
}
