//! Attachment blob storage.
//!
//! Redmine keeps attachment content on disk under its `files/` directory;
//! only metadata lives in the database. The sink is a trait so preview runs
//! and tests can swap the filesystem out.

use crate::error::Result;
use std::path::PathBuf;

/// Destination for attachment content.
pub trait BlobSink: Send + Sync {
    /// Store one blob under its disk filename. Returns the stored size.
    fn put(&self, disk_filename: &str, content: &[u8]) -> Result<u64>;
}

/// Writes blobs into a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct FsBlobSink {
    dir: PathBuf,
}

impl FsBlobSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BlobSink for FsBlobSink {
    fn put(&self, disk_filename: &str, content: &[u8]) -> Result<u64> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(disk_filename), content)?;
        Ok(content.len() as u64)
    }
}

/// Counts blobs without storing them. Used by preview runs.
#[derive(Debug, Default, Clone)]
pub struct DiscardBlobSink;

impl BlobSink for DiscardBlobSink {
    fn put(&self, _disk_filename: &str, content: &[u8]) -> Result<u64> {
        Ok(content.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_sink_writes_blob() {
        let dir = TempDir::new().unwrap();
        let sink = FsBlobSink::new(dir.path().join("files"));
        let size = sink.put("250101120000_report.pdf", b"content").unwrap();
        assert_eq!(size, 7);
        let stored = std::fs::read(dir.path().join("files/250101120000_report.pdf")).unwrap();
        assert_eq!(stored, b"content");
    }

    #[test]
    fn test_discard_sink_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = DiscardBlobSink;
        assert_eq!(sink.put("x.bin", b"abc").unwrap(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
