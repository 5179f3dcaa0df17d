//! Destinations for rendered reports

use std::cell::RefCell;

use async_trait::async_trait;

use crate::error::ChecklistError;

/// Receives a fully rendered document
#[async_trait(?Send)]
pub trait DocumentSink {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), ChecklistError>;
}

/// Keeps saved documents in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: RefCell<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents saved so far, oldest first
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.borrow().clone()
    }

    pub fn last(&self) -> Option<(String, Vec<u8>)> {
        self.saved.borrow().last().cloned()
    }
}

#[async_trait(?Send)]
impl DocumentSink for MemorySink {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), ChecklistError> {
        self.saved.borrow_mut().push((filename.to_string(), bytes));
        Ok(())
    }
}

/// Writes documents into a directory
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: std::path::PathBuf,
}

#[cfg(feature = "native")]
impl FileSink {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[cfg(feature = "native")]
#[async_trait(?Send)]
impl DocumentSink for FileSink {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), ChecklistError> {
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ChecklistError::Sink(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Saved report to {}", path.display());
        Ok(())
    }
}
