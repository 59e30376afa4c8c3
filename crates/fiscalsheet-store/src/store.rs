use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fiscalsheet_core::{Dataset, Workbook};
use tracing::info;

use crate::StoreError;
use crate::format::Formatter;
use crate::xlsx;

/// Byte-level access to spreadsheets by handle (a path or a remote id).
///
/// The provided methods decode and encode XLSX on top of `load`/`save`.
#[async_trait]
pub trait SpreadsheetStore: Send + Sync {
    async fn load(&self, handle: &str) -> Result<Vec<u8>, StoreError>;

    async fn save(&self, handle: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn load_dataset(&self, handle: &str) -> Result<Dataset, StoreError> {
        let bytes = self.load(handle).await?;
        xlsx::read_dataset(&bytes)
    }

    async fn save_dataset(
        &self,
        handle: &str,
        dataset: &Dataset,
        formatter: &Formatter,
    ) -> Result<(), StoreError> {
        let bytes = xlsx::write_dataset(dataset, formatter)?;
        self.save(handle, bytes).await
    }

    async fn load_workbook(&self, handle: &str) -> Result<Workbook, StoreError> {
        let bytes = self.load(handle).await?;
        xlsx::read_workbook(&bytes)
    }

    async fn save_workbook(&self, handle: &str, book: &Workbook) -> Result<(), StoreError> {
        let bytes = xlsx::write_workbook(book, None)?;
        self.save(handle, bytes).await
    }
}

/// Spreadsheets on the local filesystem. Handles are paths, relative ones
/// resolved against `root` when set.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    root: Option<PathBuf>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn path(&self, handle: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(handle),
            None => Path::new(handle).to_path_buf(),
        }
    }
}

#[async_trait]
impl SpreadsheetStore for LocalStore {
    async fn load(&self, handle: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path(handle);
        tokio::fs::read(&path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn save(&self, handle: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path(handle);
        let len = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), bytes = len, "saved spreadsheet");
        Ok(())
    }
}
