use async_trait::async_trait;
use fiscalsheet_store::{SpreadsheetStore, StoreError};
use tokio::sync::Mutex;

use crate::http::{DriveClient, DriveFile, SyncError};
use crate::token::CredentialCache;

/// Spreadsheets stored on Drive, addressed by file id.
///
/// The credential cache sits behind a mutex so the `&self` store methods can
/// refresh it; calls are still made one at a time.
pub struct DriveStore {
    client: DriveClient,
    cache: Mutex<CredentialCache>,
}

impl DriveStore {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            cache: Mutex::new(CredentialCache::new()),
        }
    }

    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>, SyncError> {
        let mut cache = self.cache.lock().await;
        self.client.list_files(&mut cache, folder_id).await
    }

    pub async fn delete(&self, file_id: &str) -> Result<(), SyncError> {
        let mut cache = self.cache.lock().await;
        self.client.delete(&mut cache, file_id).await
    }
}

impl From<SyncError> for StoreError {
    fn from(err: SyncError) -> Self {
        StoreError::Remote(Box::new(err))
    }
}

#[async_trait]
impl SpreadsheetStore for DriveStore {
    async fn load(&self, handle: &str) -> Result<Vec<u8>, StoreError> {
        let mut cache = self.cache.lock().await;
        Ok(self.client.download(&mut cache, handle).await?)
    }

    async fn save(&self, handle: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        Ok(self.client.upload(&mut cache, handle, bytes).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::OAuthCredentials;

    #[tokio::test]
    async fn transport_failure_surfaces_as_remote_store_error() {
        let client = DriveClient::with_endpoints(
            OAuthCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
            "http://127.0.0.1:9/drive/v3",
            "http://127.0.0.1:9/upload/drive/v3",
            "http://127.0.0.1:9/token",
        );
        let store = DriveStore::new(client);
        let err = store.load("file-id").await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
        assert!(err.to_string().starts_with("remote storage error"));
    }
}
