//! Google Drive v3 client for the fiscal and budget spreadsheets.

use fiscalsheet_store::XLSX_MIME;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::token::{CredentialCache, OAuthCredentials, TOKEN_URL};

pub const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
}

/// A file entry of a Drive folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive client. Every call takes the caller's [`CredentialCache`] and
/// refreshes it when the access token has expired.
pub struct DriveClient {
    client: reqwest::Client,
    credentials: OAuthCredentials,
    api_url: String,
    upload_url: String,
    token_url: String,
}

impl DriveClient {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self::with_endpoints(credentials, DRIVE_API, DRIVE_UPLOAD_API, TOKEN_URL)
    }

    /// Client against other endpoints. URLs are taken without a trailing
    /// slash.
    pub fn with_endpoints(
        credentials: OAuthCredentials,
        api_url: &str,
        upload_url: &str,
        token_url: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
        }
    }

    async fn token(&self, cache: &mut CredentialCache) -> Result<String, SyncError> {
        cache
            .access_token(&self.client, &self.credentials, &self.token_url)
            .await
    }

    /// Non-trashed files directly inside `folder_id`.
    pub async fn list_files(
        &self,
        cache: &mut CredentialCache,
        folder_id: &str,
    ) -> Result<Vec<DriveFile>, SyncError> {
        let url = format!("{}/files", self.api_url);
        let query = folder_query(folder_id);
        let token = self.token(cache).await?;

        info!(folder = folder_id, "listing drive folder");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name,mimeType)")])
            .send()
            .await?;
        let resp = check(resp).await?;

        let list: FileList = serde_json::from_str(&resp.text().await?)?;
        info!(count = list.files.len(), "listed drive folder");
        Ok(list.files)
    }

    /// File contents.
    pub async fn download(
        &self,
        cache: &mut CredentialCache,
        file_id: &str,
    ) -> Result<Vec<u8>, SyncError> {
        let url = format!("{}/files/{file_id}", self.api_url);
        let token = self.token(cache).await?;

        info!(file = file_id, "downloading file");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let resp = check(resp).await?;
        let bytes = resp.bytes().await?;
        info!(file = file_id, bytes = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }

    /// Replace the contents of an existing spreadsheet file.
    pub async fn upload(
        &self,
        cache: &mut CredentialCache,
        file_id: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SyncError> {
        let url = format!("{}/files/{file_id}", self.upload_url);
        let token = self.token(cache).await?;

        info!(file = file_id, bytes = bytes.len(), "uploading file");
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, XLSX_MIME)
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        info!(file = file_id, "upload complete");
        Ok(())
    }

    pub async fn delete(&self, cache: &mut CredentialCache, file_id: &str) -> Result<(), SyncError> {
        let url = format!("{}/files/{file_id}", self.api_url);
        let token = self.token(cache).await?;

        info!(file = file_id, "deleting file");
        let resp = self.client.delete(&url).bearer_auth(token).send().await?;
        check(resp).await?;
        Ok(())
    }
}

fn folder_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"))
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Server {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    #[test]
    fn endpoints_trim_trailing_slash() {
        let client = DriveClient::with_endpoints(
            creds(),
            "http://localhost:8080/drive/v3/",
            "http://localhost:8080/upload/",
            "http://localhost:8080/token",
        );
        assert_eq!(client.api_url, "http://localhost:8080/drive/v3");
        assert_eq!(client.upload_url, "http://localhost:8080/upload");
    }

    #[test]
    fn folder_query_excludes_trash() {
        assert_eq!(folder_query("abc123"), "'abc123' in parents and trashed=false");
        assert_eq!(folder_query("it's"), "'it\\'s' in parents and trashed=false");
    }

    #[test]
    fn file_list_json() {
        let json = r#"{"files": [
            {"id": "1a", "name": "Sudeste.xlsx", "mimeType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"},
            {"id": "2b", "name": "notas"}
        ]}"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.files[0].name, "Sudeste.xlsx");
        assert_eq!(list.files[1].mime_type, None);
    }

    #[test]
    fn empty_listing_has_no_files_key() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }
}
