//! Remote storage: Google Drive client, OAuth credential cache, and the
//! Drive-backed spreadsheet store.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
mod remote;
#[cfg(feature = "http")]
pub mod token;

#[cfg(feature = "http")]
pub use http::{DriveClient, DriveFile, SyncError};
#[cfg(feature = "http")]
pub use remote::DriveStore;
#[cfg(feature = "http")]
pub use token::{CredentialCache, OAuthCredentials};
