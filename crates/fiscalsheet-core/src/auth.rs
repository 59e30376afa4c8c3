//! Shared-secret gate for configuration editing.

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("no admin secret configured; configuration editing is disabled")]
    NotConfigured,
    #[error("incorrect password")]
    WrongPassword,
}

/// Proof that the caller passed the shared-secret check.
///
/// Only [`AuthContext::login`] constructs one, so any API that takes
/// `&AuthContext` is reachable only after a successful login. The context
/// lives as long as the caller's session and is never stored globally.
#[derive(Debug)]
pub struct AuthContext {
    _private: (),
}

impl AuthContext {
    /// Check `attempt` against the configured shared secret.
    pub fn login(attempt: &str, secret: Option<&str>) -> Result<Self, AuthError> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::NotConfigured)?;
        if attempt != secret {
            warn!("configuration login rejected");
            return Err(AuthError::WrongPassword);
        }
        info!("configuration login accepted");
        Ok(Self { _private: () })
    }
}
