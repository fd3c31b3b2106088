use std::time::Duration;

use shared::types::LoginError;
use thiserror::Error;

/// Why a session could not be issued.
///
/// Validation never produces one of these: an unusable credential is
/// reported as [`SessionState::Invalid`](super::SessionState::Invalid).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed, expired or unverifiable identity token.
    #[error("identity token is invalid")]
    InvalidToken,

    /// Identity token verified, but the sign-in it proves is too old.
    #[error("authentication happened {age_secs}s ago; sign in again")]
    StaleAuthentication { age_secs: i64 },

    /// The identity provider could not be reached in time.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The subject's revocation marker could not be read, so there is no
    /// safe issue time.
    #[error("revocation store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<&AuthError> for LoginError {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidToken => LoginError::InvalidToken,
            AuthError::StaleAuthentication { .. } => LoginError::StaleAuthentication,
            AuthError::ProviderUnavailable(_) => LoginError::ProviderUnavailable,
            AuthError::StoreUnavailable(_) => LoginError::StoreUnavailable,
        }
    }
}

/// Failures of the durable stores (revocation markers, posts).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a logout could not be carried out.
#[derive(Error, Debug)]
pub enum LogoutError {
    /// The credential's signature could not be checked, so it is unknown
    /// whose sessions to revoke.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
