//! Session and authorization core.
//!
//! ```text
//!   identity token ──► IdentityTokenVerifier ──► SessionIssuer ──► cookie
//!   cookie ──► SessionValidator ──(RevocationRegistry)──► SessionState
//!   SessionState + owner id ──► Authorization { signed_in, is_owner }
//! ```
//!
//! All timestamps are Unix seconds and every operation takes `now`
//! explicitly, so nothing here reads the clock on its own.

pub mod authorize;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod revocation;
pub mod service;
pub mod validator;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::types::server_config::AuthConfig;

pub use self::authorize::{authorization_for, authorize};
pub use self::error::{AuthError, LogoutError, StoreError};
pub use self::identity::{
    IdentityAssertion, IdentityProvider, IdentityTokenVerifier, JwtIdentityProvider,
    ProviderError,
};
pub use self::issuer::{SessionCredential, SessionIssuer};
pub use self::revocation::RevocationRegistry;
pub use self::service::{AccountDeletion, OwnedResources, SessionService};
pub use self::validator::{SessionState, SessionValidator};

/// Opaque, stable id of an authenticated principal, minted by the identity
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Time policy and call budgets for the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Max age of the sign-in behind an identity token at issuance.
    pub reauth_window: Duration,
    /// Absolute lifetime of a session credential.
    pub session_lifetime: Duration,
    pub provider_timeout: Duration,
    pub store_timeout: Duration,
}

impl SessionPolicy {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            reauth_window: auth.reauth_window(),
            session_lifetime: auth.session_lifetime(),
            provider_timeout: auth.provider_timeout(),
            store_timeout: auth.store_timeout(),
        }
    }

    pub fn reauth_window_secs(&self) -> i64 {
        i64::try_from(self.reauth_window.as_secs()).unwrap_or(i64::MAX)
    }

    pub fn session_lifetime_secs(&self) -> i64 {
        i64::try_from(self.session_lifetime.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            reauth_window: Duration::from_secs(60 * 60),
            session_lifetime: Duration::from_secs(24 * 60 * 60),
            provider_timeout: Duration::from_secs(3),
            store_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use shared::types::{IdentityClaims, SessionClaims};

    use super::*;
    use crate::database::{self, create, revocations::SqliteRevocationRegistry};

    pub const ISSUER: &str = "https://idp.test";
    pub const AUDIENCE: &str = "blog-test";
    pub const IDENTITY_SECRET: &[u8] = b"identity-secret-for-tests-0123456789";
    pub const SESSION_SECRET: &[u8] = b"session-secret-for-tests-0123456789";

    pub fn provider() -> Arc<JwtIdentityProvider> {
        Arc::new(JwtIdentityProvider::with_hmac(
            ISSUER,
            AUDIENCE,
            IDENTITY_SECRET,
            SESSION_SECRET,
        ))
    }

    /// Identity claims whose token stays unexpired for an hour of real time.
    pub fn identity_claims(sub: &str, auth_time: i64) -> IdentityClaims {
        let wall = crate::database::utils::get_timestamp();
        IdentityClaims {
            sub: sub.to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            auth_time,
            iat: wall,
            exp: wall + 3600,
        }
    }

    pub fn sign_identity(claims: &IdentityClaims, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    pub fn identity_token(sub: &str, auth_time: i64) -> String {
        sign_identity(&identity_claims(sub, auth_time), IDENTITY_SECRET)
    }

    pub async fn memory_registry() -> Arc<SqliteRevocationRegistry> {
        let pool = database::connect(":memory:").await.unwrap();
        create::create_tables(&pool).await.unwrap();
        Arc::new(SqliteRevocationRegistry::new(pool))
    }

    pub async fn service() -> SessionService {
        SessionService::new(provider(), memory_registry().await, SessionPolicy::default())
    }

    /// Registry that has never recorded a logout.
    pub struct NoRevocations;

    #[async_trait]
    impl RevocationRegistry for NoRevocations {
        async fn revoke(&self, _: &SubjectId, _: i64) -> Result<(), StoreError> {
            Ok(())
        }

        async fn latest_revocation(&self, _: &SubjectId) -> Result<Option<i64>, StoreError> {
            Ok(None)
        }
    }

    /// Registry whose store is down.
    pub struct BrokenRegistry;

    #[async_trait]
    impl RevocationRegistry for BrokenRegistry {
        async fn revoke(&self, _: &SubjectId, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn latest_revocation(&self, _: &SubjectId) -> Result<Option<i64>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    /// Registry that never answers.
    pub struct StalledRegistry;

    #[async_trait]
    impl RevocationRegistry for StalledRegistry {
        async fn revoke(&self, _: &SubjectId, _: i64) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn latest_revocation(&self, _: &SubjectId) -> Result<Option<i64>, StoreError> {
            std::future::pending().await
        }
    }

    /// Provider that never answers.
    pub struct StalledProvider;

    #[async_trait]
    impl IdentityProvider for StalledProvider {
        async fn verify_identity_token(
            &self,
            _: &str,
        ) -> Result<IdentityAssertion, ProviderError> {
            std::future::pending().await
        }

        async fn sign_session_credential(
            &self,
            _: &SessionClaims,
        ) -> Result<String, ProviderError> {
            std::future::pending().await
        }

        async fn verify_session_credential(
            &self,
            _: &str,
        ) -> Result<SessionClaims, ProviderError> {
            std::future::pending().await
        }
    }
}
