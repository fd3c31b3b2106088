use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use shared::types::{AppConfig, IdentityClaims, SessionClaims};
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

use super::{AuthError, SubjectId};

/// What a verified identity token proves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub subject: SubjectId,
    /// Unix seconds of the original sign-in.
    pub auth_time: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider looked at the token and said no.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The provider could not be asked.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// The identity provider's primitives. Everything cryptographic about
/// identity tokens and session credentials happens behind this trait.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_identity_token(&self, token: &str)
    -> Result<IdentityAssertion, ProviderError>;

    async fn sign_session_credential(&self, claims: &SessionClaims)
    -> Result<String, ProviderError>;

    async fn verify_session_credential(&self, credential: &str)
    -> Result<SessionClaims, ProviderError>;
}

// ---------------------------------------------------------------------------
// JWT-backed provider
// ---------------------------------------------------------------------------

/// Identity tokens are JWTs from an external issuer (HS256 shared secret or
/// RS256 public key); session credentials are HS256 JWTs under our own
/// session secret.
pub struct JwtIdentityProvider {
    identity_key: DecodingKey,
    identity_validation: Validation,
    session_encoding_key: EncodingKey,
    session_decoding_key: DecodingKey,
    session_validation: Validation,
}

impl fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("identity_algorithms", &self.identity_validation.algorithms)
            .field("identity_issuer", &self.identity_validation.iss)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityProvider {
    fn new(
        identity_key: DecodingKey,
        algorithm: Algorithm,
        issuer: &str,
        audience: &str,
        session_secret: &[u8],
    ) -> Self {
        let mut identity_validation = Validation::new(algorithm);
        identity_validation.set_issuer(&[issuer]);
        identity_validation.set_audience(&[audience]);
        identity_validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        // Expiry is judged by the session validator against its own clock.
        let mut session_validation = Validation::new(Algorithm::HS256);
        session_validation.validate_exp = false;
        session_validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            identity_key,
            identity_validation,
            session_encoding_key: EncodingKey::from_secret(session_secret),
            session_decoding_key: DecodingKey::from_secret(session_secret),
            session_validation,
        }
    }

    /// Identity tokens signed with a shared HS256 secret.
    pub fn with_hmac(
        issuer: &str,
        audience: &str,
        identity_secret: &[u8],
        session_secret: &[u8],
    ) -> Self {
        Self::new(
            DecodingKey::from_secret(identity_secret),
            Algorithm::HS256,
            issuer,
            audience,
            session_secret,
        )
    }

    /// Identity tokens signed with RS256; `pem` is the provider's public key.
    pub fn with_rsa_pem(
        issuer: &str,
        audience: &str,
        pem: &[u8],
        session_secret: &[u8],
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(
            DecodingKey::from_rsa_pem(pem)?,
            Algorithm::RS256,
            issuer,
            audience,
            session_secret,
        ))
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let session_secret = config
            .auth
            .resolved_session_secret()
            .context("session secret is not configured")?;
        let identity = &config.identity;

        match (identity.resolved_hmac_secret(), identity.public_key_path()) {
            (Some(secret), None) => Ok(Self::with_hmac(
                &identity.issuer,
                &identity.audience,
                secret.as_bytes(),
                session_secret.as_bytes(),
            )),
            (None, Some(path)) => {
                let pem = std::fs::read(path)
                    .with_context(|| format!("Failed to read identity public key {}", path))?;
                Self::with_rsa_pem(
                    &identity.issuer,
                    &identity.audience,
                    &pem,
                    session_secret.as_bytes(),
                )
                .with_context(|| format!("Invalid RSA public key in {}", path))
            }
            _ => bail!("identity provider needs exactly one of hmac_secret or public_key_pem"),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify_identity_token(
        &self,
        token: &str,
    ) -> Result<IdentityAssertion, ProviderError> {
        let data = decode::<IdentityClaims>(token, &self.identity_key, &self.identity_validation)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(ProviderError::Rejected("empty subject".to_string()));
        }

        Ok(IdentityAssertion {
            subject: SubjectId::new(data.claims.sub),
            auth_time: data.claims.auth_time,
        })
    }

    async fn sign_session_credential(
        &self,
        claims: &SessionClaims,
    ) -> Result<String, ProviderError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.session_encoding_key,
        )
        .map_err(|e| ProviderError::Rejected(e.to_string()))
    }

    async fn verify_session_credential(
        &self,
        credential: &str,
    ) -> Result<SessionClaims, ProviderError> {
        decode::<SessionClaims>(
            credential,
            &self.session_decoding_key,
            &self.session_validation,
        )
        .map(|data| data.claims)
        .map_err(|e| ProviderError::Rejected(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Identity token verifier
// ---------------------------------------------------------------------------

/// Turns an identity token into `(subject, auth_time)` or `InvalidToken`,
/// with the provider call bounded by a timeout.
#[derive(Clone)]
pub struct IdentityTokenVerifier {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl IdentityTokenVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn verify(&self, identity_token: &str) -> Result<IdentityAssertion, AuthError> {
        if identity_token.trim().is_empty() {
            debug!("Empty identity token");
            return Err(AuthError::InvalidToken);
        }

        match time::timeout(
            self.timeout,
            self.provider.verify_identity_token(identity_token),
        )
        .await
        {
            Ok(Ok(assertion)) => Ok(assertion),
            Ok(Err(ProviderError::Rejected(reason))) => {
                warn!("Identity token rejected: {}", reason);
                Err(AuthError::InvalidToken)
            }
            Ok(Err(ProviderError::Unavailable(reason))) => {
                warn!("Identity provider unavailable: {}", reason);
                Err(AuthError::ProviderUnavailable(reason))
            }
            Err(_) => {
                warn!("Identity token verification timed out after {:?}", self.timeout);
                Err(AuthError::ProviderUnavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}
