use std::sync::Arc;

use tokio::time;
use tracing::{debug, warn};

use shared::types::SessionClaims;

use super::identity::{IdentityProvider, ProviderError};
use super::revocation::RevocationRegistry;
use super::{SessionPolicy, SubjectId};

/// Outcome of validating a session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Valid(SubjectId),
    Invalid,
}

impl SessionState {
    pub fn subject(&self) -> Option<&SubjectId> {
        match self {
            Self::Valid(subject) => Some(subject),
            Self::Invalid => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Decides, for an untrusted string, whether it is a live session.
///
/// Never fails: bad signatures, expiry, revocation, provider or store
/// outages and timeouts all come back as [`SessionState::Invalid`].
#[derive(Clone)]
pub struct SessionValidator {
    provider: Arc<dyn IdentityProvider>,
    registry: Arc<dyn RevocationRegistry>,
    policy: SessionPolicy,
}

impl SessionValidator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        registry: Arc<dyn RevocationRegistry>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            provider,
            registry,
            policy,
        }
    }

    /// Signature check alone. `Ok(None)` for a credential that is not ours;
    /// `Err` when the provider could not answer.
    async fn verified_claims(&self, credential: &str) -> Result<Option<SessionClaims>, ProviderError> {
        if credential.trim().is_empty() {
            return Ok(None);
        }

        match time::timeout(
            self.policy.provider_timeout,
            self.provider.verify_session_credential(credential),
        )
        .await
        {
            Ok(Ok(claims)) if claims.sub.is_empty() => Ok(None),
            Ok(Ok(claims)) => Ok(Some(claims)),
            Ok(Err(ProviderError::Rejected(reason))) => {
                debug!("Session credential rejected: {}", reason);
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Unavailable(format!(
                "timed out after {:?}",
                self.policy.provider_timeout
            ))),
        }
    }

    /// Whose credential this is, going by the signature only.
    ///
    /// Expiry and revocation are not consulted, so a logout can still find
    /// the subject when the revocation store cannot be read.
    pub async fn credential_subject(
        &self,
        credential: &str,
    ) -> Result<Option<SubjectId>, ProviderError> {
        Ok(self
            .verified_claims(credential)
            .await?
            .map(|claims| SubjectId::new(claims.sub)))
    }

    pub async fn validate(&self, credential: &str, now: i64) -> SessionState {
        let claims = match self.verified_claims(credential).await {
            Ok(Some(claims)) => claims,
            Ok(None) => return SessionState::Invalid,
            Err(e) => {
                warn!("Session verification failed: {}; treating as signed out", e);
                return SessionState::Invalid;
            }
        };

        if now >= claims.exp {
            debug!("Session {} expired at {}", claims.sid, claims.exp);
            return SessionState::Invalid;
        }

        let subject = SubjectId::new(claims.sub);

        match time::timeout(
            self.policy.store_timeout,
            self.registry.latest_revocation(&subject),
        )
        .await
        {
            Ok(Ok(Some(revoked_before))) if revoked_before >= claims.iat => {
                debug!(
                    "Session {} for {} revoked (iat {} <= {})",
                    claims.sid, subject, claims.iat, revoked_before
                );
                SessionState::Invalid
            }
            Ok(Ok(_)) => SessionState::Valid(subject),
            Ok(Err(e)) => {
                warn!(
                    "Revocation lookup for {} failed: {}; treating as signed out",
                    subject, e
                );
                SessionState::Invalid
            }
            Err(_) => {
                warn!(
                    "Revocation lookup for {} timed out after {:?}; treating as signed out",
                    subject, self.policy.store_timeout
                );
                SessionState::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing;
    use shared::types::SessionClaims;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000;

    async fn signed(sub: &str, iat: i64, exp: i64) -> String {
        testing::provider()
            .sign_session_credential(&SessionClaims {
                sub: sub.into(),
                sid: "test-sid".into(),
                iat,
                exp,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_and_garbage_credentials_are_invalid() {
        let validator = SessionValidator::new(
            testing::provider(),
            testing::memory_registry().await,
            SessionPolicy::default(),
        );
        assert_eq!(validator.validate("", T0).await, SessionState::Invalid);
        assert_eq!(validator.validate("   ", T0).await, SessionState::Invalid);
        assert_eq!(validator.validate("not.a.jwt", T0).await, SessionState::Invalid);
    }

    #[tokio::test]
    async fn empty_credential_never_reaches_the_provider() {
        let validator = SessionValidator::new(
            Arc::new(testing::StalledProvider),
            testing::memory_registry().await,
            SessionPolicy::default(),
        );
        // A stalled provider would hold this for the full provider timeout.
        let started = std::time::Instant::now();
        assert_eq!(validator.validate("", T0).await, SessionState::Invalid);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn expiry_is_exclusive() {
        let validator = SessionValidator::new(
            testing::provider(),
            testing::memory_registry().await,
            SessionPolicy::default(),
        );
        let token = signed("alice", T0, T0 + 100).await;

        assert!(validator.validate(&token, T0 + 99).await.is_signed_in());
        assert_eq!(validator.validate(&token, T0 + 100).await, SessionState::Invalid);
    }

    #[tokio::test]
    async fn revocation_at_or_after_issue_kills_the_session() {
        let registry = testing::memory_registry().await;
        let validator = SessionValidator::new(
            testing::provider(),
            registry.clone(),
            SessionPolicy::default(),
        );
        let token = signed("alice", T0, T0 + 1_000).await;
        let alice = SubjectId::new("alice");

        registry.revoke(&alice, T0 - 1).await.unwrap();
        assert_eq!(
            validator.validate(&token, T0 + 1).await,
            SessionState::Valid(alice.clone())
        );

        registry.revoke(&alice, T0).await.unwrap();
        assert_eq!(validator.validate(&token, T0 + 1).await, SessionState::Invalid);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let validator = SessionValidator::new(
            testing::provider(),
            Arc::new(testing::BrokenRegistry),
            SessionPolicy::default(),
        );
        let token = signed("alice", T0, T0 + 1_000).await;
        assert_eq!(validator.validate(&token, T0 + 1).await, SessionState::Invalid);
    }

    #[tokio::test]
    async fn store_timeout_fails_closed() {
        let policy = SessionPolicy {
            store_timeout: Duration::from_millis(20),
            ..SessionPolicy::default()
        };
        let validator =
            SessionValidator::new(testing::provider(), Arc::new(testing::StalledRegistry), policy);
        let token = signed("alice", T0, T0 + 1_000).await;
        assert_eq!(validator.validate(&token, T0 + 1).await, SessionState::Invalid);
    }

    #[tokio::test]
    async fn credential_subject_ignores_the_revocation_store() {
        let validator = SessionValidator::new(
            testing::provider(),
            Arc::new(testing::BrokenRegistry),
            SessionPolicy::default(),
        );
        let token = signed("alice", T0, T0 + 1_000).await;

        assert_eq!(
            validator.credential_subject(&token).await.unwrap(),
            Some(SubjectId::new("alice"))
        );
        assert_eq!(validator.credential_subject("not.a.jwt").await.unwrap(), None);
        assert_eq!(validator.credential_subject("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn credential_subject_reports_a_stalled_provider() {
        let policy = SessionPolicy {
            provider_timeout: Duration::from_millis(20),
            ..SessionPolicy::default()
        };
        let validator = SessionValidator::new(
            Arc::new(testing::StalledProvider),
            testing::memory_registry().await,
            policy,
        );
        assert!(matches!(
            validator.credential_subject("a.b.c").await,
            Err(ProviderError::Unavailable(_))
        ));
    }
}
