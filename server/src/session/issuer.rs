use std::fmt;
use std::sync::Arc;

use shared::types::SessionClaims;
use tokio::time;
use tracing::{info, warn};

use super::identity::{IdentityProvider, IdentityTokenVerifier};
use super::revocation::RevocationRegistry;
use super::{AuthError, SessionPolicy, SubjectId};
use crate::database::utils::generate_uuid_token;

/// How far in the future an `auth_time` may sit before the token is
/// considered bogus rather than merely skewed.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// A freshly minted session credential.
#[derive(Clone)]
pub struct SessionCredential {
    token: String,
    pub subject: SubjectId,
    pub session_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl SessionCredential {
    /// The opaque string to put in the cookie.
    pub fn token(&self) -> &str {
        &self.token
    }
}

// Keeps the bearer token out of logs.
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("subject", &self.subject)
            .field("session_id", &self.session_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    verifier: IdentityTokenVerifier,
    provider: Arc<dyn IdentityProvider>,
    registry: Arc<dyn RevocationRegistry>,
    policy: SessionPolicy,
}

impl SessionIssuer {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        registry: Arc<dyn RevocationRegistry>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            verifier: IdentityTokenVerifier::new(Arc::clone(&provider), policy.provider_timeout),
            provider,
            registry,
            policy,
        }
    }

    /// Earliest `iat` that the subject's revocation marker does not cover.
    ///
    /// A sign-in in the same second as a logout would otherwise mint a
    /// credential that is dead on arrival.
    async fn issued_at(&self, subject: &SubjectId, now: i64) -> Result<i64, AuthError> {
        match time::timeout(self.policy.store_timeout, self.registry.latest_revocation(subject)).await
        {
            Ok(Ok(Some(revoked_before))) => Ok(now.max(revoked_before.saturating_add(1))),
            Ok(Ok(None)) => Ok(now),
            Ok(Err(e)) => {
                warn!("Revocation lookup for {} failed at issuance: {}", subject, e);
                Err(AuthError::StoreUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Revocation lookup for {} timed out at issuance", subject);
                Err(AuthError::StoreUnavailable(format!(
                    "timed out after {:?}",
                    self.policy.store_timeout
                )))
            }
        }
    }

    /// Exchange an identity token for a session credential.
    ///
    /// Nothing is written anywhere; on any error no credential exists.
    pub async fn issue(&self, identity_token: &str, now: i64) -> Result<SessionCredential, AuthError> {
        let assertion = self.verifier.verify(identity_token).await?;

        if assertion.auth_time > now + MAX_CLOCK_SKEW_SECS {
            warn!(
                "Identity token for {} claims a future sign-in ({} > {})",
                assertion.subject, assertion.auth_time, now
            );
            return Err(AuthError::InvalidToken);
        }

        let age_secs = now - assertion.auth_time;
        if age_secs > self.policy.reauth_window_secs() {
            warn!(
                "Refusing session for {}: sign-in is {}s old (window {}s)",
                assertion.subject,
                age_secs,
                self.policy.reauth_window_secs()
            );
            return Err(AuthError::StaleAuthentication { age_secs });
        }

        let claims = SessionClaims {
            sub: assertion.subject.to_string(),
            sid: generate_uuid_token(),
            iat: self.issued_at(&assertion.subject, now).await?,
            exp: now.saturating_add(self.policy.session_lifetime_secs()),
        };

        let token = match time::timeout(
            self.policy.provider_timeout,
            self.provider.sign_session_credential(&claims),
        )
        .await
        {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                warn!("Signing session for {} failed: {}", assertion.subject, e);
                return Err(AuthError::ProviderUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!("Signing session for {} timed out", assertion.subject);
                return Err(AuthError::ProviderUnavailable(format!(
                    "timed out after {:?}",
                    self.policy.provider_timeout
                )));
            }
        };

        info!(
            "Session issued: subject={}, sid={}, expires_at={}",
            assertion.subject, claims.sid, claims.exp
        );

        Ok(SessionCredential {
            token,
            subject: assertion.subject,
            session_id: claims.sid,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::utils::get_timestamp;
    use crate::session::testing;

    fn issuer() -> SessionIssuer {
        issuer_with(Arc::new(testing::NoRevocations))
    }

    fn issuer_with(registry: Arc<dyn RevocationRegistry>) -> SessionIssuer {
        SessionIssuer::new(testing::provider(), registry, SessionPolicy::default())
    }

    #[tokio::test]
    async fn issues_for_fresh_sign_in() {
        let now = get_timestamp();
        let token = testing::identity_token("alice", now - 30 * 60);

        let credential = issuer().issue(&token, now).await.unwrap();
        assert_eq!(credential.subject.as_str(), "alice");
        assert_eq!(credential.issued_at, now);
        assert_eq!(credential.expires_at, now + 24 * 60 * 60);
        assert!(!credential.token().is_empty());
    }

    #[tokio::test]
    async fn window_edge_is_inclusive() {
        let now = get_timestamp();
        let at_edge = testing::identity_token("alice", now - 60 * 60);
        assert!(issuer().issue(&at_edge, now).await.is_ok());

        let past_edge = testing::identity_token("alice", now - 60 * 60 - 1);
        assert_eq!(
            issuer().issue(&past_edge, now).await.unwrap_err(),
            AuthError::StaleAuthentication { age_secs: 3601 }
        );
    }

    #[tokio::test]
    async fn future_sign_in_is_rejected() {
        let now = get_timestamp();
        let token = testing::identity_token("alice", now + 10 * 60);
        assert_eq!(
            issuer().issue(&token, now).await.unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn each_issue_gets_its_own_session_id() {
        let now = get_timestamp();
        let token = testing::identity_token("alice", now);
        let a = issuer().issue(&token, now).await.unwrap();
        let b = issuer().issue(&token, now).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.token(), b.token());
    }

    #[tokio::test]
    async fn same_second_as_revocation_issues_past_the_marker() {
        let now = get_timestamp();
        let registry = testing::memory_registry().await;
        registry.revoke(&SubjectId::new("alice"), now).await.unwrap();

        let credential = issuer_with(registry)
            .issue(&testing::identity_token("alice", now), now)
            .await
            .unwrap();
        assert_eq!(credential.issued_at, now + 1);
        assert_eq!(credential.expires_at, now + 24 * 60 * 60);
    }

    #[tokio::test]
    async fn older_marker_leaves_issue_time_alone() {
        let now = get_timestamp();
        let registry = testing::memory_registry().await;
        registry.revoke(&SubjectId::new("alice"), now - 10).await.unwrap();

        let credential = issuer_with(registry)
            .issue(&testing::identity_token("alice", now), now)
            .await
            .unwrap();
        assert_eq!(credential.issued_at, now);
    }

    #[tokio::test]
    async fn unreadable_marker_refuses_to_issue() {
        let now = get_timestamp();
        let err = issuer_with(Arc::new(testing::BrokenRegistry))
            .issue(&testing::identity_token("alice", now), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let credential = SessionCredential {
            token: "secret-bearer-value".into(),
            subject: SubjectId::new("alice"),
            session_id: "sid".into(),
            issued_at: 1,
            expires_at: 2,
        };
        assert!(!format!("{:?}", credential).contains("secret-bearer-value"));
    }
}
