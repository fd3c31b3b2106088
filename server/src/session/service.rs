use std::sync::Arc;

use async_trait::async_trait;
use shared::types::Authorization;
use tokio::time;
use tracing::{error, info};

use super::authorize::authorize;
use super::identity::IdentityProvider;
use super::issuer::{SessionCredential, SessionIssuer};
use super::revocation::RevocationRegistry;
use super::identity::ProviderError;
use super::validator::{SessionState, SessionValidator};
use super::{AuthError, LogoutError, SessionPolicy, StoreError, SubjectId};

/// Something that holds resources owned by a subject and can drop them all.
#[async_trait]
pub trait OwnedResources: Send + Sync {
    async fn delete_owned_by(&self, owner: &SubjectId) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDeletion {
    pub subject: SubjectId,
    pub resources_deleted: u64,
}

/// Issuer, validator, registry and authorization check wired to one policy.
///
/// Built once at start-up and shared by `Arc`; holds no per-request state.
#[derive(Clone)]
pub struct SessionService {
    issuer: SessionIssuer,
    validator: SessionValidator,
    registry: Arc<dyn RevocationRegistry>,
    policy: SessionPolicy,
}

impl SessionService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        registry: Arc<dyn RevocationRegistry>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            issuer: SessionIssuer::new(Arc::clone(&provider), Arc::clone(&registry), policy),
            validator: SessionValidator::new(provider, Arc::clone(&registry), policy),
            registry,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub async fn issue(&self, identity_token: &str, now: i64) -> Result<SessionCredential, AuthError> {
        self.issuer.issue(identity_token, now).await
    }

    pub async fn validate(&self, credential: &str, now: i64) -> SessionState {
        self.validator.validate(credential, now).await
    }

    pub async fn authorize(
        &self,
        credential: &str,
        resource_owner: &SubjectId,
        now: i64,
    ) -> Authorization {
        authorize(&self.validator, credential, resource_owner, now).await
    }

    /// Void every session of `subject` issued at or before `now`.
    /// Returns once the marker is durable.
    pub async fn revoke(&self, subject: &SubjectId, now: i64) -> Result<(), StoreError> {
        time::timeout(self.policy.store_timeout, self.registry.revoke(subject, now))
            .await
            .map_err(|_| StoreError::Timeout(self.policy.store_timeout))??;

        info!("Sessions revoked: subject={}, revoked_before={}", subject, now);
        Ok(())
    }

    /// Sign the credential's subject out everywhere. A credential that is
    /// not ours is a no-op.
    ///
    /// The subject comes from the signature alone, so an expired or already
    /// revoked credential still signs out, and an unreadable revocation
    /// store does not turn the logout into a silent no-op.
    pub async fn logout(
        &self,
        credential: &str,
        now: i64,
    ) -> Result<Option<SubjectId>, LogoutError> {
        let subject = match self.validator.credential_subject(credential).await {
            Ok(Some(subject)) => subject,
            Ok(None) | Err(ProviderError::Rejected(_)) => return Ok(None),
            Err(ProviderError::Unavailable(reason)) => {
                return Err(LogoutError::ProviderUnavailable(reason));
            }
        };

        self.revoke(&subject, now).await?;
        Ok(Some(subject))
    }

    /// Revoke first, then delete the subject's resources.
    ///
    /// If the revoke does not land, nothing is deleted: a replayed request
    /// must never find the resources gone while the session still works.
    pub async fn delete_account(
        &self,
        subject: &SubjectId,
        now: i64,
        resources: &dyn OwnedResources,
    ) -> Result<AccountDeletion, StoreError> {
        if let Err(e) = self.revoke(subject, now).await {
            error!(
                "Account deletion for {} aborted, revocation failed: {}",
                subject, e
            );
            return Err(e);
        }

        let resources_deleted =
            time::timeout(self.policy.store_timeout, resources.delete_owned_by(subject))
                .await
                .map_err(|_| StoreError::Timeout(self.policy.store_timeout))??;

        info!(
            "Account deleted: subject={}, resources_deleted={}",
            subject, resources_deleted
        );

        Ok(AccountDeletion {
            subject: subject.clone(),
            resources_deleted,
        })
    }
}
