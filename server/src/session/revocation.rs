use async_trait::async_trait;

use super::{StoreError, SubjectId};

/// Durable `subject -> revoked_before` record.
///
/// A session whose `iat` is at or before the subject's marker is dead.
/// Implementations must:
///   * make `revoke` durable before returning,
///   * never move a marker backwards (revoking with an older time than the
///     stored one is a no-op),
///   * let a read observe every revoke that completed before it started.
#[async_trait]
pub trait RevocationRegistry: Send + Sync {
    async fn revoke(&self, subject: &SubjectId, revoked_before: i64) -> Result<(), StoreError>;

    async fn latest_revocation(&self, subject: &SubjectId) -> Result<Option<i64>, StoreError>;
}
