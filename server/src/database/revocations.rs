use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::session::{RevocationRegistry, StoreError, SubjectId};

/// Revocation markers in the `revocations` table.
#[derive(Debug, Clone)]
pub struct SqliteRevocationRegistry {
    pool: SqlitePool,
}

impl SqliteRevocationRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationRegistry for SqliteRevocationRegistry {
    async fn revoke(&self, subject: &SubjectId, revoked_before: i64) -> Result<(), StoreError> {
        // MAX keeps the marker monotonic under repeated or out-of-order revokes.
        sqlx::query(
            "INSERT INTO revocations (subject_id, revoked_before) VALUES (?1, ?2)
             ON CONFLICT(subject_id)
             DO UPDATE SET revoked_before = MAX(revoked_before, excluded.revoked_before)",
        )
        .bind(subject.as_str())
        .bind(revoked_before)
        .execute(&self.pool)
        .await?;

        debug!("Revocation marker written: {} <= {}", subject, revoked_before);
        Ok(())
    }

    async fn latest_revocation(&self, subject: &SubjectId) -> Result<Option<i64>, StoreError> {
        let revoked_before =
            sqlx::query_scalar("SELECT revoked_before FROM revocations WHERE subject_id = ?1")
                .bind(subject.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(revoked_before)
    }
}
