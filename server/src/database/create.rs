use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version, stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// Initialize the database schema. Safe to run on every start-up.
pub async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
    let current_version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if current_version > SCHEMA_VERSION {
        warn!(
            "Database schema version {} is newer than this build ({}); continuing",
            current_version, SCHEMA_VERSION
        );
    }

    let mut tx = pool.begin().await?;

    // Revocation markers: one row per subject, holding the latest
    // `revoked_before`. A session with iat <= revoked_before is dead.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS revocations (
            subject_id     TEXT    PRIMARY KEY,
            revoked_before INTEGER NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await?;

    // Posts: owner_id is the creating subject and is never updated.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS posts (
            id         TEXT    PRIMARY KEY,
            owner_id   TEXT    NOT NULL,
            title      TEXT    NOT NULL,
            body       TEXT    NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await?;

    // --- Indexes --------------------------------------------------------
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_owner   ON posts(owner_id)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at)")
        .execute(&mut *tx)
        .await?;

    if current_version < SCHEMA_VERSION {
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&mut *tx)
            .await?;
        info!("Schema version set to {}.", SCHEMA_VERSION);
    }

    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    #[tokio::test]
    async fn create_tables_is_idempotent_and_stamps_version() {
        let pool = database::connect(":memory:").await.unwrap();
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"revocations".to_string()));
    }
}
