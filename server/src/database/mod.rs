pub mod create;
pub mod posts;
pub mod revocations;
pub mod utils;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::info;

pub use create::create_tables;
pub use posts::PostStore;
pub use revocations::SqliteRevocationRegistry;

/// Open (creating if needed) the SQLite database at `path`.
///
/// `":memory:"` gives a private in-memory database held on a single
/// connection for the life of the pool.
pub async fn connect(path: &str) -> sqlx::Result<SqlitePool> {
    if path == ":memory:" {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await;
    }

    info!("Opening database at {}", path);

    // FULL sync: a revoke must be on disk before the request returns.
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
}
