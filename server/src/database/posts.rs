use async_trait::async_trait;
use shared::types::{Post, PostInput};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::database::utils::{generate_uuid_token, sanitize_string, truncate_string};
use crate::session::{OwnedResources, StoreError, SubjectId};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: String,
    owner_id: String,
    title: String,
    body: String,
    created_at: i64,
    updated_at: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Posts keyed by id, each carrying the subject that created it.
#[derive(Debug, Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_post(
        &self,
        owner: &SubjectId,
        input: &PostInput,
        now: i64,
    ) -> Result<Post, StoreError> {
        let post = Post {
            id: generate_uuid_token(),
            owner_id: owner.to_string(),
            title: truncate_string(&sanitize_string(&input.title), MAX_TITLE_CHARS),
            body: sanitize_string(&input.body),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO posts (id, owner_id, title, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&post.id)
        .bind(&post.owner_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        info!("Post created: id={}, owner={}", post.id, post.owner_id);
        Ok(post)
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id, owner_id, title, body, created_at, updated_at FROM posts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    /// Newest first.
    pub async fn list_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT id, owner_id, title, body, created_at, updated_at
             FROM posts ORDER BY created_at DESC, id LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Rewrites title and body; `owner_id` is never touched.
    /// Returns `None` when the post does not exist.
    pub async fn update_post(
        &self,
        id: &str,
        input: &PostInput,
        now: i64,
    ) -> Result<Option<Post>, StoreError> {
        let result = sqlx::query(
            "UPDATE posts SET title = ?1, body = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(truncate_string(&sanitize_string(&input.title), MAX_TITLE_CHARS))
        .bind(sanitize_string(&input.body))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        debug!("Post updated: id={}", id);
        self.get_post(id).await
    }

    /// Returns whether a row was deleted.
    pub async fn delete_post(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_posts_by_owner(&self, owner: &SubjectId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE owner_id = ?1")
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;

        info!(
            "Deleted {} post(s) owned by {}",
            result.rows_affected(),
            owner
        );
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OwnedResources for PostStore {
    async fn delete_owned_by(&self, owner: &SubjectId) -> Result<u64, StoreError> {
        self.delete_posts_by_owner(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{self, create};

    async fn store() -> PostStore {
        let pool = database::connect(":memory:").await.unwrap();
        create::create_tables(&pool).await.unwrap();
        PostStore::new(pool)
    }

    fn input(title: &str, body: &str) -> PostInput {
        PostInput {
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_get_keeps_owner() {
        let store = store().await;
        let alice = SubjectId::new("alice");

        let post = store
            .create_post(&alice, &input("  Hello  ", "First post"), 10)
            .await
            .unwrap();
        assert_eq!(post.title, "Hello");

        let fetched = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched, post);
        assert_eq!(fetched.owner_id, "alice");
    }

    #[tokio::test]
    async fn update_never_changes_owner() {
        let store = store().await;
        let post = store
            .create_post(&SubjectId::new("alice"), &input("a", "b"), 10)
            .await
            .unwrap();

        let updated = store
            .update_post(&post.id, &input("new title", "new body"), 20)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.owner_id, "alice");
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.created_at, 10);
        assert_eq!(updated.updated_at, 20);

        assert!(
            store
                .update_post("missing", &input("x", "y"), 30)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = store().await;
        let alice = SubjectId::new("alice");
        store.create_post(&alice, &input("old", "b"), 10).await.unwrap();
        store.create_post(&alice, &input("new", "b"), 20).await.unwrap();

        let titles: Vec<String> = store
            .list_posts(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn delete_by_owner_leaves_other_owners_alone() {
        let store = store().await;
        let alice = SubjectId::new("alice");
        let bob = SubjectId::new("bob");
        store.create_post(&alice, &input("a1", "b"), 1).await.unwrap();
        store.create_post(&alice, &input("a2", "b"), 2).await.unwrap();
        let bobs = store.create_post(&bob, &input("b1", "b"), 3).await.unwrap();

        assert_eq!(store.delete_posts_by_owner(&alice).await.unwrap(), 2);
        assert_eq!(store.list_posts(10).await.unwrap(), vec![bobs.clone()]);

        assert!(store.delete_post(&bobs.id).await.unwrap());
        assert!(!store.delete_post(&bobs.id).await.unwrap());
    }
}
