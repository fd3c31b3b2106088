use serde::{Deserialize, Serialize};

/// A blog post as returned by the API.
///
/// `owner_id` is the subject that created the post and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Body of `POST /api/posts` and `PUT /api/posts/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub body: String,
}

impl PostInput {
    /// Returns the name of the first missing field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.body.trim().is_empty() {
            Some("body")
        } else {
            None
        }
    }
}
