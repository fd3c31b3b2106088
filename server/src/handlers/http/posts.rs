use anyhow::{Context, Result};
use hyper::{Request, StatusCode};
use serde::Serialize;
use shared::types::{Authorization, Post, PostInput};
use tracing::{info, warn};

use crate::AppState;
use crate::database::utils::get_timestamp;
use crate::handlers::http::routes::{forbidden, path_segment, unauthorized};
use crate::handlers::http::utils::{self, JsonResponse};
use crate::session::{SessionState, SubjectId, authorization_for};

const LIST_LIMIT: i64 = 50;

/// `GET /api/posts/:id` body: the post plus what the viewer may do with it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    post: Post,
    authorization: Authorization,
}

pub async fn handle_list_posts(state: AppState) -> Result<JsonResponse> {
    let posts = state
        .posts
        .list_posts(LIST_LIMIT)
        .await
        .context("Failed to list posts")?;
    utils::deliver_success_json(Some(posts), StatusCode::OK)
}

pub async fn handle_get_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    viewer: SessionState,
) -> Result<JsonResponse> {
    let Some(post) = load_post(&req, &state).await? else {
        return not_found();
    };

    let authorization = authorization_for(&viewer, &SubjectId::new(post.owner_id.as_str()));
    utils::deliver_success_json(Some(PostView { post, authorization }), StatusCode::OK)
}

pub async fn handle_create_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    subject: SubjectId,
) -> Result<JsonResponse> {
    let input = match read_input(req).await {
        Ok(input) => input,
        Err(res) => return res,
    };

    let post = state
        .posts
        .create_post(&subject, &input, get_timestamp())
        .await
        .context("Failed to create post")?;
    utils::deliver_success_json(Some(post), StatusCode::CREATED)
}

pub async fn handle_update_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    viewer: SessionState,
) -> Result<JsonResponse> {
    let Some(post) = load_post(&req, &state).await? else {
        return not_found();
    };
    if let Some(refusal) = refuse_non_owner(&viewer, &post) {
        return refusal;
    }

    let input = match read_input(req).await {
        Ok(input) => input,
        Err(res) => return res,
    };

    match state
        .posts
        .update_post(&post.id, &input, get_timestamp())
        .await
        .context("Failed to update post")?
    {
        Some(updated) => utils::deliver_success_json(Some(updated), StatusCode::OK),
        None => not_found(),
    }
}

pub async fn handle_delete_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    viewer: SessionState,
) -> Result<JsonResponse> {
    let Some(post) = load_post(&req, &state).await? else {
        return not_found();
    };
    if let Some(refusal) = refuse_non_owner(&viewer, &post) {
        return refusal;
    }

    if !state
        .posts
        .delete_post(&post.id)
        .await
        .context("Failed to delete post")?
    {
        return not_found();
    }

    info!("Post {} deleted by its owner", post.id);
    utils::deliver_success_json(Some(serde_json::json!({"id": post.id})), StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_post(req: &Request<hyper::body::Incoming>, state: &AppState) -> Result<Option<Post>> {
    let Some(id) = path_segment(req, 2) else {
        return Ok(None);
    };
    state.posts.get_post(&id).await.context("Failed to load post")
}

/// 401 for anonymous viewers, 403 for signed-in non-owners.
fn refuse_non_owner(viewer: &SessionState, post: &Post) -> Option<Result<JsonResponse>> {
    let authorization = authorization_for(viewer, &SubjectId::new(post.owner_id.as_str()));
    if !authorization.signed_in {
        return Some(unauthorized());
    }
    if !authorization.is_owner {
        warn!(
            "Post {} write refused for non-owner {:?}",
            post.id,
            viewer.subject()
        );
        return Some(forbidden());
    }
    None
}

async fn read_input(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<PostInput, Result<JsonResponse>> {
    let input: PostInput = utils::parse_body(req).await.map_err(|e| {
        utils::deliver_error_json(e.to_code(), &e.to_message(), e.status())
    })?;

    if let Some(field) = input.missing_field() {
        return Err(utils::deliver_error_json(
            "MISSING_FIELD",
            &format!("Missing required field: {}", field),
            StatusCode::BAD_REQUEST,
        ));
    }

    Ok(input)
}

fn not_found() -> Result<JsonResponse> {
    utils::deliver_error_json("NOT_FOUND", "Post not found", StatusCode::NOT_FOUND)
}
