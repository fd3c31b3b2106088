use anyhow::{Context, Result};
use hyper::StatusCode;
use tracing::error;

use crate::AppState;
use crate::database::utils::get_timestamp;
use crate::handlers::http::utils::{self, JsonResponse};
use crate::session::SubjectId;

/// Delete the caller's account: revoke every session, then drop their posts.
pub async fn handle_delete_account(state: AppState, subject: SubjectId) -> Result<JsonResponse> {
    match state
        .sessions
        .delete_account(&subject, get_timestamp(), &state.posts)
        .await
    {
        Ok(deletion) => {
            let clear_cookie = utils::delete_cookie(
                &state.config.auth.cookie_name,
                state.config.auth.cookie_secure,
            )
            .context("Failed to create clearing cookie")?;

            let res = utils::deliver_success_json(
                Some(serde_json::json!({
                    "subject": deletion.subject,
                    "postsDeleted": deletion.resources_deleted,
                })),
                StatusCode::OK,
            )?;
            Ok(utils::with_cookie(res, clear_cookie))
        }
        Err(e) => {
            error!("Account deletion failed for {}: {}", subject, e);
            utils::deliver_error_json(
                "ACCOUNT_DELETION_FAILED",
                "Account could not be deleted, try again",
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    }
}
