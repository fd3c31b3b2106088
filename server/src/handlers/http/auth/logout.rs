use anyhow::{Context, Result};
use hyper::{Request, StatusCode};
use tracing::{error, info};

use crate::AppState;
use crate::database::utils::get_timestamp;
use crate::handlers::http::utils::{self, JsonResponse};

/// Revoke every session of the cookie's subject and clear the cookie.
///
/// The subject is read from the cookie's signature, not from the validated
/// viewer, so a revocation store that cannot be read still gets the write.
/// The cookie is cleared even when the revoke fails, but the client is told
/// with a 503 that other devices may still be signed in.
pub async fn handle_logout(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse> {
    let clear_cookie =
        utils::delete_cookie(&state.config.auth.cookie_name, state.config.auth.cookie_secure)
            .context("Failed to create clearing cookie")?;

    let credential = utils::get_cookie(req.headers(), &state.config.auth.cookie_name);
    let res = match state
        .sessions
        .logout(credential.as_deref().unwrap_or(""), get_timestamp())
        .await
    {
        Ok(Some(subject)) => {
            info!("User logged out: {}", subject);
            utils::deliver_success_json(
                Some(serde_json::json!({"message": "Logged out successfully"})),
                StatusCode::OK,
            )?
        }
        Ok(None) => utils::deliver_success_json(
            Some(serde_json::json!({"message": "Not signed in"})),
            StatusCode::OK,
        )?,
        Err(e) => {
            error!("Logout revocation failed: {}", e);
            utils::deliver_error_json(
                "REVOCATION_FAILED",
                "Could not sign out other sessions, try again",
                StatusCode::SERVICE_UNAVAILABLE,
            )?
        }
    };

    Ok(utils::with_cookie(res, clear_cookie))
}
