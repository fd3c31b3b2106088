use anyhow::{Context, Result};
use hyper::{Request, StatusCode};
use shared::types::{LoginError, LoginResponse, SessionLoginData};
use tracing::{info, warn};

use crate::AppState;
use crate::database::utils::get_timestamp;
use crate::handlers::http::utils::{self, BodyError, JsonResponse};
use crate::session::AuthError;

/// Exchange a fresh identity token for a session cookie.
pub async fn handle_session_login(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse> {
    info!("Processing session login request");

    let login_data = match parse_login_body(req).await {
        Ok(data) => data,
        Err(LoginBodyError::Login(login_error)) => {
            warn!("Session login parsing failed: {}", login_error.to_code());
            return utils::deliver_serialized_json(
                &login_error.to_response(),
                StatusCode::BAD_REQUEST,
            );
        }
        Err(LoginBodyError::Body(body_error)) => {
            warn!("Session login body refused: {}", body_error.to_code());
            return utils::deliver_error_json(
                body_error.to_code(),
                &body_error.to_message(),
                body_error.status(),
            );
        }
    };

    let credential = match state
        .sessions
        .issue(&login_data.id_token, get_timestamp())
        .await
    {
        Ok(credential) => credential,
        Err(auth_error) => {
            let login_error = LoginError::from(&auth_error);
            warn!("Session login refused: {}", auth_error);
            return utils::deliver_serialized_json(
                &login_error.to_response(),
                status_for(&auth_error),
            );
        }
    };

    info!(
        "Session issued: subject={}, session_id={}",
        credential.subject, credential.session_id
    );

    let lifetime = state.sessions.policy().session_lifetime;
    let cookie = utils::create_persistent_cookie(
        &state.config.auth.cookie_name,
        credential.token(),
        lifetime,
        state.config.auth.cookie_secure,
    )
    .context("Failed to create session cookie")?;

    let response = LoginResponse::Success {
        subject: credential.subject.to_string(),
        expires_in: lifetime.as_secs(),
        message: "Signed in".to_string(),
        redirect: "/".to_string(),
    };

    let res = utils::deliver_serialized_json(&response, StatusCode::OK)?;
    Ok(utils::with_cookie(res, cookie))
}

enum LoginBodyError {
    Login(LoginError),
    Body(BodyError),
}

async fn parse_login_body(
    req: Request<hyper::body::Incoming>,
) -> Result<SessionLoginData, LoginBodyError> {
    let data: SessionLoginData = utils::parse_body(req).await.map_err(|e| match e {
        BodyError::Malformed(_) => {
            LoginBodyError::Login(LoginError::MissingField("id_token".to_string()))
        }
        other => LoginBodyError::Body(other),
    })?;

    if data.id_token.trim().is_empty() {
        return Err(LoginBodyError::Login(LoginError::MissingField(
            "id_token".to_string(),
        )));
    }

    Ok(data)
}

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidToken | AuthError::StaleAuthentication { .. } => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::ProviderUnavailable(_) | AuthError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
