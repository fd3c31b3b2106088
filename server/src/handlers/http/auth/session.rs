use anyhow::Result;
use hyper::StatusCode;
use shared::types::SessionInfo;

use crate::handlers::http::utils::{self, JsonResponse};
use crate::session::SessionState;

/// Tell the front end whether the cookie it holds is still good.
pub fn handle_session_info(viewer: SessionState) -> Result<JsonResponse> {
    let info = SessionInfo {
        signed_in: viewer.is_signed_in(),
        subject: viewer.subject().map(|s| s.to_string()),
    };
    utils::deliver_serialized_json(&info, StatusCode::OK)
}
