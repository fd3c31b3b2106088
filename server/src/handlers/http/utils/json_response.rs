use anyhow::{Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use shared::types::ErrorResponse;
use std::convert::Infallible;
use tracing::{debug, error, warn};

pub type JsonResponse = Response<BoxBody<Bytes, Infallible>>;

pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    Full::new(chunk.into()).boxed()
}

/// Serialize any `Serialize` type and deliver it as a JSON response.
pub fn deliver_serialized_json<T: Serialize>(data: &T, status: StatusCode) -> Result<JsonResponse> {
    let json = serde_json::to_string(data).map_err(|e| anyhow!("Failed to serialize response: {}", e))?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-store")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))
}

/// Delivers a JSON error response with the specified error code, message, and status.
pub fn deliver_error_json(error_code: &str, message: &str, status: StatusCode) -> Result<JsonResponse> {
    if status.is_server_error() {
        error!("Delivering error JSON: {} - {} ({})", status.as_u16(), error_code, message);
    } else {
        warn!("Delivering error JSON: {} - {} ({})", status.as_u16(), error_code, message);
    }

    deliver_serialized_json(&ErrorResponse::new(error_code, message), status)
}

/// Delivers a success JSON response with optional data.
pub fn deliver_success_json<T: Serialize>(data: Option<T>, status: StatusCode) -> Result<JsonResponse> {
    let body = match data {
        Some(d) => json!({
            "status": "success",
            "data": d
        }),
        None => json!({
            "status": "success"
        }),
    };

    deliver_serialized_json(&body, status)
}

/// Attach a `Set-Cookie` header to an already-built response.
pub fn with_cookie(mut res: JsonResponse, cookie: HeaderValue) -> JsonResponse {
    res.headers_mut().append(header::SET_COOKIE, cookie);
    res
}

/// Last-resort 500 for when even building an error response failed.
pub fn internal_error() -> JsonResponse {
    let mut res = Response::new(full(
        r#"{"status":"error","code":"INTERNAL_ERROR","message":"An internal error occurred"}"#,
    ));
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: JsonResponse) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let res = deliver_error_json("FORBIDDEN", "Not yours", StatusCode::FORBIDDEN).unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_json(res).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "FORBIDDEN");
        assert_eq!(body["message"], "Not yours");
    }

    #[tokio::test]
    async fn success_envelope_wraps_data() {
        let res = deliver_success_json(Some(json!({"n": 1})), StatusCode::CREATED).unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["n"], 1);
    }

    #[tokio::test]
    async fn internal_error_is_well_formed_json() {
        let res = internal_error();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await["code"], "INTERNAL_ERROR");
    }
}
