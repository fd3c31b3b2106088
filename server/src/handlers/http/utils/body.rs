use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, StatusCode, header};
use serde::de::DeserializeOwned;

use super::headers::get_header_value;

/// Request bodies above this are refused before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    TooLarge,
    Unreadable,
    Malformed(String),
}

impl BodyError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::TooLarge => "PAYLOAD_TOO_LARGE",
            Self::Unreadable => "UNREADABLE_BODY",
            Self::Malformed(_) => "INVALID_BODY",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unreadable | Self::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::TooLarge => format!("Request body exceeds {} bytes", MAX_BODY_BYTES),
            Self::Unreadable => "Failed to read request body".to_string(),
            Self::Malformed(reason) => format!("Malformed request body: {}", reason),
        }
    }
}

async fn read_body(req: Request<Incoming>) -> Result<(bool, Bytes), BodyError> {
    let is_json = get_header_value(req.headers(), header::CONTENT_TYPE.as_str())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    let body = collect_limited(req.into_body()).await?;
    Ok((is_json, body))
}

async fn collect_limited<B>(body: B) -> Result<Bytes, BodyError>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.is::<http_body_util::LengthLimitError>() {
                BodyError::TooLarge
            } else {
                BodyError::Unreadable
            }
        })
}

/// Decode a JSON or `application/x-www-form-urlencoded` body into `T`.
///
/// Form fields are all strings, so `T` should only have string fields when
/// it is meant to accept form posts.
pub async fn parse_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, BodyError> {
    let (is_json, body) = read_body(req).await?;
    decode_body(is_json, &body)
}

pub fn decode_body<T: DeserializeOwned>(is_json: bool, body: &[u8]) -> Result<T, BodyError> {
    if is_json {
        return serde_json::from_slice(body).map_err(|e| BodyError::Malformed(e.to_string()));
    }

    let params = form_urlencoded::parse(body)
        .into_owned()
        .collect::<HashMap<String, String>>();

    serde_json::to_value(params)
        .and_then(serde_json::from_value)
        .map_err(|e| BodyError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use shared::types::{PostInput, SessionLoginData};

    #[test]
    fn decodes_json_and_form_bodies() {
        let json: SessionLoginData = decode_body(true, br#"{"idToken":"abc"}"#).unwrap();
        assert_eq!(json.id_token, "abc");

        let form: SessionLoginData = decode_body(false, b"id_token=a%2Eb%2Ec").unwrap();
        assert_eq!(form.id_token, "a.b.c");

        let post: PostInput = decode_body(false, b"title=Hi&body=There").unwrap();
        assert_eq!(post.title, "Hi");
    }

    #[tokio::test]
    async fn oversized_body_is_too_large() {
        let big = Full::new(Bytes::from(vec![b'a'; MAX_BODY_BYTES + 1]));
        let err = collect_limited(big).await.unwrap_err();
        assert_eq!(err, BodyError::TooLarge);
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_code(), "PAYLOAD_TOO_LARGE");

        let fits = Full::new(Bytes::from(vec![b'a'; MAX_BODY_BYTES]));
        assert_eq!(collect_limited(fits).await.unwrap().len(), MAX_BODY_BYTES);
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        let err = BodyError::Malformed("eof".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_code(), "INVALID_BODY");
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = decode_body::<SessionLoginData>(false, b"other=1").unwrap_err();
        assert!(matches!(err, BodyError::Malformed(_)));
    }
}
