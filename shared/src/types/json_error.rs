use serde::{Deserialize, Serialize};

use crate::types::login::LoginError;

/// Error envelope every JSON endpoint answers with:
/// `{"status":"error","code":"...","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<&LoginError> for ErrorResponse {
    fn from(err: &LoginError) -> Self {
        Self::new(err.to_code(), &err.to_message())
    }
}
