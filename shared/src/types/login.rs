use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session login wire types
// ---------------------------------------------------------------------------

/// Body of `POST /session/login`: the identity token the browser just got
/// back from the identity provider.
#[derive(Debug, Deserialize)]
pub struct SessionLoginData {
    #[serde(alias = "idToken")]
    pub id_token: String,
}

/// Successful / failed session login response envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Success {
        subject: String,
        expires_in: u64,
        message: String,
        redirect: String,
    },
    Error {
        code: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Login errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    MissingField(String),
    InvalidToken,
    StaleAuthentication,
    ProviderUnavailable,
    StoreUnavailable,
}

impl LoginError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::StaleAuthentication => "STALE_AUTHENTICATION",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::InvalidToken => "Authentication failed".to_string(),
            Self::StaleAuthentication => "Please sign in again".to_string(),
            Self::ProviderUnavailable => {
                "Identity provider unavailable, try again later".to_string()
            }
            Self::StoreUnavailable => "Session store unavailable, try again later".to_string(),
        }
    }

    pub fn to_response(&self) -> LoginResponse {
        LoginResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// What the routing layer needs to pick a view: anonymous, signed in, or
/// signed in as the owner of the resource being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub signed_in: bool,
    pub is_owner: bool,
}

impl Authorization {
    pub const ANONYMOUS: Self = Self {
        signed_in: false,
        is_owner: false,
    };
}

/// Response body of `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}
