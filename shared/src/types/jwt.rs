use serde::{Deserialize, Serialize};

/// Claims carried by the session credential the server hands out as a cookie.
///
/// The credential is an HS256 JWT signed with the session secret. Validity
/// is decided by the session validator, not the JWT library:
///   1. `now < exp`
///   2. `iat` is strictly after the subject's latest revocation marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject id as issued by the identity provider.
    pub sub: String,

    /// Random per-session id (UUID v4). Only used to correlate log lines;
    /// revocation is per subject, not per session.
    pub sid: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Absolute expiry (Unix timestamp, seconds): `iat + session lifetime`.
    pub exp: i64,
}

/// Claims the identity provider puts in its short-lived identity tokens.
///
/// Only `sub` and `auth_time` matter to session issuance; `iss`, `aud` and
/// `exp` are checked by the verifier before the claims are trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,

    /// When the user actually authenticated (Unix timestamp, seconds).
    /// Refreshing an identity token does not move this forward.
    pub auth_time: i64,

    pub iat: i64,
    pub exp: i64,
}
