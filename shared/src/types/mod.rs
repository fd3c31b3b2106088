pub mod json_error;
pub mod jwt;
pub mod login;
pub mod post;
pub mod server_config;

pub use self::json_error::ErrorResponse;
pub use self::jwt::{IdentityClaims, SessionClaims};
pub use self::login::{Authorization, LoginError, LoginResponse, SessionInfo, SessionLoginData};
pub use self::post::{Post, PostInput};
pub use self::server_config::{AppConfig, ConfigError};
