pub mod account;
pub mod auth;
pub mod posts;
pub mod routes;
pub mod utils;

pub use routes::build_router;
