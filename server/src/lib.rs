//! Blog backend: identity-token sign-in exchanged for revocable cookie
//! sessions, and owner-only editing of posts.

pub mod database;
pub mod handlers;
pub mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use shared::types::AppConfig;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::database::{PostStore, SqliteRevocationRegistry};
use crate::handlers::http::routes::{Router, build_router};
use crate::session::{JwtIdentityProvider, SessionPolicy, SessionService};

/// Everything a request handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionService>,
    pub posts: PostStore,
}

/// Open the database, make sure the schema exists and wire up the session
/// core from configuration.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let db = database::connect(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    database::create_tables(&db)
        .await
        .context("Failed to create database tables")?;

    let provider = JwtIdentityProvider::from_config(&config)
        .context("Failed to set up identity provider")?;
    let registry = SqliteRevocationRegistry::new(db.clone());
    let policy = SessionPolicy::from_config(&config.auth);

    info!(
        "Session policy: reauth_window={:?}, session_lifetime={:?}",
        policy.reauth_window, policy.session_lifetime
    );

    let sessions = SessionService::new(Arc::new(provider), Arc::new(registry), policy);

    Ok(AppState {
        config: Arc::new(config),
        posts: PostStore::new(db),
        sessions: Arc::new(sessions),
    })
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let router = Arc::new(build_router());
    info!("Listening on http://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let router = Arc::clone(&router);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let router: Arc<Router> = Arc::clone(&router);
                let state = state.clone();
                async move { Ok::<_, std::convert::Infallible>(router.handle(req, state).await) }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
