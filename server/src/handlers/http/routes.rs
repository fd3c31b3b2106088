use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use hyper::{Method, Request, StatusCode};
use tracing::{debug, error, warn};

use crate::AppState;
use crate::database::utils::get_timestamp;
use crate::handlers::http::utils::*;
use crate::handlers::http::{account, auth, posts};
use crate::session::{SessionState, SubjectId};

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Every request has its session cookie validated exactly once, by the router,
// before any handler runs. Two tiers:
//
//   ViewerHandler    receives (req, state, viewer: SessionState).
//                    Anonymous viewers get through and the handler decides
//                    what they may see. Ownership checks go through
//                    `authorization_for(&viewer, &owner)`.
//
//   SignedInHandler  receives (req, state, subject). Anonymous viewers are
//                    answered 401 by the router.

type HandlerFuture = Pin<Box<dyn Future<Output = Result<JsonResponse>> + Send>>;

type ViewerHandler =
    Box<dyn Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> HandlerFuture + Send + Sync>;

type SignedInHandler =
    Box<dyn Fn(Request<hyper::body::Incoming>, AppState, SubjectId) -> HandlerFuture + Send + Sync>;

enum RouteKind {
    Viewer(ViewerHandler),
    SignedIn(SignedInHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn viewer<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Viewer(Box::new(move |req, state, viewer| {
                Box::pin(handler(req, state, viewer))
            })),
        });
        self
    }

    fn signed_in<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SubjectId) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::SignedIn(Box::new(move |req, state, subject| {
                Box::pin(handler(req, state, subject))
            })),
        });
        self
    }

    // ── Viewer routes (anonymous allowed) ─────────────────────────────────────

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.viewer(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.viewer(Method::POST, path, handler)
    }

    pub fn put<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.viewer(Method::PUT, path, handler)
    }

    pub fn delete<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SessionState) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.viewer(Method::DELETE, path, handler)
    }

    // ── Signed-in routes ──────────────────────────────────────────────────────

    pub fn post_signed_in<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SubjectId) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.signed_in(Method::POST, path, handler)
    }

    pub fn delete_signed_in<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, SubjectId) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JsonResponse>> + Send + 'static,
    {
        self.signed_in(Method::DELETE, path, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Route a request; failures become a JSON 500 instead of an error.
    pub async fn handle(&self, req: Request<hyper::body::Incoming>, state: AppState) -> JsonResponse {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.route(req, state).await {
            Ok(res) => res,
            Err(e) => {
                error!("{} {} failed: {:#}", method, path, e);
                internal_error()
            }
        }
    }

    pub async fn route(&self, req: Request<hyper::body::Incoming>, state: AppState) -> Result<JsonResponse> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let Some(route) = self
            .routes
            .iter()
            .find(|r| r.method == method && Self::path_matches(&r.path, &path))
        else {
            return deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
                .context("Failed to deliver 404 response");
        };

        let viewer = Self::viewer_state(&req, &state).await;

        match &route.kind {
            RouteKind::Viewer(h) => h(req, state, viewer).await,
            RouteKind::SignedIn(h) => match viewer {
                SessionState::Valid(subject) => h(req, state, subject).await,
                SessionState::Invalid => {
                    warn!("Signed-in route {} {} called anonymously", method, path);
                    unauthorized()
                }
            },
        }
    }

    async fn viewer_state(req: &Request<hyper::body::Incoming>, state: &AppState) -> SessionState {
        let credential = get_cookie(req.headers(), &state.config.auth.cookie_name);
        let viewer = state
            .sessions
            .validate(credential.as_deref().unwrap_or(""), get_timestamp())
            .await;
        debug!("Viewer: {:?}", viewer.subject());
        viewer
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/api/posts/:id"  matches  "/api/posts/42"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| (r.starts_with(':') && !p.is_empty()) || r == p)
    }
}

/// The `index`-th path segment (0 = first after the leading slash).
pub fn path_segment(req: &Request<hyper::body::Incoming>, index: usize) -> Option<String> {
    req.uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .nth(index)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn unauthorized() -> Result<JsonResponse> {
    deliver_error_json(
        "UNAUTHORIZED",
        "Authentication required",
        StatusCode::UNAUTHORIZED,
    )
    .context("Failed to deliver 401 response")
}

pub fn forbidden() -> Result<JsonResponse> {
    deliver_error_json(
        "FORBIDDEN",
        "Only the owner may do that",
        StatusCode::FORBIDDEN,
    )
    .context("Failed to deliver 403 response")
}

// ---------------------------------------------------------------------------
// API router
// ---------------------------------------------------------------------------

pub fn build_router() -> Router {
    Router::new()
        .get("/health", |_req, _state, _viewer| async move {
            deliver_success_json(Some(serde_json::json!({"health": "ok"})), StatusCode::OK)
        })
        // ── Session ──────────────────────────────────────────────────────────
        .post("/session/login", |req, state, _viewer| async move {
            auth::handle_session_login(req, state)
                .await
                .context("Session login failed")
        })
        .post("/session/logout", |req, state, _viewer| async move {
            auth::handle_logout(req, state)
                .await
                .context("Logout failed")
        })
        .get("/api/session", |_req, _state, viewer| async move {
            auth::handle_session_info(viewer).context("Session info failed")
        })
        // ── Posts ────────────────────────────────────────────────────────────
        .get("/api/posts", |_req, state, _viewer| async move {
            posts::handle_list_posts(state)
                .await
                .context("Post list failed")
        })
        .get("/api/posts/:id", |req, state, viewer| async move {
            posts::handle_get_post(req, state, viewer)
                .await
                .context("Post get failed")
        })
        .post_signed_in("/api/posts", |req, state, subject| async move {
            posts::handle_create_post(req, state, subject)
                .await
                .context("Post create failed")
        })
        .put("/api/posts/:id", |req, state, viewer| async move {
            posts::handle_update_post(req, state, viewer)
                .await
                .context("Post update failed")
        })
        .delete("/api/posts/:id", |req, state, viewer| async move {
            posts::handle_delete_post(req, state, viewer)
                .await
                .context("Post delete failed")
        })
        // ── Account ──────────────────────────────────────────────────────────
        .delete_signed_in("/api/account", |_req, state, subject| async move {
            account::handle_delete_account(state, subject)
                .await
                .context("Account deletion failed")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_paths_match() {
        assert!(Router::path_matches("/api/posts", "/api/posts"));
        assert!(Router::path_matches("/api/posts", "/api/posts?page=2"));
        assert!(!Router::path_matches("/api/posts", "/api/post"));
    }

    #[test]
    fn params_match_one_non_empty_segment() {
        assert!(Router::path_matches("/api/posts/:id", "/api/posts/abc-123"));
        assert!(!Router::path_matches("/api/posts/:id", "/api/posts/"));
        assert!(!Router::path_matches("/api/posts/:id", "/api/posts/a/b"));
    }

    #[test]
    fn router_registers_every_route() {
        assert_eq!(build_router().routes.len(), 10);
    }
}
