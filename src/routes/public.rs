use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credential. Nothing served here depends on who is asking: only
/// active universities and their buildings are listed.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a `university` or `student` account.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Exchanges email and password for a signed token.
        .route("/auth/login", post(handlers::login))
        // GET /universities
        // Universities that passed admin approval.
        .route("/universities", get(handlers::list_active_universities))
        // GET /universities/{id}/buildings
        .route(
            "/universities/{id}/buildings",
            get(handlers::list_buildings),
        )
}
