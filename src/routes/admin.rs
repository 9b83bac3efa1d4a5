use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Platform administration, nested under `/admin`. The router is wrapped by the same
/// authentication middleware as the authenticated routes; the `admin` role itself is checked
/// inside each handler.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        .route("/users", get(handlers::admin_list_users))
        // GET /admin/universities?status=pending
        // The university approval queue.
        .route("/universities", get(handlers::admin_list_universities))
        // University approval is admin-only.
        .route(
            "/universities/{id}/approve",
            put(handlers::approve_university),
        )
        .route("/universities/{id}", delete(handlers::deny_university))
}
