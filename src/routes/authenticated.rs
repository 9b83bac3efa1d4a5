use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication middleware, so each handler receives a
/// verified `AuthUser` whose role was re-read from the database. Role and ownership checks
/// happen in the workflow, visibility and guard modules the handlers call into.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // DELETE /users/{id}
        // Self or admin. Removes the account and every dependent row in one transaction.
        .route("/users/{id}", delete(handlers::delete_user))
        // --- Universities ---
        // POST /universities
        // A university account files its university for admin approval.
        .route("/universities", post(handlers::create_university))
        .route("/universities/mine", get(handlers::my_university))
        // Approval queues of the caller's university (`?status=pending`).
        .route(
            "/universities/students",
            get(handlers::list_university_students),
        )
        .route("/universities/rsos", get(handlers::list_university_rsos))
        // PUT approves (pending -> active, exactly once); DELETE denies and removes the requester.
        .route(
            "/universities/students/{id}/approve",
            put(handlers::approve_student),
        )
        .route(
            "/universities/students/{id}",
            delete(handlers::deny_student),
        )
        .route(
            "/universities/rsos/{id}/approve",
            put(handlers::approve_rso),
        )
        .route("/universities/rsos/{id}", delete(handlers::deny_rso))
        // POST /universities/{id}/buildings
        // All-or-nothing batch insert by the owner.
        .route(
            "/universities/{id}/buildings",
            post(handlers::add_buildings),
        )
        // --- Students ---
        .route("/students", post(handlers::create_student))
        .route("/students/me/status", get(handlers::student_status))
        // --- RSOs ---
        // POST /rsos
        // Founds a pending RSO and promotes the caller to rso_admin atomically.
        .route("/rsos", post(handlers::create_rso))
        .route("/rsos/mine", get(handlers::my_rsos))
        .route("/rsos/{id}/status", get(handlers::rso_status))
        // POST /rsos/{id}/join
        // Files a pending membership; a second request is a 409.
        .route("/rsos/{id}/join", post(handlers::join_rso))
        .route("/rsos/{id}/members", get(handlers::list_rso_members))
        .route(
            "/rsos/{id}/members/{user_id}/approve",
            put(handlers::approve_membership),
        )
        .route(
            "/rsos/{id}/members/{user_id}",
            delete(handlers::deny_membership),
        )
        // --- Events ---
        // GET /events resolves the student view; the two scoped views below are role-gated.
        .route(
            "/events",
            get(handlers::list_student_events).post(handlers::create_event),
        )
        .route("/events/university", get(handlers::list_university_events))
        .route("/events/rso-admin", get(handlers::list_rso_admin_events))
        // Invisible events answer 404, like absent ones.
        .route(
            "/events/{id}",
            get(handlers::get_event)
                .put(handlers::update_event)
                .delete(handlers::delete_event),
        )
        // --- Comments ---
        .route(
            "/events/{id}/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .route(
            "/comments/{id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        // --- Ratings ---
        // One rating per (event, user); PUT replaces it.
        .route(
            "/events/{id}/rating",
            get(handlers::my_rating)
                .put(handlers::rate_event)
                .delete(handlers::delete_rating),
        )
        .route(
            "/events/{id}/rating/summary",
            get(handlers::rating_summary),
        )
}
