use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Domain rules: approval state machine, event visibility, ownership checks.
pub mod guard;
pub mod visibility;
pub mod workflow;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire model, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me, handlers::update_me,
        handlers::delete_user, handlers::list_active_universities, handlers::create_university,
        handlers::my_university, handlers::list_university_students,
        handlers::list_university_rsos, handlers::approve_student, handlers::deny_student,
        handlers::approve_rso, handlers::deny_rso, handlers::add_buildings,
        handlers::list_buildings, handlers::create_student, handlers::student_status,
        handlers::create_rso, handlers::my_rsos, handlers::rso_status, handlers::join_rso,
        handlers::list_rso_members, handlers::approve_membership, handlers::deny_membership,
        handlers::list_student_events, handlers::list_university_events,
        handlers::list_rso_admin_events, handlers::create_event, handlers::get_event,
        handlers::update_event, handlers::delete_event, handlers::list_comments,
        handlers::add_comment, handlers::update_comment, handlers::delete_comment,
        handlers::rate_event, handlers::my_rating, handlers::delete_rating,
        handlers::rating_summary, handlers::admin_list_users, handlers::admin_list_universities,
        handlers::approve_university, handlers::deny_university
    ),
    components(
        schemas(
            models::Role, models::Status, models::Visibility, models::EventCategory,
            models::UserProfile, models::University, models::Student, models::Rso,
            models::RsoMembership, models::Event, models::EventComment, models::EventRating,
            models::Building, models::RegisterUserRequest, models::LoginRequest,
            models::LoginResponse, models::UpdateUserRequest, models::CreateUniversityRequest,
            models::CreateStudentRequest, models::CreateRsoRequest, models::CreateEventRequest,
            models::UpdateEventRequest, models::CommentRequest, models::RatingRequest,
            models::NewBuilding, models::AddBuildingsRequest, models::CreatedResponse,
            models::MessageResponse, models::StatusResponse, models::RatingSummary,
            models::BuildingsAdded, error::ErrorResponse,
        )
    ),
    tags(
        (name = "campus-events", description = "University Event Management API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single state shared by every request: the store handle and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Entity store. `PostgresRepository` in production, `InMemoryRepository` in tests.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors (notably `AuthUser`) pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor before any protected handler. A missing, invalid or
/// expired credential is rejected with 401 and the handler never executes.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the full routing tree, applies scoped and global middleware, and binds the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // The admin role check happens inside the handlers, after authentication.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of one request carries its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
