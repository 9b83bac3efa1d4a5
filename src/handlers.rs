use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, AppResult, ErrorResponse},
    guard,
    models::{
        AddBuildingsRequest, Building, BuildingsAdded, CommentRequest, CreateEventRequest,
        CreateRsoRequest, CreateStudentRequest, CreateUniversityRequest, CreatedResponse, Event,
        EventComment, EventRating, LoginRequest, LoginResponse, MessageResponse, RatingRequest,
        RatingSummary, RegisterUserRequest, Role, Rso, RsoMembership, Status, StatusResponse,
        Student, University, UpdateEventRequest, UpdateUserRequest, UserProfile,
    },
    repository::Repository,
    visibility::{self, Scope},
    workflow::{self, ApprovalKind},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use validator::Validate;

// --- Filter Structs ---

/// StatusFilter
///
/// Query parameters for the approval queues (`?status=pending`). `university_id` lets an
/// admin pick the university whose queue to read; owners always get their own.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct StatusFilter {
    pub status: Option<Status>,
    pub university_id: Option<i64>,
}

type Created = (StatusCode, Json<CreatedResponse>);

fn created(id: i64, message: &str) -> Created {
    (
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: message.to_string(),
        }),
    )
}

fn require_admin(actor: &AuthUser) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

/// The university whose queues `actor` may read: their own, or (for admins) the one named.
async fn managed_university(
    repo: &dyn Repository,
    actor: &AuthUser,
    requested: Option<i64>,
) -> AppResult<i64> {
    if actor.is_admin() {
        return requested.ok_or_else(|| {
            AppError::Validation("university_id is required for admins".to_string())
        });
    }

    let owned = repo
        .university_owned_by(actor.user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Only university owners can do this".to_string()))?;

    match requested {
        Some(id) if id != owned.university_id => Err(AppError::Forbidden(
            "You can only manage your own university".to_string(),
        )),
        _ => Ok(owned.university_id),
    }
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Self-service account creation. Only `university` and `student` may be chosen.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = CreatedResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<Created> {
    payload.validate()?;

    if !matches!(payload.role, Role::University | Role::Student) {
        return Err(AppError::Validation(
            "role must be university or student".to_string(),
        ));
    }

    if state.repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(&payload.email, &password_hash, payload.role)
        .await?;

    tracing::info!(user_id = user.user_id, role = ?user.role, "user registered");
    Ok(created(user.user_id, "User registered successfully"))
}

/// login
///
/// [Public Route] Exchanges credentials for a signed token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user_id = user.user_id, "login failed");
        return Err(AppError::InvalidCredentials);
    }

    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.token_ttl_secs)?;
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(actor: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(actor.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

/// update_me
///
/// [Authenticated Route] Changes the caller's email and/or password. The role never changes here.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn update_me(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserProfile>> {
    payload.validate()?;

    if let Some(email) = &payload.email {
        let taken = state
            .repo
            .get_user_by_email(email)
            .await?
            .is_some_and(|u| u.user_id != actor.user_id);
        if taken {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }

    let password_hash = payload
        .password
        .as_deref()
        .map(auth::hash_password)
        .transpose()?;

    let user = state
        .repo
        .update_user(actor.user_id, payload.email, password_hash)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

/// delete_user
///
/// [Authenticated Route] Removes an account and everything hanging off it. Self or admin.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not yourself", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    if actor.user_id != user_id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "You can only delete your own account".to_string(),
        ));
    }

    if !state.repo.delete_user(user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(actor = actor.user_id, user_id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}

// --- Universities ---

/// list_active_universities
///
/// [Public Route] Universities that completed admin approval.
#[utoipa::path(
    get,
    path = "/universities",
    responses((status = 200, description = "Active universities", body = [University]))
)]
pub async fn list_active_universities(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<University>>> {
    Ok(Json(state.repo.list_universities(Some(Status::Active)).await?))
}

/// create_university
///
/// [Authenticated Route] A `university` account files its university; it starts `pending`.
#[utoipa::path(
    post,
    path = "/universities",
    request_body = CreateUniversityRequest,
    responses(
        (status = 201, description = "Created (pending)", body = CreatedResponse),
        (status = 403, description = "Not a university account", body = ErrorResponse),
        (status = 409, description = "Already registered", body = ErrorResponse)
    )
)]
pub async fn create_university(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUniversityRequest>,
) -> AppResult<Created> {
    payload.validate()?;
    let university = workflow::register_university(state.repo.as_ref(), &actor, payload).await?;
    Ok(created(
        university.university_id,
        "University registered, awaiting admin approval",
    ))
}

#[utoipa::path(
    get,
    path = "/universities/mine",
    responses(
        (status = 200, description = "Owned university", body = University),
        (status = 404, description = "None registered", body = ErrorResponse)
    )
)]
pub async fn my_university(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<University>> {
    state
        .repo
        .university_owned_by(actor.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))
}

/// list_university_students
///
/// [Authenticated Route] Student records of the caller's university, optionally by status.
#[utoipa::path(
    get,
    path = "/universities/students",
    params(StatusFilter),
    responses(
        (status = 200, description = "Students", body = [Student]),
        (status = 403, description = "Not a university owner", body = ErrorResponse)
    )
)]
pub async fn list_university_students(
    actor: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<Json<Vec<Student>>> {
    let university_id = managed_university(state.repo.as_ref(), &actor, filter.university_id).await?;
    Ok(Json(state.repo.list_students(university_id, filter.status).await?))
}

#[utoipa::path(
    get,
    path = "/universities/rsos",
    params(StatusFilter),
    responses(
        (status = 200, description = "RSOs", body = [Rso]),
        (status = 403, description = "Not a university owner", body = ErrorResponse)
    )
)]
pub async fn list_university_rsos(
    actor: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<Json<Vec<Rso>>> {
    let university_id = managed_university(state.repo.as_ref(), &actor, filter.university_id).await?;
    Ok(Json(state.repo.list_rsos(university_id, filter.status).await?))
}

/// approve_student
///
/// [Authenticated Route] `pending -> active` for a Student. Owner of the student's university.
#[utoipa::path(
    put,
    path = "/universities/students/{id}/approve",
    params(("id" = i64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or already approved", body = ErrorResponse)
    )
)]
pub async fn approve_student(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::approve(state.repo.as_ref(), &actor, ApprovalKind::Student, student_id).await?;
    Ok(Json(MessageResponse::new("Student approved")))
}

/// deny_student
///
/// [Authenticated Route] Rejects a pending Student. The requesting account is removed.
#[utoipa::path(
    delete,
    path = "/universities/students/{id}",
    params(("id" = i64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Denied", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or not pending", body = ErrorResponse)
    )
)]
pub async fn deny_student(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::deny(state.repo.as_ref(), &actor, ApprovalKind::Student, student_id).await?;
    Ok(Json(MessageResponse::new(
        "Student denied and user account removed",
    )))
}

#[utoipa::path(
    put,
    path = "/universities/rsos/{id}/approve",
    params(("id" = i64, Path, description = "RSO ID")),
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or already approved", body = ErrorResponse)
    )
)]
pub async fn approve_rso(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(rso_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::approve(state.repo.as_ref(), &actor, ApprovalKind::Rso, rso_id).await?;
    Ok(Json(MessageResponse::new("RSO approved")))
}

/// deny_rso
///
/// [Authenticated Route] Rejects a pending RSO together with the account that founded it.
#[utoipa::path(
    delete,
    path = "/universities/rsos/{id}",
    params(("id" = i64, Path, description = "RSO ID")),
    responses(
        (status = 200, description = "Denied", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or not pending", body = ErrorResponse)
    )
)]
pub async fn deny_rso(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(rso_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::deny(state.repo.as_ref(), &actor, ApprovalKind::Rso, rso_id).await?;
    Ok(Json(MessageResponse::new(
        "RSO denied and founding account removed",
    )))
}

// --- Buildings ---

/// add_buildings
///
/// [Authenticated Route] Inserts a batch of buildings for a university; all or none.
#[utoipa::path(
    post,
    path = "/universities/{id}/buildings",
    params(("id" = i64, Path, description = "University ID")),
    request_body = AddBuildingsRequest,
    responses(
        (status = 201, description = "Added", body = BuildingsAdded),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "University not found", body = ErrorResponse)
    )
)]
pub async fn add_buildings(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(university_id): Path<i64>,
    Json(payload): Json<AddBuildingsRequest>,
) -> AppResult<(StatusCode, Json<BuildingsAdded>)> {
    payload.validate()?;

    let university = state
        .repo
        .get_university(university_id)
        .await?
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))?;

    if !actor.is_admin() && university.user_id != actor.user_id {
        return Err(AppError::Forbidden(
            "You can only add buildings to your own university".to_string(),
        ));
    }

    let count = state
        .repo
        .add_buildings(university_id, payload.buildings)
        .await?;

    tracing::info!(university_id, count, "buildings added");
    Ok((
        StatusCode::CREATED,
        Json(BuildingsAdded {
            university_id,
            count,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/universities/{id}/buildings",
    params(("id" = i64, Path, description = "University ID")),
    responses(
        (status = 200, description = "Buildings", body = [Building]),
        (status = 404, description = "University not found", body = ErrorResponse)
    )
)]
pub async fn list_buildings(
    State(state): State<AppState>,
    Path(university_id): Path<i64>,
) -> AppResult<Json<Vec<Building>>> {
    state
        .repo
        .get_university(university_id)
        .await?
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))?;
    Ok(Json(state.repo.list_buildings(university_id).await?))
}

// --- Students ---

/// create_student
///
/// [Authenticated Route] Enrollment request at an active university.
#[utoipa::path(
    post,
    path = "/students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Created (pending)", body = CreatedResponse),
        (status = 404, description = "University not found or not active", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse)
    )
)]
pub async fn create_student(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentRequest>,
) -> AppResult<Created> {
    payload.validate()?;
    let student = workflow::enroll_student(state.repo.as_ref(), &actor, payload).await?;
    Ok(created(
        student.student_id,
        "Student record created, awaiting university approval",
    ))
}

#[utoipa::path(
    get,
    path = "/students/me/status",
    responses(
        (status = 200, description = "Enrollment status", body = StatusResponse),
        (status = 404, description = "No student record", body = ErrorResponse)
    )
)]
pub async fn student_status(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<StatusResponse>> {
    let student = state
        .repo
        .student_for_user(actor.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student record not found".to_string()))?;
    Ok(Json(StatusResponse {
        status: student.status,
    }))
}

// --- RSOs ---

/// create_rso
///
/// [Authenticated Route] Founds a pending RSO; the caller becomes its `rso_admin` atomically.
#[utoipa::path(
    post,
    path = "/rsos",
    request_body = CreateRsoRequest,
    responses(
        (status = 201, description = "Created (pending)", body = CreatedResponse),
        (status = 403, description = "Not an active student there", body = ErrorResponse),
        (status = 404, description = "University not found", body = ErrorResponse)
    )
)]
pub async fn create_rso(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateRsoRequest>,
) -> AppResult<Created> {
    payload.validate()?;
    let rso = workflow::create_rso(state.repo.as_ref(), &actor, payload).await?;
    Ok(created(
        rso.rso_id,
        "RSO created, awaiting approval. You are now its administrator",
    ))
}

#[utoipa::path(
    get,
    path = "/rsos/mine",
    responses((status = 200, description = "RSOs administered by the caller", body = [Rso]))
)]
pub async fn my_rsos(actor: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<Rso>>> {
    Ok(Json(state.repo.rsos_administered_by(actor.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/rsos/{id}/status",
    params(("id" = i64, Path, description = "RSO ID")),
    responses(
        (status = 200, description = "Approval status", body = StatusResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn rso_status(
    _actor: AuthUser,
    State(state): State<AppState>,
    Path(rso_id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    let rso = state
        .repo
        .get_rso(rso_id)
        .await?
        .ok_or_else(|| AppError::NotFound("RSO not found".to_string()))?;
    Ok(Json(StatusResponse { status: rso.status }))
}

/// join_rso
///
/// [Authenticated Route] Files a pending membership request. Duplicates are a 409.
#[utoipa::path(
    post,
    path = "/rsos/{id}/join",
    params(("id" = i64, Path, description = "RSO ID")),
    responses(
        (status = 201, description = "Request filed", body = CreatedResponse),
        (status = 404, description = "RSO not found", body = ErrorResponse),
        (status = 409, description = "Already requested", body = ErrorResponse)
    )
)]
pub async fn join_rso(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(rso_id): Path<i64>,
) -> AppResult<Created> {
    let membership = workflow::join(state.repo.as_ref(), &actor, rso_id).await?;
    Ok(created(membership.membership_id, "Join request submitted"))
}

/// list_rso_members
///
/// [Authenticated Route] Membership requests of one RSO. Its administrator, the owner of its
/// university, or an admin.
#[utoipa::path(
    get,
    path = "/rsos/{id}/members",
    params(("id" = i64, Path, description = "RSO ID"), StatusFilter),
    responses(
        (status = 200, description = "Memberships", body = [RsoMembership]),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "RSO not found", body = ErrorResponse)
    )
)]
pub async fn list_rso_members(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(rso_id): Path<i64>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<Json<Vec<RsoMembership>>> {
    let rso = state
        .repo
        .get_rso(rso_id)
        .await?
        .ok_or_else(|| AppError::NotFound("RSO not found".to_string()))?;

    let owns_university = state
        .repo
        .university_owned_by(actor.user_id)
        .await?
        .is_some_and(|u| u.university_id == rso.university_id);

    if !actor.is_admin() && rso.rso_admin != actor.user_id && !owns_university {
        return Err(AppError::Forbidden(
            "Not authorized to view this RSO's members".to_string(),
        ));
    }

    Ok(Json(state.repo.list_memberships(rso_id, filter.status).await?))
}

/// The membership row of `user_id` in `rso_id`.
async fn membership_of(repo: &dyn Repository, rso_id: i64, user_id: i64) -> AppResult<i64> {
    repo.list_memberships(rso_id, None)
        .await?
        .into_iter()
        .find(|m| m.user_id == user_id)
        .map(|m| m.membership_id)
        .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))
}

#[utoipa::path(
    put,
    path = "/rsos/{id}/members/{user_id}/approve",
    params(
        ("id" = i64, Path, description = "RSO ID"),
        ("user_id" = i64, Path, description = "Requesting user ID")
    ),
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or already approved", body = ErrorResponse)
    )
)]
pub async fn approve_membership(
    actor: AuthUser,
    State(state): State<AppState>,
    Path((rso_id, user_id)): Path<(i64, i64)>,
) -> AppResult<Json<MessageResponse>> {
    let repo = state.repo.as_ref();
    let membership_id = membership_of(repo, rso_id, user_id).await?;
    workflow::approve(repo, &actor, ApprovalKind::Membership, membership_id).await?;
    Ok(Json(MessageResponse::new("Membership approved")))
}

/// deny_membership
///
/// [Authenticated Route] Rejects a pending membership request. The requester's account stays.
#[utoipa::path(
    delete,
    path = "/rsos/{id}/members/{user_id}",
    params(
        ("id" = i64, Path, description = "RSO ID"),
        ("user_id" = i64, Path, description = "Requesting user ID")
    ),
    responses(
        (status = 200, description = "Denied", body = MessageResponse),
        (status = 403, description = "Not the approver", body = ErrorResponse),
        (status = 404, description = "Not found or not pending", body = ErrorResponse)
    )
)]
pub async fn deny_membership(
    actor: AuthUser,
    State(state): State<AppState>,
    Path((rso_id, user_id)): Path<(i64, i64)>,
) -> AppResult<Json<MessageResponse>> {
    let repo = state.repo.as_ref();
    let membership_id = membership_of(repo, rso_id, user_id).await?;
    workflow::deny(repo, &actor, ApprovalKind::Membership, membership_id).await?;
    Ok(Json(MessageResponse::new("Membership request denied")))
}

// --- Events ---

/// list_student_events
///
/// [Authenticated Route] Public events, private events of the caller's university, and rso
/// events of the RSOs the caller is an active member of.
#[utoipa::path(
    get,
    path = "/events",
    responses((status = 200, description = "Visible events", body = [Event]))
)]
pub async fn list_student_events(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Event>>> {
    let events = visibility::resolve_events(state.repo.as_ref(), &actor, Scope::Student).await?;
    Ok(Json(events))
}

/// list_university_events
///
/// [Authenticated Route] Every event of the caller's university, any tier.
#[utoipa::path(
    get,
    path = "/events/university",
    responses(
        (status = 200, description = "University events", body = [Event]),
        (status = 403, description = "Not a university account", body = ErrorResponse)
    )
)]
pub async fn list_university_events(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Event>>> {
    let events = visibility::resolve_events(state.repo.as_ref(), &actor, Scope::University).await?;
    Ok(Json(events))
}

/// list_rso_admin_events
///
/// [Authenticated Route] Every event hosted by an active RSO the caller administers.
/// Empty when none of their RSOs is approved yet.
#[utoipa::path(
    get,
    path = "/events/rso-admin",
    responses(
        (status = 200, description = "RSO events", body = [Event]),
        (status = 403, description = "Not an RSO admin", body = ErrorResponse)
    )
)]
pub async fn list_rso_admin_events(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Event>>> {
    let events = visibility::resolve_events(state.repo.as_ref(), &actor, Scope::RsoAdmin).await?;
    Ok(Json(events))
}

/// create_event
///
/// [Authenticated Route] Publishes an event at the tier requested, if the caller may publish there.
#[utoipa::path(
    post,
    path = "/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Created", body = CreatedResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not allowed to publish here", body = ErrorResponse)
    )
)]
pub async fn create_event(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateEventRequest>,
) -> AppResult<Created> {
    payload.validate()?;
    let repo = state.repo.as_ref();
    let new_event = guard::authorize_event_creation(repo, &actor, payload).await?;
    let event = repo.create_event(new_event).await?;

    tracing::info!(
        user_id = actor.user_id,
        event_id = event.event_id,
        visibility = ?event.visibility,
        "event created"
    );
    Ok(created(event.event_id, "Event created"))
}

/// get_event
///
/// [Authenticated Route] A single event. Events the caller cannot see are reported as absent.
#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = Event),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_event(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Event>> {
    let event = visibility::load_visible_event(state.repo.as_ref(), &actor, event_id).await?;
    Ok(Json(event))
}

#[utoipa::path(
    put,
    path = "/events/{id}",
    params(("id" = i64, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 403, description = "Not the creator", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn update_event(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(payload): Json<UpdateEventRequest>,
) -> AppResult<Json<Event>> {
    payload.validate()?;
    let event = guard::update_event(state.repo.as_ref(), &actor, event_id, payload).await?;
    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the creator", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_event(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    guard::delete_event(state.repo.as_ref(), &actor, event_id).await?;
    Ok(Json(MessageResponse::new("Event deleted")))
}

// --- Comments ---

#[utoipa::path(
    get,
    path = "/events/{id}/comments",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Comments", body = [EventComment]),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
pub async fn list_comments(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Vec<EventComment>>> {
    let repo = state.repo.as_ref();
    visibility::load_visible_event(repo, &actor, event_id).await?;
    Ok(Json(repo.list_comments(event_id).await?))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment on an event the caller can see.
#[utoipa::path(
    post,
    path = "/events/{id}/comments",
    params(("id" = i64, Path, description = "Event ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = EventComment),
        (status = 400, description = "Empty comment", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
pub async fn add_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<EventComment>)> {
    let comment =
        guard::add_comment(state.repo.as_ref(), &actor, event_id, &payload.comment).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = EventComment),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn update_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<Json<EventComment>> {
    let comment =
        guard::update_comment(state.repo.as_ref(), &actor, comment_id, &payload.comment).await?;
    Ok(Json(comment))
}

/// delete_comment
///
/// [Authenticated Route] The author, or an admin, removes a comment.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    guard::delete_comment(state.repo.as_ref(), &actor, comment_id).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

// --- Ratings ---

/// rate_event
///
/// [Authenticated Route] Creates or replaces the caller's 1-5 rating of an event.
#[utoipa::path(
    put,
    path = "/events/{id}/rating",
    params(("id" = i64, Path, description = "Event ID")),
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating stored", body = EventRating),
        (status = 400, description = "Out of range", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
pub async fn rate_event(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(payload): Json<RatingRequest>,
) -> AppResult<Json<EventRating>> {
    let rating = guard::rate_event(state.repo.as_ref(), &actor, event_id, payload.rating).await?;
    Ok(Json(rating))
}

#[utoipa::path(
    get,
    path = "/events/{id}/rating",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "The caller's rating", body = EventRating),
        (status = 404, description = "Not rated", body = ErrorResponse)
    )
)]
pub async fn my_rating(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<EventRating>> {
    state
        .repo
        .get_rating(event_id, actor.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Rating not found".to_string()))
}

#[utoipa::path(
    delete,
    path = "/events/{id}/rating",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not rated", body = ErrorResponse)
    )
)]
pub async fn delete_rating(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    guard::delete_rating(state.repo.as_ref(), &actor, event_id).await?;
    Ok(Json(MessageResponse::new("Rating deleted")))
}

/// rating_summary
///
/// [Authenticated Route] Average (two decimals, `null` when unrated) and count.
#[utoipa::path(
    get,
    path = "/events/{id}/rating/summary",
    params(("id" = i64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Summary", body = RatingSummary),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
pub async fn rating_summary(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<RatingSummary>> {
    let repo = state.repo.as_ref();
    visibility::load_visible_event(repo, &actor, event_id).await?;
    Ok(Json(repo.rating_summary(event_id).await?))
}

// --- Admin ---

/// admin_list_users
///
/// [Admin Route] Every account.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [UserProfile]),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn admin_list_users(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserProfile>>> {
    require_admin(&actor)?;
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// admin_list_universities
///
/// [Admin Route] Universities in any state; `?status=pending` is the approval queue.
#[utoipa::path(
    get,
    path = "/admin/universities",
    params(StatusFilter),
    responses(
        (status = 200, description = "Universities", body = [University]),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn admin_list_universities(
    actor: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<Json<Vec<University>>> {
    require_admin(&actor)?;
    Ok(Json(state.repo.list_universities(filter.status).await?))
}

#[utoipa::path(
    put,
    path = "/admin/universities/{id}/approve",
    params(("id" = i64, Path, description = "University ID")),
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not found or already approved", body = ErrorResponse)
    )
)]
pub async fn approve_university(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(university_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::approve(
        state.repo.as_ref(),
        &actor,
        ApprovalKind::University,
        university_id,
    )
    .await?;
    Ok(Json(MessageResponse::new("University approved")))
}

/// deny_university
///
/// [Admin Route] Rejects a pending university together with the account that filed it.
#[utoipa::path(
    delete,
    path = "/admin/universities/{id}",
    params(("id" = i64, Path, description = "University ID")),
    responses(
        (status = 200, description = "Denied", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not found or not pending", body = ErrorResponse)
    )
)]
pub async fn deny_university(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(university_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    workflow::deny(
        state.repo.as_ref(),
        &actor,
        ApprovalKind::University,
        university_id,
    )
    .await?;
    Ok(Json(MessageResponse::new(
        "University denied and owner account removed",
    )))
}
