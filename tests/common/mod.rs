#![allow(dead_code)]

use campus_events::{
    AppConfig, AppState, InMemoryRepository,
    auth::AuthUser,
    guard,
    models::{
        CreateEventRequest, CreateRsoRequest, CreateStudentRequest, CreateUniversityRequest,
        Event, EventCategory, Role, Rso, Visibility,
    },
    repository::{Repository, RepositoryState},
    workflow::{self, ApprovalKind},
};
use chrono::{Duration, Utc};
use std::sync::Arc;

// --- Shared fixtures built on the in-memory store ---

pub fn repo() -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::new())
}

pub fn state_with(repo: &Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig::default(),
    }
}

/// Inserts an account directly; password hashing is irrelevant for these fixtures.
pub async fn user(repo: &InMemoryRepository, email: &str, role: Role) -> AuthUser {
    let user = repo
        .create_user(email, "not-a-real-hash", role)
        .await
        .expect("create user");
    AuthUser::from(&user)
}

pub async fn admin(repo: &InMemoryRepository) -> AuthUser {
    user(repo, "admin@campus.test", Role::Admin).await
}

/// A university account whose university has been approved by `admin`.
pub async fn active_university(
    repo: &InMemoryRepository,
    admin: &AuthUser,
    email: &str,
    name: &str,
) -> (AuthUser, i64) {
    let owner = user(repo, email, Role::University).await;
    let university = workflow::register_university(
        repo,
        &owner,
        CreateUniversityRequest {
            name: name.to_string(),
            location: "Orlando, FL".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("register university");
    workflow::approve(repo, admin, ApprovalKind::University, university.university_id)
        .await
        .expect("approve university");
    (owner, university.university_id)
}

/// A student account with a pending enrollment at `university_id`.
pub async fn pending_student(
    repo: &InMemoryRepository,
    email: &str,
    university_id: i64,
) -> (AuthUser, i64) {
    let student = user(repo, email, Role::Student).await;
    let row = workflow::enroll_student(
        repo,
        &student,
        CreateStudentRequest {
            first_name: "Test".to_string(),
            last_name: "Student".to_string(),
            university_id,
        },
    )
    .await
    .expect("enroll student");
    (student, row.student_id)
}

/// A student account whose enrollment was approved by the university owner.
pub async fn active_student(
    repo: &InMemoryRepository,
    owner: &AuthUser,
    email: &str,
    university_id: i64,
) -> AuthUser {
    let (student, student_id) = pending_student(repo, email, university_id).await;
    workflow::approve(repo, owner, ApprovalKind::Student, student_id)
        .await
        .expect("approve student");
    student
}

/// An RSO founded by `founder` (an active student), still pending. Returns the founder with
/// their promoted role.
pub async fn pending_rso(
    repo: &InMemoryRepository,
    founder: &AuthUser,
    name: &str,
    university_id: i64,
) -> (AuthUser, Rso) {
    let rso = workflow::create_rso(
        repo,
        founder,
        CreateRsoRequest {
            name: name.to_string(),
            university_id,
        },
    )
    .await
    .expect("create rso");
    let promoted = AuthUser {
        user_id: founder.user_id,
        role: Role::RsoAdmin,
    };
    (promoted, rso)
}

pub async fn active_rso(
    repo: &InMemoryRepository,
    owner: &AuthUser,
    founder: &AuthUser,
    name: &str,
    university_id: i64,
) -> (AuthUser, Rso) {
    let (admin, rso) = pending_rso(repo, founder, name, university_id).await;
    workflow::approve(repo, owner, ApprovalKind::Rso, rso.rso_id)
        .await
        .expect("approve rso");
    (admin, rso)
}

pub fn event_request(
    name: &str,
    visibility: Visibility,
    university_id: Option<i64>,
    rso_id: Option<i64>,
) -> CreateEventRequest {
    CreateEventRequest {
        name: name.to_string(),
        description: format!("{name} description"),
        category: EventCategory::Social,
        date_time: Utc::now() + Duration::days(7),
        visibility,
        university_id,
        rso_id,
        ..Default::default()
    }
}

/// Publishes an event through the creation guard.
pub async fn publish(
    repo: &InMemoryRepository,
    creator: &AuthUser,
    req: CreateEventRequest,
) -> Event {
    let new_event = guard::authorize_event_creation(repo, creator, req)
        .await
        .expect("authorized event");
    repo.create_event(new_event).await.expect("create event")
}

pub fn names(events: &[Event]) -> Vec<&str> {
    let mut names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    names
}
