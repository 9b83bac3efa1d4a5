use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

// --- Closed Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The coarse capability tag carried on every User row and inside every issued token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Admin,
    University,
    RsoAdmin,
    #[default]
    Student,
}

/// Status
///
/// Approval state of Universities, Students, RSOs and Memberships. Rows only ever move
/// from `Pending` to `Active`; denial deletes the row instead of storing a third value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema, Default,
)]
#[sqlx(type_name = "approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Status {
    #[default]
    Pending,
    Active,
}

/// Visibility
///
/// The tier deciding which actors resolve an Event into their view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema, Default,
)]
#[sqlx(type_name = "event_visibility", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Rso,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema, Default,
)]
#[sqlx(type_name = "event_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EventCategory {
    Social,
    Fundraising,
    TechTalk,
    #[default]
    Other,
}

// --- Core Entities (Mapped to Database) ---

/// User
///
/// The account row. Internal only: it carries the password hash, so handlers convert it
/// into `UserProfile` before anything is serialized to a client.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub user_id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public projection of a `User`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct University {
    pub university_id: i64,
    // Owner: the User who registered the university.
    pub user_id: i64,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub num_students: Option<i32>,
    pub website: Option<String>,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Student {
    pub student_id: i64,
    pub user_id: i64,
    pub university_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Rso
///
/// A Registered Student Organization. `rso_admin` is the User that created it and was
/// promoted to the `rso_admin` role in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Rso {
    pub rso_id: i64,
    pub name: String,
    pub university_id: i64,
    pub rso_admin: i64,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RsoMembership
///
/// A join request. Unique per (user_id, rso_id).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RsoMembership {
    pub membership_id: i64,
    pub user_id: i64,
    pub rso_id: i64,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Event
///
/// `private` events are scoped to `university_id`, `rso` events to `rso_id`.
/// RSO-hosted events of any tier also carry their `rso_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Event {
    pub event_id: i64,
    pub name: String,
    pub description: String,
    pub category: EventCategory,
    #[ts(type = "string")]
    pub date_time: DateTime<Utc>,
    pub building_id: Option<i64>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub visibility: Visibility,
    pub university_id: i64,
    pub rso_id: Option<i64>,
    pub created_by: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EventComment {
    pub comment_id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EventRating {
    pub event_id: i64,
    pub user_id: i64,
    pub rating: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Building {
    pub building_id: i64,
    pub university_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Self-service registration. Only `university` and `student` may be chosen here; the
/// `rso_admin` role is reached by creating an RSO and `admin` is provisioned out of band.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// UpdateUserRequest
///
/// Partial account update. The role is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateUniversityRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub num_students: Option<i32>,
    #[validate(url)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub university_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateRsoRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub university_id: i64,
}

/// CreateEventRequest
///
/// `university_id` is required for `public` and `private` events. For `rso` events it is
/// taken from the hosting RSO and, when supplied, must agree with it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub category: EventCategory,
    #[ts(type = "string")]
    pub date_time: DateTime<Utc>,
    pub building_id: Option<i64>,
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub visibility: Visibility,
    pub university_id: Option<i64>,
    pub rso_id: Option<i64>,
}

/// NewEvent
///
/// A creation request after authorization resolved its university.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub category: EventCategory,
    pub date_time: DateTime<Utc>,
    pub building_id: Option<i64>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub visibility: Visibility,
    pub university_id: i64,
    pub rso_id: Option<i64>,
    pub created_by: i64,
}

/// UpdateEventRequest
///
/// Partial update payload. Visibility and scope are not editable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub date_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct NewBuilding {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct AddBuildingsRequest {
    #[validate(length(min = 1), nested)]
    pub buildings: Vec<NewBuilding>,
}

// --- Response Schemas (Output) ---

/// CreatedResponse
///
/// Returned with 201 by every creation endpoint: the new row's key plus a confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StatusResponse {
    pub status: Status,
}

/// RatingSummary
///
/// `average_rating` is rounded to two decimals and is `null` for an unrated event.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct RatingSummary {
    pub event_id: i64,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BuildingsAdded {
    pub university_id: i64,
    pub count: u64,
}
