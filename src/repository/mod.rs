use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        Building, CreateStudentRequest, CreateUniversityRequest, Event, EventComment, EventRating,
        NewBuilding, NewEvent, RatingSummary, Role, Rso, RsoMembership, Status, Student,
        University, UpdateEventRequest, User,
    },
    visibility::VisibilityFilter,
    workflow::ApprovalKind,
};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, InMemoryRepository};
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The Entity Store boundary. Every method is a point lookup, a single conditional statement,
/// or (where documented) one atomic transaction. Business rules (who may approve, what an
/// actor may see) live in `workflow`, `visibility` and `guard`; implementations only persist.
///
/// Failures are returned, never swallowed: a conditional statement that matched nothing is
/// reported as `0` rows / `false` / `None` and the caller turns that into `NotFound`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AppResult<User>;
    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn update_user(
        &self,
        user_id: i64,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>>;
    /// Transaction: deletes the user and every dependent row (students, memberships,
    /// administered RSOs, owned university). Returns false when the user does not exist.
    async fn delete_user(&self, user_id: i64) -> AppResult<bool>;

    // --- Universities ---
    async fn create_university(
        &self,
        owner_id: i64,
        req: CreateUniversityRequest,
    ) -> AppResult<University>;
    async fn get_university(&self, university_id: i64) -> AppResult<Option<University>>;
    async fn university_owned_by(&self, user_id: i64) -> AppResult<Option<University>>;
    async fn list_universities(&self, status: Option<Status>) -> AppResult<Vec<University>>;

    // --- Students ---
    async fn create_student(&self, user_id: i64, req: CreateStudentRequest) -> AppResult<Student>;
    async fn get_student(&self, student_id: i64) -> AppResult<Option<Student>>;
    async fn student_for_user(&self, user_id: i64) -> AppResult<Option<Student>>;
    async fn list_students(
        &self,
        university_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<Student>>;

    // --- RSOs ---
    /// Transaction: inserts a pending RSO and promotes `admin_id` to `rso_admin`.
    /// If the promotion fails the RSO insert is rolled back.
    async fn create_rso_promoting_admin(
        &self,
        admin_id: i64,
        name: &str,
        university_id: i64,
    ) -> AppResult<Rso>;
    async fn get_rso(&self, rso_id: i64) -> AppResult<Option<Rso>>;
    async fn list_rsos(&self, university_id: i64, status: Option<Status>) -> AppResult<Vec<Rso>>;
    async fn rsos_administered_by(&self, user_id: i64) -> AppResult<Vec<Rso>>;

    // --- Memberships ---
    /// Inserts a pending membership. Returns `None` if the (user, rso) pair already exists.
    async fn insert_membership(&self, user_id: i64, rso_id: i64)
    -> AppResult<Option<RsoMembership>>;
    async fn get_membership(&self, membership_id: i64) -> AppResult<Option<RsoMembership>>;
    async fn list_memberships(
        &self,
        rso_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<RsoMembership>>;
    async fn memberships_for_user(&self, user_id: i64) -> AppResult<Vec<RsoMembership>>;

    // --- Approval State Machine primitives ---
    /// Compare-and-set `pending -> active`. Returns the number of rows affected (0 or 1).
    async fn activate_if_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<u64>;
    /// Transaction: removes a still-pending target. For University/Student/RSO the owning
    /// User and all dependents are deleted; for Membership only the membership row.
    /// Returns false when no pending target matched.
    async fn deny_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<bool>;

    // --- Events ---
    async fn create_event(&self, event: NewEvent) -> AppResult<Event>;
    async fn get_event(&self, event_id: i64) -> AppResult<Option<Event>>;
    /// Every event admitted by `filter`, each at most once, ordered by start time.
    async fn list_events(&self, filter: &VisibilityFilter) -> AppResult<Vec<Event>>;
    async fn update_event(&self, event_id: i64, req: UpdateEventRequest)
    -> AppResult<Option<Event>>;
    async fn delete_event(&self, event_id: i64) -> AppResult<bool>;

    // --- Comments ---
    async fn add_comment(&self, event_id: i64, user_id: i64, text: &str)
    -> AppResult<EventComment>;
    async fn get_comment(&self, comment_id: i64) -> AppResult<Option<EventComment>>;
    async fn list_comments(&self, event_id: i64) -> AppResult<Vec<EventComment>>;
    async fn update_comment(&self, comment_id: i64, text: &str)
    -> AppResult<Option<EventComment>>;
    async fn delete_comment(&self, comment_id: i64) -> AppResult<bool>;

    // --- Ratings ---
    /// Insert or replace the (event, user) rating.
    async fn upsert_rating(&self, event_id: i64, user_id: i64, rating: i32)
    -> AppResult<EventRating>;
    async fn get_rating(&self, event_id: i64, user_id: i64) -> AppResult<Option<EventRating>>;
    async fn delete_rating(&self, event_id: i64, user_id: i64) -> AppResult<bool>;
    async fn rating_summary(&self, event_id: i64) -> AppResult<RatingSummary>;

    // --- Buildings ---
    /// Transaction: all buildings are inserted or none are.
    async fn add_buildings(&self, university_id: i64, buildings: Vec<NewBuilding>)
    -> AppResult<u64>;
    async fn list_buildings(&self, university_id: i64) -> AppResult<Vec<Building>>;
}

/// RepositoryState
///
/// The injectable store handle shared through `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
