use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        Building, CreateStudentRequest, CreateUniversityRequest, Event, EventComment, EventRating,
        NewBuilding, NewEvent, RatingSummary, Role, Rso, RsoMembership, Status, Student,
        University, UpdateEventRequest, User,
    },
    visibility::VisibilityFilter,
    workflow::ApprovalKind,
};

const USER_COLUMNS: &str = "user_id, email, password_hash, role, created_at";
const UNIVERSITY_COLUMNS: &str = "university_id, user_id, name, location, description, \
     num_students, website, status, created_at";
const STUDENT_COLUMNS: &str =
    "student_id, user_id, university_id, first_name, last_name, status, created_at";
const RSO_COLUMNS: &str = "rso_id, name, university_id, rso_admin, status, created_at";
const MEMBERSHIP_COLUMNS: &str = "membership_id, user_id, rso_id, status, created_at";
const EVENT_COLUMNS: &str = "event_id, name, description, category, date_time, building_id, \
     contact_phone, contact_email, visibility, university_id, rso_id, created_by, created_at";
const COMMENT_COLUMNS: &str = "comment_id, event_id, user_id, comment, created_at";
const RATING_COLUMNS: &str = "event_id, user_id, rating, created_at";

/// (table, key column, owning-user column) of an approval target.
fn approval_table(kind: ApprovalKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ApprovalKind::University => ("universities", "university_id", "user_id"),
        ApprovalKind::Student => ("students", "student_id", "user_id"),
        ApprovalKind::Rso => ("rsos", "rso_id", "rso_admin"),
        ApprovalKind::Membership => ("rso_memberships", "membership_id", "user_id"),
    }
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Dependent rows are removed by the schema's
/// `ON DELETE CASCADE` keys, so deleting a user inside a transaction is enough to remove
/// everything that hangs off it.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY user_id");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    /// COALESCE keeps the stored value for every field left as `None`.
    async fn update_user(
        &self,
        user_id: i64,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET email = COALESCE($2, email), \
             password_hash = COALESCE($3, password_hash) \
             WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(email)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, user_id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn create_university(
        &self,
        owner_id: i64,
        req: CreateUniversityRequest,
    ) -> AppResult<University> {
        let sql = format!(
            "INSERT INTO universities (user_id, name, location, description, num_students, website) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {UNIVERSITY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, University>(&sql)
            .bind(owner_id)
            .bind(req.name)
            .bind(req.location)
            .bind(req.description)
            .bind(req.num_students)
            .bind(req.website)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_university(&self, university_id: i64) -> AppResult<Option<University>> {
        let sql = format!("SELECT {UNIVERSITY_COLUMNS} FROM universities WHERE university_id = $1");
        Ok(sqlx::query_as::<_, University>(&sql)
            .bind(university_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn university_owned_by(&self, user_id: i64) -> AppResult<Option<University>> {
        let sql = format!("SELECT {UNIVERSITY_COLUMNS} FROM universities WHERE user_id = $1");
        Ok(sqlx::query_as::<_, University>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_universities(&self, status: Option<Status>) -> AppResult<Vec<University>> {
        let sql = format!(
            "SELECT {UNIVERSITY_COLUMNS} FROM universities \
             WHERE ($1::approval_status IS NULL OR status = $1) ORDER BY name"
        );
        Ok(sqlx::query_as::<_, University>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_student(&self, user_id: i64, req: CreateStudentRequest) -> AppResult<Student> {
        let sql = format!(
            "INSERT INTO students (user_id, university_id, first_name, last_name) \
             VALUES ($1, $2, $3, $4) RETURNING {STUDENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(user_id)
            .bind(req.university_id)
            .bind(req.first_name)
            .bind(req.last_name)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_student(&self, student_id: i64) -> AppResult<Option<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = $1");
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn student_for_user(&self, user_id: i64) -> AppResult<Option<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1");
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_students(
        &self,
        university_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE university_id = $1 AND ($2::approval_status IS NULL OR status = $2) \
             ORDER BY student_id"
        );
        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(university_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    /// create_rso_promoting_admin
    ///
    /// Insert and promotion share one transaction. A promotion that matches no row is an
    /// error and rolls the insert back explicitly.
    async fn create_rso_promoting_admin(
        &self,
        admin_id: i64,
        name: &str,
        university_id: i64,
    ) -> AppResult<Rso> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO rsos (name, university_id, rso_admin) VALUES ($1, $2, $3) \
             RETURNING {RSO_COLUMNS}"
        );
        let rso = sqlx::query_as::<_, Rso>(&sql)
            .bind(name)
            .bind(university_id)
            .bind(admin_id)
            .fetch_one(&mut *tx)
            .await?;

        let promoted = sqlx::query(
            "UPDATE users SET role = 'rso_admin' \
             WHERE user_id = $1 AND role IN ('student', 'rso_admin')",
        )
        .bind(admin_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if promoted == 0 {
            tx.rollback().await?;
            return Err(AppError::Internal(format!(
                "role promotion matched no user for user_id {admin_id}"
            )));
        }

        tx.commit().await?;
        Ok(rso)
    }

    async fn get_rso(&self, rso_id: i64) -> AppResult<Option<Rso>> {
        let sql = format!("SELECT {RSO_COLUMNS} FROM rsos WHERE rso_id = $1");
        Ok(sqlx::query_as::<_, Rso>(&sql)
            .bind(rso_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_rsos(&self, university_id: i64, status: Option<Status>) -> AppResult<Vec<Rso>> {
        let sql = format!(
            "SELECT {RSO_COLUMNS} FROM rsos \
             WHERE university_id = $1 AND ($2::approval_status IS NULL OR status = $2) \
             ORDER BY rso_id"
        );
        Ok(sqlx::query_as::<_, Rso>(&sql)
            .bind(university_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn rsos_administered_by(&self, user_id: i64) -> AppResult<Vec<Rso>> {
        let sql = format!("SELECT {RSO_COLUMNS} FROM rsos WHERE rso_admin = $1 ORDER BY rso_id");
        Ok(sqlx::query_as::<_, Rso>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// `ON CONFLICT DO NOTHING` returns no row for a duplicate (user, rso) pair.
    async fn insert_membership(
        &self,
        user_id: i64,
        rso_id: i64,
    ) -> AppResult<Option<RsoMembership>> {
        let sql = format!(
            "INSERT INTO rso_memberships (user_id, rso_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, rso_id) DO NOTHING RETURNING {MEMBERSHIP_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, RsoMembership>(&sql)
            .bind(user_id)
            .bind(rso_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_membership(&self, membership_id: i64) -> AppResult<Option<RsoMembership>> {
        let sql = format!("SELECT {MEMBERSHIP_COLUMNS} FROM rso_memberships WHERE membership_id = $1");
        Ok(sqlx::query_as::<_, RsoMembership>(&sql)
            .bind(membership_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_memberships(
        &self,
        rso_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<RsoMembership>> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM rso_memberships \
             WHERE rso_id = $1 AND ($2::approval_status IS NULL OR status = $2) \
             ORDER BY membership_id"
        );
        Ok(sqlx::query_as::<_, RsoMembership>(&sql)
            .bind(rso_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn memberships_for_user(&self, user_id: i64) -> AppResult<Vec<RsoMembership>> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM rso_memberships WHERE user_id = $1 ORDER BY membership_id"
        );
        Ok(sqlx::query_as::<_, RsoMembership>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// A single conditional UPDATE: of two concurrent approvals exactly one sees a row.
    async fn activate_if_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<u64> {
        let (table, key, _) = approval_table(kind);
        let sql = format!(
            "UPDATE {table} SET status = 'active' WHERE {key} = $1 AND status = 'pending'"
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// deny_pending
    ///
    /// Locks the pending target with `FOR UPDATE` so a concurrent approval cannot slip in
    /// between the check and the delete.
    async fn deny_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<bool> {
        let (table, key, owner) = approval_table(kind);
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {owner} FROM {table} WHERE {key} = $1 AND status = 'pending' FOR UPDATE"
        );
        let owner_id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(owner_id) = owner_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        let (sql, target) = if kind == ApprovalKind::Membership {
            (format!("DELETE FROM {table} WHERE {key} = $1"), id)
        } else {
            ("DELETE FROM users WHERE user_id = $1".to_string(), owner_id)
        };
        let deleted = sqlx::query(&sql)
            .bind(target)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Err(AppError::Internal(format!(
                "deny of {} {id} deleted nothing",
                kind.label()
            )));
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn create_event(&self, event: NewEvent) -> AppResult<Event> {
        let sql = format!(
            "INSERT INTO events (name, description, category, date_time, building_id, \
             contact_phone, contact_email, visibility, university_id, rso_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(event.name)
            .bind(event.description)
            .bind(event.category)
            .bind(event.date_time)
            .bind(event.building_id)
            .bind(event.contact_phone)
            .bind(event.contact_email)
            .bind(event.visibility)
            .bind(event.university_id)
            .bind(event.rso_id)
            .bind(event.created_by)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_event(&self, event_id: i64) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// list_events
    ///
    /// Renders the filter as one disjunctive predicate. Each row is scanned once, so an event
    /// matching several clauses is still returned once.
    async fn list_events(&self, filter: &VisibilityFilter) -> AppResult<Vec<Event>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE FALSE"));

        if filter.include_public {
            builder.push(" OR visibility = 'public'");
        }
        if !filter.private_universities.is_empty() {
            builder.push(" OR (visibility = 'private' AND university_id = ANY(");
            builder.push_bind(filter.private_universities.clone());
            builder.push("))");
        }
        if !filter.member_rsos.is_empty() {
            builder.push(" OR (visibility = 'rso' AND rso_id = ANY(");
            builder.push_bind(filter.member_rsos.clone());
            builder.push("))");
        }
        if !filter.all_at_universities.is_empty() {
            builder.push(" OR university_id = ANY(");
            builder.push_bind(filter.all_at_universities.clone());
            builder.push(")");
        }
        if !filter.all_at_rsos.is_empty() {
            builder.push(" OR rso_id = ANY(");
            builder.push_bind(filter.all_at_rsos.clone());
            builder.push(")");
        }

        builder.push(" ORDER BY date_time ASC, event_id ASC");

        Ok(builder
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_event(
        &self,
        event_id: i64,
        req: UpdateEventRequest,
    ) -> AppResult<Option<Event>> {
        let sql = format!(
            "UPDATE events SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             category = COALESCE($4, category), \
             date_time = COALESCE($5, date_time), \
             building_id = COALESCE($6, building_id), \
             contact_phone = COALESCE($7, contact_phone), \
             contact_email = COALESCE($8, contact_email) \
             WHERE event_id = $1 RETURNING {EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.category)
            .bind(req.date_time)
            .bind(req.building_id)
            .bind(req.contact_phone)
            .bind(req.contact_email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_event(&self, event_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_comment(
        &self,
        event_id: i64,
        user_id: i64,
        text: &str,
    ) -> AppResult<EventComment> {
        let sql = format!(
            "INSERT INTO event_comments (event_id, user_id, comment) VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, EventComment>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(text)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_comment(&self, comment_id: i64) -> AppResult<Option<EventComment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM event_comments WHERE comment_id = $1");
        Ok(sqlx::query_as::<_, EventComment>(&sql)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_comments(&self, event_id: i64) -> AppResult<Vec<EventComment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM event_comments WHERE event_id = $1 ORDER BY created_at ASC"
        );
        Ok(sqlx::query_as::<_, EventComment>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: &str,
    ) -> AppResult<Option<EventComment>> {
        let sql = format!(
            "UPDATE event_comments SET comment = $2 WHERE comment_id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, EventComment>(&sql)
            .bind(comment_id)
            .bind(text)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_comment(&self, comment_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM event_comments WHERE comment_id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_rating(
        &self,
        event_id: i64,
        user_id: i64,
        rating: i32,
    ) -> AppResult<EventRating> {
        let sql = format!(
            "INSERT INTO event_ratings (event_id, user_id, rating) VALUES ($1, $2, $3) \
             ON CONFLICT (event_id, user_id) \
             DO UPDATE SET rating = EXCLUDED.rating, created_at = NOW() \
             RETURNING {RATING_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, EventRating>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(rating)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_rating(&self, event_id: i64, user_id: i64) -> AppResult<Option<EventRating>> {
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM event_ratings WHERE event_id = $1 AND user_id = $2"
        );
        Ok(sqlx::query_as::<_, EventRating>(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_rating(&self, event_id: i64, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM event_ratings WHERE event_id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rating_summary(&self, event_id: i64) -> AppResult<RatingSummary> {
        Ok(sqlx::query_as::<_, RatingSummary>(
            "SELECT $1::BIGINT AS event_id, \
             ROUND(AVG(rating)::numeric, 2)::float8 AS average_rating, \
             COUNT(*) AS rating_count \
             FROM event_ratings WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn add_buildings(
        &self,
        university_id: i64,
        buildings: Vec<NewBuilding>,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for building in buildings {
            inserted += sqlx::query(
                "INSERT INTO buildings (university_id, name, latitude, longitude) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(university_id)
            .bind(building.name)
            .bind(building.lat)
            .bind(building.lng)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_buildings(&self, university_id: i64) -> AppResult<Vec<Building>> {
        Ok(sqlx::query_as::<_, Building>(
            "SELECT building_id, university_id, name, latitude, longitude \
             FROM buildings WHERE university_id = $1 ORDER BY name",
        )
        .bind(university_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
