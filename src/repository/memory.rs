use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

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

/// FailPoint
///
/// Statements of a multi-statement transaction that can be forced to fail, to observe
/// that the whole transaction rolls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// The `role = rso_admin` update that follows an RSO insert.
    RolePromotion,
    /// The final `DELETE FROM users` of a cascade.
    UserDelete,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    universities: BTreeMap<i64, University>,
    students: BTreeMap<i64, Student>,
    rsos: BTreeMap<i64, Rso>,
    memberships: BTreeMap<i64, RsoMembership>,
    events: BTreeMap<i64, Event>,
    comments: BTreeMap<i64, EventComment>,
    ratings: BTreeMap<(i64, i64), EventRating>,
    buildings: BTreeMap<i64, Building>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // ON DELETE CASCADE, mirroring the foreign keys of the Postgres schema.

    fn delete_event_cascade(&mut self, event_id: i64) -> bool {
        self.comments.retain(|_, c| c.event_id != event_id);
        self.ratings.retain(|_, r| r.event_id != event_id);
        self.events.remove(&event_id).is_some()
    }

    fn delete_rso_cascade(&mut self, rso_id: i64) {
        self.memberships.retain(|_, m| m.rso_id != rso_id);
        let hosted: Vec<i64> = self
            .events
            .values()
            .filter(|e| e.rso_id == Some(rso_id))
            .map(|e| e.event_id)
            .collect();
        for event_id in hosted {
            self.delete_event_cascade(event_id);
        }
        self.rsos.remove(&rso_id);
    }

    fn delete_university_cascade(&mut self, university_id: i64) {
        self.students.retain(|_, s| s.university_id != university_id);
        let rsos: Vec<i64> = self
            .rsos
            .values()
            .filter(|r| r.university_id == university_id)
            .map(|r| r.rso_id)
            .collect();
        for rso_id in rsos {
            self.delete_rso_cascade(rso_id);
        }
        let events: Vec<i64> = self
            .events
            .values()
            .filter(|e| e.university_id == university_id)
            .map(|e| e.event_id)
            .collect();
        for event_id in events {
            self.delete_event_cascade(event_id);
        }
        self.buildings.retain(|_, b| b.university_id != university_id);
        // Events elsewhere that were held in a removed building lose the location.
        let buildings = &self.buildings;
        for event in self.events.values_mut() {
            if event.building_id.is_some_and(|id| !buildings.contains_key(&id)) {
                event.building_id = None;
            }
        }
        self.universities.remove(&university_id);
    }

    fn delete_user_cascade(&mut self, user_id: i64, fail: Option<FailPoint>) -> AppResult<bool> {
        if !self.users.contains_key(&user_id) {
            return Ok(false);
        }

        self.memberships.retain(|_, m| m.user_id != user_id);
        self.students.retain(|_, s| s.user_id != user_id);

        let rsos: Vec<i64> = self
            .rsos
            .values()
            .filter(|r| r.rso_admin == user_id)
            .map(|r| r.rso_id)
            .collect();
        for rso_id in rsos {
            self.delete_rso_cascade(rso_id);
        }

        let universities: Vec<i64> = self
            .universities
            .values()
            .filter(|u| u.user_id == user_id)
            .map(|u| u.university_id)
            .collect();
        for university_id in universities {
            self.delete_university_cascade(university_id);
        }

        let events: Vec<i64> = self
            .events
            .values()
            .filter(|e| e.created_by == user_id)
            .map(|e| e.event_id)
            .collect();
        for event_id in events {
            self.delete_event_cascade(event_id);
        }
        self.comments.retain(|_, c| c.user_id != user_id);
        self.ratings.retain(|_, r| r.user_id != user_id);

        if fail == Some(FailPoint::UserDelete) {
            return Err(AppError::Internal("injected failure: user delete".to_string()));
        }
        self.users.remove(&user_id);
        Ok(true)
    }

    fn pending_owner(&self, kind: ApprovalKind, id: i64) -> Option<i64> {
        match kind {
            ApprovalKind::University => self
                .universities
                .get(&id)
                .filter(|u| u.status == Status::Pending)
                .map(|u| u.user_id),
            ApprovalKind::Student => self
                .students
                .get(&id)
                .filter(|s| s.status == Status::Pending)
                .map(|s| s.user_id),
            ApprovalKind::Rso => self
                .rsos
                .get(&id)
                .filter(|r| r.status == Status::Pending)
                .map(|r| r.rso_admin),
            ApprovalKind::Membership => self
                .memberships
                .get(&id)
                .filter(|m| m.status == Status::Pending)
                .map(|m| m.user_id),
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` holding every table behind one mutex. Each method runs as a transaction:
/// multi-statement methods work on a copy of the tables and publish it only on success, so
/// a failure part-way leaves the previous state untouched. Used by the test suites and for
/// running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next transaction that reaches `point` fail.
    pub fn inject_failure(&self, point: FailPoint) {
        if let Ok(mut slot) = self.fail_point.lock() {
            *slot = Some(point);
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store poisoned".to_string()))
    }

    fn take_fail_point(&self) -> Option<FailPoint> {
        self.fail_point.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Runs `f` against a copy of the tables and commits the copy only if `f` succeeds.
    fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let result = f(&mut working);
        if result.is_ok() {
            *guard = working;
        }
        result
    }
}

fn filter_status<T>(rows: impl Iterator<Item = T>, status: Option<Status>, get: fn(&T) -> Status) -> Vec<T> {
    rows.filter(|row| status.is_none_or(|s| get(row) == s)).collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
        self.transaction(|t| {
            if t.users.values().any(|u| u.email == email) {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            let user = User {
                user_id: t.next_id(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                role,
                created_at: Utc::now(),
            };
            t.users.insert(user.user_id, user.clone());
            Ok(user)
        })
    }

    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn update_user(
        &self,
        user_id: i64,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>> {
        self.transaction(|t| {
            if let Some(email) = &email {
                if t.users.values().any(|u| &u.email == email && u.user_id != user_id) {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }
            }
            let Some(user) = t.users.get_mut(&user_id) else {
                return Ok(None);
            };
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(hash) = password_hash {
                user.password_hash = hash;
            }
            Ok(Some(user.clone()))
        })
    }

    async fn delete_user(&self, user_id: i64) -> AppResult<bool> {
        let fail = self.take_fail_point();
        self.transaction(|t| t.delete_user_cascade(user_id, fail))
    }

    async fn create_university(
        &self,
        owner_id: i64,
        req: CreateUniversityRequest,
    ) -> AppResult<University> {
        self.transaction(|t| {
            if !t.users.contains_key(&owner_id) {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            if t.universities.values().any(|u| u.user_id == owner_id) {
                return Err(AppError::Conflict("Resource already exists".to_string()));
            }
            let university = University {
                university_id: t.next_id(),
                user_id: owner_id,
                name: req.name,
                location: req.location,
                description: req.description,
                num_students: req.num_students,
                website: req.website,
                status: Status::Pending,
                created_at: Utc::now(),
            };
            t.universities
                .insert(university.university_id, university.clone());
            Ok(university)
        })
    }

    async fn get_university(&self, university_id: i64) -> AppResult<Option<University>> {
        Ok(self.lock()?.universities.get(&university_id).cloned())
    }

    async fn university_owned_by(&self, user_id: i64) -> AppResult<Option<University>> {
        Ok(self
            .lock()?
            .universities
            .values()
            .find(|u| u.user_id == user_id)
            .cloned())
    }

    async fn list_universities(&self, status: Option<Status>) -> AppResult<Vec<University>> {
        let t = self.lock()?;
        Ok(filter_status(t.universities.values().cloned(), status, |u| u.status))
    }

    async fn create_student(&self, user_id: i64, req: CreateStudentRequest) -> AppResult<Student> {
        self.transaction(|t| {
            if !t.universities.contains_key(&req.university_id) || !t.users.contains_key(&user_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            if t.students.values().any(|s| s.user_id == user_id) {
                return Err(AppError::Conflict("Resource already exists".to_string()));
            }
            let student = Student {
                student_id: t.next_id(),
                user_id,
                university_id: req.university_id,
                first_name: req.first_name,
                last_name: req.last_name,
                status: Status::Pending,
                created_at: Utc::now(),
            };
            t.students.insert(student.student_id, student.clone());
            Ok(student)
        })
    }

    async fn get_student(&self, student_id: i64) -> AppResult<Option<Student>> {
        Ok(self.lock()?.students.get(&student_id).cloned())
    }

    async fn student_for_user(&self, user_id: i64) -> AppResult<Option<Student>> {
        Ok(self
            .lock()?
            .students
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_students(
        &self,
        university_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<Student>> {
        let t = self.lock()?;
        let rows = t
            .students
            .values()
            .filter(|s| s.university_id == university_id)
            .cloned();
        Ok(filter_status(rows, status, |s| s.status))
    }

    async fn create_rso_promoting_admin(
        &self,
        admin_id: i64,
        name: &str,
        university_id: i64,
    ) -> AppResult<Rso> {
        let fail = self.take_fail_point();
        self.transaction(|t| {
            if !t.universities.contains_key(&university_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            let rso = Rso {
                rso_id: t.next_id(),
                name: name.to_string(),
                university_id,
                rso_admin: admin_id,
                status: Status::Pending,
                created_at: Utc::now(),
            };
            t.rsos.insert(rso.rso_id, rso.clone());

            if fail == Some(FailPoint::RolePromotion) {
                return Err(AppError::Internal("injected failure: role promotion".to_string()));
            }
            match t.users.get_mut(&admin_id) {
                Some(user) if matches!(user.role, Role::Student | Role::RsoAdmin) => {
                    user.role = Role::RsoAdmin;
                }
                _ => {
                    return Err(AppError::Internal(
                        "role promotion matched no user".to_string(),
                    ));
                }
            }
            Ok(rso)
        })
    }

    async fn get_rso(&self, rso_id: i64) -> AppResult<Option<Rso>> {
        Ok(self.lock()?.rsos.get(&rso_id).cloned())
    }

    async fn list_rsos(&self, university_id: i64, status: Option<Status>) -> AppResult<Vec<Rso>> {
        let t = self.lock()?;
        let rows = t
            .rsos
            .values()
            .filter(|r| r.university_id == university_id)
            .cloned();
        Ok(filter_status(rows, status, |r| r.status))
    }

    async fn rsos_administered_by(&self, user_id: i64) -> AppResult<Vec<Rso>> {
        Ok(self
            .lock()?
            .rsos
            .values()
            .filter(|r| r.rso_admin == user_id)
            .cloned()
            .collect())
    }

    async fn insert_membership(
        &self,
        user_id: i64,
        rso_id: i64,
    ) -> AppResult<Option<RsoMembership>> {
        self.transaction(|t| {
            if !t.rsos.contains_key(&rso_id) || !t.users.contains_key(&user_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            if t
                .memberships
                .values()
                .any(|m| m.user_id == user_id && m.rso_id == rso_id)
            {
                return Ok(None);
            }
            let membership = RsoMembership {
                membership_id: t.next_id(),
                user_id,
                rso_id,
                status: Status::Pending,
                created_at: Utc::now(),
            };
            t.memberships
                .insert(membership.membership_id, membership.clone());
            Ok(Some(membership))
        })
    }

    async fn get_membership(&self, membership_id: i64) -> AppResult<Option<RsoMembership>> {
        Ok(self.lock()?.memberships.get(&membership_id).cloned())
    }

    async fn list_memberships(
        &self,
        rso_id: i64,
        status: Option<Status>,
    ) -> AppResult<Vec<RsoMembership>> {
        let t = self.lock()?;
        let rows = t
            .memberships
            .values()
            .filter(|m| m.rso_id == rso_id)
            .cloned();
        Ok(filter_status(rows, status, |m| m.status))
    }

    async fn memberships_for_user(&self, user_id: i64) -> AppResult<Vec<RsoMembership>> {
        Ok(self
            .lock()?
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn activate_if_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<u64> {
        let mut t = self.lock()?;
        let status = match kind {
            ApprovalKind::University => t.universities.get_mut(&id).map(|u| &mut u.status),
            ApprovalKind::Student => t.students.get_mut(&id).map(|s| &mut s.status),
            ApprovalKind::Rso => t.rsos.get_mut(&id).map(|r| &mut r.status),
            ApprovalKind::Membership => t.memberships.get_mut(&id).map(|m| &mut m.status),
        };
        match status {
            Some(status) if *status == Status::Pending => {
                *status = Status::Active;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn deny_pending(&self, kind: ApprovalKind, id: i64) -> AppResult<bool> {
        let fail = self.take_fail_point();
        self.transaction(|t| {
            let Some(owner_id) = t.pending_owner(kind, id) else {
                return Ok(false);
            };
            if kind == ApprovalKind::Membership {
                return Ok(t.memberships.remove(&id).is_some());
            }
            t.delete_user_cascade(owner_id, fail)
        })
    }

    async fn create_event(&self, event: NewEvent) -> AppResult<Event> {
        self.transaction(|t| {
            let rso_missing = event.rso_id.is_some_and(|id| !t.rsos.contains_key(&id));
            let building_missing = event
                .building_id
                .is_some_and(|id| !t.buildings.contains_key(&id));
            if !t.universities.contains_key(&event.university_id) || rso_missing || building_missing
            {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            let row = Event {
                event_id: t.next_id(),
                name: event.name,
                description: event.description,
                category: event.category,
                date_time: event.date_time,
                building_id: event.building_id,
                contact_phone: event.contact_phone,
                contact_email: event.contact_email,
                visibility: event.visibility,
                university_id: event.university_id,
                rso_id: event.rso_id,
                created_by: event.created_by,
                created_at: Utc::now(),
            };
            t.events.insert(row.event_id, row.clone());
            Ok(row)
        })
    }

    async fn get_event(&self, event_id: i64) -> AppResult<Option<Event>> {
        Ok(self.lock()?.events.get(&event_id).cloned())
    }

    async fn list_events(&self, filter: &VisibilityFilter) -> AppResult<Vec<Event>> {
        let t = self.lock()?;
        let mut events: Vec<Event> = t
            .events
            .values()
            .filter(|e| filter.admits(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.date_time
                .cmp(&b.date_time)
                .then(a.event_id.cmp(&b.event_id))
        });
        Ok(events)
    }

    async fn update_event(
        &self,
        event_id: i64,
        req: UpdateEventRequest,
    ) -> AppResult<Option<Event>> {
        let mut t = self.lock()?;
        let Some(event) = t.events.get_mut(&event_id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            event.name = name;
        }
        if let Some(description) = req.description {
            event.description = description;
        }
        if let Some(category) = req.category {
            event.category = category;
        }
        if let Some(date_time) = req.date_time {
            event.date_time = date_time;
        }
        if req.building_id.is_some() {
            event.building_id = req.building_id;
        }
        if req.contact_phone.is_some() {
            event.contact_phone = req.contact_phone;
        }
        if req.contact_email.is_some() {
            event.contact_email = req.contact_email;
        }
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, event_id: i64) -> AppResult<bool> {
        self.transaction(|t| Ok(t.delete_event_cascade(event_id)))
    }

    async fn add_comment(
        &self,
        event_id: i64,
        user_id: i64,
        text: &str,
    ) -> AppResult<EventComment> {
        self.transaction(|t| {
            if !t.events.contains_key(&event_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            let comment = EventComment {
                comment_id: t.next_id(),
                event_id,
                user_id,
                comment: text.to_string(),
                created_at: Utc::now(),
            };
            t.comments.insert(comment.comment_id, comment.clone());
            Ok(comment)
        })
    }

    async fn get_comment(&self, comment_id: i64) -> AppResult<Option<EventComment>> {
        Ok(self.lock()?.comments.get(&comment_id).cloned())
    }

    async fn list_comments(&self, event_id: i64) -> AppResult<Vec<EventComment>> {
        Ok(self
            .lock()?
            .comments
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: &str,
    ) -> AppResult<Option<EventComment>> {
        let mut t = self.lock()?;
        Ok(t.comments.get_mut(&comment_id).map(|c| {
            c.comment = text.to_string();
            c.clone()
        }))
    }

    async fn delete_comment(&self, comment_id: i64) -> AppResult<bool> {
        Ok(self.lock()?.comments.remove(&comment_id).is_some())
    }

    async fn upsert_rating(
        &self,
        event_id: i64,
        user_id: i64,
        rating: i32,
    ) -> AppResult<EventRating> {
        self.transaction(|t| {
            if !t.events.contains_key(&event_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            let row = EventRating {
                event_id,
                user_id,
                rating,
                created_at: Utc::now(),
            };
            t.ratings.insert((event_id, user_id), row.clone());
            Ok(row)
        })
    }

    async fn get_rating(&self, event_id: i64, user_id: i64) -> AppResult<Option<EventRating>> {
        Ok(self.lock()?.ratings.get(&(event_id, user_id)).cloned())
    }

    async fn delete_rating(&self, event_id: i64, user_id: i64) -> AppResult<bool> {
        Ok(self.lock()?.ratings.remove(&(event_id, user_id)).is_some())
    }

    async fn rating_summary(&self, event_id: i64) -> AppResult<RatingSummary> {
        let t = self.lock()?;
        let ratings: Vec<i32> = t
            .ratings
            .values()
            .filter(|r| r.event_id == event_id)
            .map(|r| r.rating)
            .collect();
        let rating_count = ratings.len() as i64;
        let average_rating = (rating_count > 0).then(|| {
            let avg = f64::from(ratings.iter().sum::<i32>()) / rating_count as f64;
            (avg * 100.0).round() / 100.0
        });
        Ok(RatingSummary {
            event_id,
            average_rating,
            rating_count,
        })
    }

    async fn add_buildings(
        &self,
        university_id: i64,
        buildings: Vec<NewBuilding>,
    ) -> AppResult<u64> {
        self.transaction(|t| {
            if !t.universities.contains_key(&university_id) {
                return Err(AppError::NotFound("Referenced resource not found".to_string()));
            }
            let count = buildings.len() as u64;
            for b in buildings {
                let building = Building {
                    building_id: t.next_id(),
                    university_id,
                    name: b.name,
                    latitude: b.lat,
                    longitude: b.lng,
                };
                t.buildings.insert(building.building_id, building);
            }
            Ok(count)
        })
    }

    async fn list_buildings(&self, university_id: i64) -> AppResult<Vec<Building>> {
        Ok(self
            .lock()?
            .buildings
            .values()
            .filter(|b| b.university_id == university_id)
            .cloned()
            .collect())
    }
}
