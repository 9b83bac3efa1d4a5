//! Event visibility resolution.
//!
//! Visibility is a join, not a stored permission list: an Event's (visibility, university_id,
//! rso_id) is crossed against the actor's affiliations, which are re-read on every request
//! because approval statuses change over time. All three request shapes (university owner,
//! RSO admin, student) compile down to one `VisibilityFilter`, which the store renders either
//! as a single SQL predicate or evaluates row by row.

use std::collections::HashSet;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Event, Role, Status, Visibility},
    repository::Repository,
};

/// Scope
///
/// The three request shapes of the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every event of the university the actor owns.
    University,
    /// Every event hosted by an active RSO the actor administers.
    RsoAdmin,
    /// Public events, private events of the actor's university, rso events of their RSOs.
    Student,
}

/// Affiliations
///
/// Everything about an actor that visibility depends on, loaded fresh per request.
/// Only `active` rows contribute; pending Students and Memberships grant nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Affiliations {
    pub active_student_universities: Vec<i64>,
    pub active_memberships: Vec<i64>,
    pub owned_university: Option<i64>,
    pub administered_active_rsos: Vec<i64>,
}

impl Affiliations {
    pub async fn load(repo: &dyn Repository, user_id: i64) -> AppResult<Self> {
        let active_student_universities = repo
            .student_for_user(user_id)
            .await?
            .filter(|s| s.status == Status::Active)
            .map(|s| vec![s.university_id])
            .unwrap_or_default();

        let active_memberships = repo
            .memberships_for_user(user_id)
            .await?
            .into_iter()
            .filter(|m| m.status == Status::Active)
            .map(|m| m.rso_id)
            .collect();

        let owned_university = repo
            .university_owned_by(user_id)
            .await?
            .map(|u| u.university_id);

        let administered_active_rsos = repo
            .rsos_administered_by(user_id)
            .await?
            .into_iter()
            .filter(|r| r.status == Status::Active)
            .map(|r| r.rso_id)
            .collect();

        Ok(Self {
            active_student_universities,
            active_memberships,
            owned_university,
            administered_active_rsos,
        })
    }
}

/// VisibilityFilter
///
/// A disjunction of five clauses. An event is admitted if any clause holds:
/// - `include_public` and the event is `public`;
/// - the event is `private` and its university is in `private_universities`;
/// - the event is `rso` and its RSO is in `member_rsos`;
/// - its university is in `all_at_universities` (any tier);
/// - its RSO is in `all_at_rsos` (any tier).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityFilter {
    pub include_public: bool,
    pub private_universities: Vec<i64>,
    pub member_rsos: Vec<i64>,
    pub all_at_universities: Vec<i64>,
    pub all_at_rsos: Vec<i64>,
}

impl VisibilityFilter {
    pub fn student(aff: &Affiliations) -> Self {
        Self {
            include_public: true,
            private_universities: aff.active_student_universities.clone(),
            member_rsos: aff.active_memberships.clone(),
            ..Self::default()
        }
    }

    pub fn university_owner(aff: &Affiliations) -> Self {
        Self {
            all_at_universities: aff.owned_university.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn rso_admin(aff: &Affiliations) -> Self {
        Self {
            all_at_rsos: aff.administered_active_rsos.clone(),
            ..Self::default()
        }
    }

    /// Combines two filters; the result admits what either admits.
    pub fn union(mut self, other: Self) -> Self {
        self.include_public |= other.include_public;
        extend_unique(&mut self.private_universities, other.private_universities);
        extend_unique(&mut self.member_rsos, other.member_rsos);
        extend_unique(&mut self.all_at_universities, other.all_at_universities);
        extend_unique(&mut self.all_at_rsos, other.all_at_rsos);
        self
    }

    /// True when no event can satisfy the filter.
    pub fn is_empty(&self) -> bool {
        !self.include_public
            && self.private_universities.is_empty()
            && self.member_rsos.is_empty()
            && self.all_at_universities.is_empty()
            && self.all_at_rsos.is_empty()
    }

    pub fn admits(&self, event: &Event) -> bool {
        let tier = match event.visibility {
            Visibility::Public => self.include_public,
            Visibility::Private => self.private_universities.contains(&event.university_id),
            Visibility::Rso => event
                .rso_id
                .is_some_and(|rso_id| self.member_rsos.contains(&rso_id)),
        };

        tier || self.all_at_universities.contains(&event.university_id)
            || event
                .rso_id
                .is_some_and(|rso_id| self.all_at_rsos.contains(&rso_id))
    }
}

fn extend_unique(into: &mut Vec<i64>, from: Vec<i64>) {
    for id in from {
        if !into.contains(&id) {
            into.push(id);
        }
    }
}

impl Scope {
    /// Builds the filter for `actor` in this scope, rejecting actors whose role does not
    /// hold the scope. Admins may use every scope.
    pub fn filter_for(self, actor: &AuthUser, aff: &Affiliations) -> AppResult<VisibilityFilter> {
        match self {
            Self::Student => Ok(VisibilityFilter::student(aff)),
            Self::University => {
                if actor.role != Role::University && !actor.is_admin() {
                    return Err(AppError::Forbidden(
                        "University scope requires a university account".to_string(),
                    ));
                }
                Ok(VisibilityFilter::university_owner(aff))
            }
            Self::RsoAdmin => {
                if actor.role != Role::RsoAdmin && !actor.is_admin() {
                    return Err(AppError::Forbidden(
                        "RSO scope requires an RSO admin account".to_string(),
                    ));
                }
                Ok(VisibilityFilter::rso_admin(aff))
            }
        }
    }
}

/// Keeps the first occurrence of every event id, preserving order.
pub fn dedup_events(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|e| seen.insert(e.event_id))
        .collect()
}

/// resolve_events
///
/// The Visibility Resolver entry point: the exact set of events `actor` may retrieve in
/// `scope`. An actor with nothing to see gets an empty list; only a role mismatch is an error.
pub async fn resolve_events(
    repo: &dyn Repository,
    actor: &AuthUser,
    scope: Scope,
) -> AppResult<Vec<Event>> {
    let aff = Affiliations::load(repo, actor.user_id).await?;
    let filter = scope.filter_for(actor, &aff)?;

    if filter.is_empty() {
        tracing::debug!(user_id = actor.user_id, ?scope, "no affiliations, empty event set");
        return Ok(Vec::new());
    }

    let events = dedup_events(repo.list_events(&filter).await?);
    tracing::debug!(
        user_id = actor.user_id,
        ?scope,
        count = events.len(),
        "resolved visible events"
    );
    Ok(events)
}

/// can_view
///
/// Whether a single event is visible to `actor` under any scope the actor holds. Admins and
/// the event's creator always see it.
pub async fn can_view(repo: &dyn Repository, actor: &AuthUser, event: &Event) -> AppResult<bool> {
    if actor.is_admin() || event.created_by == actor.user_id {
        return Ok(true);
    }

    let aff = Affiliations::load(repo, actor.user_id).await?;
    let filter = VisibilityFilter::student(&aff)
        .union(VisibilityFilter::university_owner(&aff))
        .union(VisibilityFilter::rso_admin(&aff));

    Ok(filter.admits(event))
}

/// load_visible_event
///
/// Fetches an event the actor may see. Invisible events are reported exactly like absent
/// ones, so existence of a private event is not leaked.
pub async fn load_visible_event(
    repo: &dyn Repository,
    actor: &AuthUser,
    event_id: i64,
) -> AppResult<Event> {
    let not_found = || AppError::NotFound("Event not found".to_string());
    let event = repo.get_event(event_id).await?.ok_or_else(not_found)?;

    if can_view(repo, actor, &event).await? {
        Ok(event)
    } else {
        Err(not_found())
    }
}
