//! Authorization guard for mutations of events, comments and ratings.
//!
//! Every mutation follows the same pattern: load the target, compare its owner field with the
//! verified actor, allow on a match or for admins, otherwise `Forbidden`. A missing target is
//! `NotFound`.

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CreateEventRequest, Event, EventComment, EventRating, NewEvent, Status,
        UpdateEventRequest, Visibility,
    },
    repository::Repository,
    visibility,
};

/// Rows that record the user who created them.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for Event {
    fn owner_id(&self) -> i64 {
        self.created_by
    }
}

impl Owned for EventComment {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

pub fn authorize_owner<T: Owned>(actor: &AuthUser, target: &T, what: &str) -> AppResult<()> {
    if actor.is_admin() || target.owner_id() == actor.user_id {
        Ok(())
    } else {
        tracing::warn!(
            user_id = actor.user_id,
            owner_id = target.owner_id(),
            what,
            "ownership check failed"
        );
        Err(AppError::Forbidden(format!(
            "You can only modify your own {what}"
        )))
    }
}

/// Non-empty after trimming.
fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{field} cannot be empty")))
    } else {
        Ok(())
    }
}

/// authorize_event_creation
///
/// Checks the visibility/path invariant and the creator's right to publish there, and
/// resolves the event's university:
/// - `rso`: requires `rso_id`; the actor must administer that active RSO. The university is
///   the RSO's.
/// - `public`/`private`: requires `university_id`; the actor must own that university or
///   administer an active RSO there. A supplied `rso_id` must name such an RSO.
///
/// Non-admins publish only at an active university. Admins may publish anywhere, but the
/// referenced rows must exist.
pub async fn authorize_event_creation(
    repo: &dyn Repository,
    actor: &AuthUser,
    req: CreateEventRequest,
) -> AppResult<NewEvent> {
    require_text(&req.name, "name")?;
    require_text(&req.description, "description")?;

    if req.visibility == Visibility::Rso && req.rso_id.is_none() {
        return Err(AppError::Validation(
            "rso events require an rso_id".to_string(),
        ));
    }
    if req.visibility != Visibility::Rso && req.university_id.is_none() {
        return Err(AppError::Validation(
            "public and private events require a university_id".to_string(),
        ));
    }

    let rso = match req.rso_id {
        Some(rso_id) => Some(
            repo.get_rso(rso_id)
                .await?
                .ok_or_else(|| AppError::NotFound("RSO not found".to_string()))?,
        ),
        None => None,
    };

    let university_id = match (&rso, req.university_id) {
        (Some(rso), Some(university_id)) if rso.university_id != university_id => {
            return Err(AppError::Validation(
                "rso_id does not belong to university_id".to_string(),
            ));
        }
        (Some(rso), _) => rso.university_id,
        (None, Some(university_id)) => university_id,
        (None, None) => {
            return Err(AppError::Validation(
                "event requires a university_id".to_string(),
            ));
        }
    };

    let university = repo
        .get_university(university_id)
        .await?
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))?;

    if !actor.is_admin() {
        if university.status != Status::Active {
            return Err(AppError::Forbidden(
                "University is not approved yet".to_string(),
            ));
        }

        let administers_rso = rso
            .as_ref()
            .is_some_and(|r| r.rso_admin == actor.user_id && r.status == Status::Active);

        let allowed = match req.visibility {
            Visibility::Rso => administers_rso,
            Visibility::Public | Visibility::Private => {
                let owns_university = university.user_id == actor.user_id;
                let administers_any_here = repo
                    .rsos_administered_by(actor.user_id)
                    .await?
                    .iter()
                    .any(|r| r.university_id == university_id && r.status == Status::Active);
                // A named RSO must itself be one the actor runs.
                if rso.is_some() {
                    owns_university || administers_rso
                } else {
                    owns_university || administers_any_here
                }
            }
        };

        if !allowed {
            return Err(AppError::Forbidden(
                "Not authorized to publish events here".to_string(),
            ));
        }
    }

    Ok(NewEvent {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category,
        date_time: req.date_time,
        building_id: req.building_id,
        contact_phone: req.contact_phone,
        contact_email: req.contact_email,
        visibility: req.visibility,
        university_id,
        rso_id: req.rso_id,
        created_by: actor.user_id,
    })
}

/// Creator or admin only. The creator's current role/membership is not re-validated.
pub async fn update_event(
    repo: &dyn Repository,
    actor: &AuthUser,
    event_id: i64,
    req: UpdateEventRequest,
) -> AppResult<Event> {
    let event = load_event(repo, event_id).await?;
    authorize_owner(actor, &event, "events")?;

    if let Some(name) = &req.name {
        require_text(name, "name")?;
    }
    if let Some(description) = &req.description {
        require_text(description, "description")?;
    }

    repo.update_event(event_id, req)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

pub async fn delete_event(repo: &dyn Repository, actor: &AuthUser, event_id: i64) -> AppResult<()> {
    let event = load_event(repo, event_id).await?;
    authorize_owner(actor, &event, "events")?;

    if repo.delete_event(event_id).await? {
        tracing::info!(user_id = actor.user_id, event_id, "event deleted");
        Ok(())
    } else {
        Err(AppError::NotFound("Event not found".to_string()))
    }
}

async fn load_event(repo: &dyn Repository, event_id: i64) -> AppResult<Event> {
    repo.get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn load_comment(repo: &dyn Repository, comment_id: i64) -> AppResult<EventComment> {
    repo.get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Comments may only be posted on events the actor can see.
pub async fn add_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    event_id: i64,
    text: &str,
) -> AppResult<EventComment> {
    require_text(text, "Comment")?;
    visibility::load_visible_event(repo, actor, event_id).await?;
    repo.add_comment(event_id, actor.user_id, text.trim()).await
}

pub async fn update_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    comment_id: i64,
    text: &str,
) -> AppResult<EventComment> {
    require_text(text, "Comment")?;
    let comment = load_comment(repo, comment_id).await?;
    authorize_owner(actor, &comment, "comments")?;

    repo.update_comment(comment_id, text.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

pub async fn delete_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    comment_id: i64,
) -> AppResult<()> {
    let comment = load_comment(repo, comment_id).await?;
    authorize_owner(actor, &comment, "comments")?;

    if repo.delete_comment(comment_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("Comment not found".to_string()))
    }
}

/// Upsert keyed on (event, actor): a user can only ever write their own rating.
pub async fn rate_event(
    repo: &dyn Repository,
    actor: &AuthUser,
    event_id: i64,
    rating: i32,
) -> AppResult<EventRating> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    visibility::load_visible_event(repo, actor, event_id).await?;
    repo.upsert_rating(event_id, actor.user_id, rating).await
}

pub async fn delete_rating(repo: &dyn Repository, actor: &AuthUser, event_id: i64) -> AppResult<()> {
    if repo.delete_rating(event_id, actor.user_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("Rating not found".to_string()))
    }
}
