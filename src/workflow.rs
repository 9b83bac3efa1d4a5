//! Approval workflow.
//!
//! Universities, Students, RSOs and Memberships are created `pending` by a self-service
//! action and become `active` only through `approve`, which is a single compare-and-set on
//! the store. `deny` is terminal and is represented by deleting rows inside one transaction.
//!
//! ```text
//!         join/register            approve (by authorized approver)
//!  (none) --------------> pending ----------------------------------> active
//!                             |
//!                             | deny (by authorized approver)
//!                             v
//!                         [deleted]
//! ```

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CreateRsoRequest, CreateStudentRequest, CreateUniversityRequest, Role, Rso,
        RsoMembership, Status, Student, University,
    },
    repository::Repository,
};

/// ApprovalKind
///
/// Entities governed by the pending -> active state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalKind {
    University,
    Student,
    Rso,
    Membership,
}

impl ApprovalKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::University => "University",
            Self::Student => "Student",
            Self::Rso => "RSO",
            Self::Membership => "Membership",
        }
    }
}

/// ApprovalTarget
///
/// The facts about a pending row that decide who may approve or deny it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalTarget {
    pub kind: ApprovalKind,
    pub id: i64,
    pub status: Status,
    /// University the target belongs to (the university itself for `University`).
    pub university_id: i64,
    /// Administrator of the RSO, for `Membership` targets.
    pub rso_admin: Option<i64>,
    /// Approval state of the RSO, for `Membership` targets.
    pub rso_status: Option<Status>,
}

impl ApprovalTarget {
    pub async fn load(repo: &dyn Repository, kind: ApprovalKind, id: i64) -> AppResult<Self> {
        let not_found = || AppError::NotFound(format!("{} not found", kind.label()));

        let target = match kind {
            ApprovalKind::University => {
                let u = repo.get_university(id).await?.ok_or_else(not_found)?;
                Self {
                    kind,
                    id,
                    status: u.status,
                    university_id: u.university_id,
                    rso_admin: None,
                    rso_status: None,
                }
            }
            ApprovalKind::Student => {
                let s = repo.get_student(id).await?.ok_or_else(not_found)?;
                Self {
                    kind,
                    id,
                    status: s.status,
                    university_id: s.university_id,
                    rso_admin: None,
                    rso_status: None,
                }
            }
            ApprovalKind::Rso => {
                let r = repo.get_rso(id).await?.ok_or_else(not_found)?;
                Self {
                    kind,
                    id,
                    status: r.status,
                    university_id: r.university_id,
                    rso_admin: None,
                    rso_status: None,
                }
            }
            ApprovalKind::Membership => {
                let m = repo.get_membership(id).await?.ok_or_else(not_found)?;
                let rso = repo.get_rso(m.rso_id).await?.ok_or_else(not_found)?;
                Self {
                    kind,
                    id,
                    status: m.status,
                    university_id: rso.university_id,
                    rso_admin: Some(rso.rso_admin),
                    rso_status: Some(rso.status),
                }
            }
        };

        Ok(target)
    }

    /// authorize
    ///
    /// Approver matrix:
    /// - University: platform admin only.
    /// - Student, RSO: owner of the (active) university the target belongs to, or admin.
    /// - Membership: administrator of the (active) RSO, owner of its university, or admin.
    pub async fn authorize(&self, repo: &dyn Repository, actor: &AuthUser) -> AppResult<()> {
        if actor.is_admin() {
            return Ok(());
        }

        if self.kind == ApprovalKind::Membership
            && self.rso_admin == Some(actor.user_id)
            && self.rso_status == Some(Status::Active)
        {
            return Ok(());
        }

        if self.kind != ApprovalKind::University && actor.role == Role::University {
            let owns_target_university = repo
                .university_owned_by(actor.user_id)
                .await?
                .is_some_and(|u| {
                    u.university_id == self.university_id && u.status == Status::Active
                });
            if owns_target_university {
                return Ok(());
            }
        }

        tracing::warn!(
            user_id = actor.user_id,
            kind = self.kind.label(),
            target_id = self.id,
            "approval action refused"
        );
        Err(AppError::Forbidden(format!(
            "Not authorized to review this {}",
            self.kind.label()
        )))
    }
}

/// approve
///
/// `pending -> active` for one target. Succeeds exactly once: any later call (or a losing
/// concurrent call) observes zero affected rows and reports `NotFound`.
pub async fn approve(
    repo: &dyn Repository,
    actor: &AuthUser,
    kind: ApprovalKind,
    id: i64,
) -> AppResult<()> {
    let target = ApprovalTarget::load(repo, kind, id).await?;
    target.authorize(repo, actor).await?;

    let affected = repo.activate_if_pending(kind, id).await?;
    if affected == 0 {
        return Err(AppError::NotFound(format!(
            "{} not found or already approved",
            kind.label()
        )));
    }

    tracing::info!(
        approver = actor.user_id,
        kind = kind.label(),
        target_id = id,
        "approved"
    );
    Ok(())
}

/// deny
///
/// Terminal rejection of a still-pending target. For Universities, Students and RSOs the
/// owning account is deleted together with its dependents in one transaction; a denied
/// Membership only loses its own row.
pub async fn deny(
    repo: &dyn Repository,
    actor: &AuthUser,
    kind: ApprovalKind,
    id: i64,
) -> AppResult<()> {
    let target = ApprovalTarget::load(repo, kind, id).await?;
    target.authorize(repo, actor).await?;

    if !repo.deny_pending(kind, id).await? {
        return Err(AppError::NotFound(format!(
            "{} not found or no longer pending",
            kind.label()
        )));
    }

    tracing::info!(
        approver = actor.user_id,
        kind = kind.label(),
        target_id = id,
        "denied"
    );
    Ok(())
}

/// join
///
/// Files a pending membership request for an active RSO; a pending RSO reads as absent. A
/// second request for the same RSO is a `Conflict`; re-joining never activates an existing
/// request.
pub async fn join(repo: &dyn Repository, actor: &AuthUser, rso_id: i64) -> AppResult<RsoMembership> {
    repo.get_rso(rso_id)
        .await?
        .filter(|r| r.status == Status::Active)
        .ok_or_else(|| AppError::NotFound("RSO not found".to_string()))?;

    let membership = repo
        .insert_membership(actor.user_id, rso_id)
        .await?
        .ok_or_else(|| AppError::Conflict("User already requested to join this RSO".to_string()))?;

    tracing::info!(user_id = actor.user_id, rso_id, "membership requested");
    Ok(membership)
}

/// register_university
///
/// A `university` account files its (single) university for admin approval.
pub async fn register_university(
    repo: &dyn Repository,
    actor: &AuthUser,
    req: CreateUniversityRequest,
) -> AppResult<University> {
    if actor.role != Role::University {
        return Err(AppError::Forbidden(
            "Only university accounts can register a university".to_string(),
        ));
    }

    if repo.university_owned_by(actor.user_id).await?.is_some() {
        return Err(AppError::Conflict(
            "This account already registered a university".to_string(),
        ));
    }

    repo.create_university(actor.user_id, req).await
}

/// enroll_student
///
/// A `student` account requests enrollment at an active university. One Student row per user.
pub async fn enroll_student(
    repo: &dyn Repository,
    actor: &AuthUser,
    req: CreateStudentRequest,
) -> AppResult<Student> {
    if actor.role != Role::Student {
        return Err(AppError::Forbidden(
            "Only student accounts can enroll".to_string(),
        ));
    }

    let university = repo
        .get_university(req.university_id)
        .await?
        .filter(|u| u.status == Status::Active)
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))?;

    if repo.student_for_user(actor.user_id).await?.is_some() {
        return Err(AppError::Conflict(
            "Student record already exists".to_string(),
        ));
    }

    tracing::info!(
        user_id = actor.user_id,
        university_id = university.university_id,
        "student enrollment requested"
    );
    repo.create_student(actor.user_id, req).await
}

/// create_rso
///
/// An active student of the university founds a pending RSO and, in the same transaction,
/// becomes its `rso_admin`.
pub async fn create_rso(
    repo: &dyn Repository,
    actor: &AuthUser,
    req: CreateRsoRequest,
) -> AppResult<Rso> {
    if !matches!(actor.role, Role::Student | Role::RsoAdmin) {
        return Err(AppError::Forbidden(
            "Only students can create an RSO".to_string(),
        ));
    }

    repo.get_university(req.university_id)
        .await?
        .filter(|u| u.status == Status::Active)
        .ok_or_else(|| AppError::NotFound("University not found".to_string()))?;

    let is_active_student_there = repo
        .student_for_user(actor.user_id)
        .await?
        .is_some_and(|s| s.university_id == req.university_id && s.status == Status::Active);
    if !is_active_student_there {
        return Err(AppError::Forbidden(
            "Only approved students of this university can create an RSO".to_string(),
        ));
    }

    let rso = repo
        .create_rso_promoting_admin(actor.user_id, &req.name, req.university_id)
        .await?;

    tracing::info!(
        user_id = actor.user_id,
        rso_id = rso.rso_id,
        "RSO created, creator promoted to rso_admin"
    );
    Ok(rso)
}
