mod common;

use campus_events::{
    AppError,
    models::{CreateRsoRequest, CreateStudentRequest, CreateUniversityRequest, Role, Status},
    repository::{FailPoint, Repository},
    workflow::{self, ApprovalKind},
};
use common::*;
use std::sync::Arc;

// --- Approve ---

#[tokio::test]
async fn approve_succeeds_once_then_reports_not_found() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (_, student_id) = pending_student(&repo, "s1@campus.test", university_id).await;

    workflow::approve(repo.as_ref(), &owner, ApprovalKind::Student, student_id)
        .await
        .expect("first approval");

    let student = repo.get_student(student_id).await.unwrap().unwrap();
    assert_eq!(student.status, Status::Active);

    let second = workflow::approve(repo.as_ref(), &owner, ApprovalKind::Student, student_id).await;
    match second {
        Err(AppError::NotFound(msg)) => assert_eq!(msg, "Student not found or already approved"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_approvals_have_exactly_one_winner() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (_, student_id) = pending_student(&repo, "s1@campus.test", university_id).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            workflow::approve(repo.as_ref(), &owner, ApprovalKind::Student, student_id).await
        }));
    }

    let mut wins = 0;
    let mut not_found = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(AppError::NotFound(_)) => not_found += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(not_found, 7);
}

#[tokio::test]
async fn approve_unknown_target_is_not_found() {
    let repo = repo();
    let admin = admin(&repo).await;

    let result = workflow::approve(repo.as_ref(), &admin, ApprovalKind::Rso, 999).await;
    assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "RSO not found"));
}

#[tokio::test]
async fn university_approval_is_admin_only() {
    let repo = repo();
    let owner = user(&repo, "ucf@campus.test", Role::University).await;
    let university = workflow::register_university(
        repo.as_ref(),
        &owner,
        CreateUniversityRequest {
            name: "UCF".to_string(),
            location: "Orlando".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let result = workflow::approve(
        repo.as_ref(),
        &owner,
        ApprovalKind::University,
        university.university_id,
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(
        repo.get_university(university.university_id)
            .await
            .unwrap()
            .unwrap()
            .status,
        Status::Pending
    );
}

#[tokio::test]
async fn owner_of_another_university_cannot_approve_students() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (_, ucf) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (other_owner, _) = active_university(&repo, &admin, "usf@campus.test", "USF").await;
    let (_, student_id) = pending_student(&repo, "s1@campus.test", ucf).await;

    let result =
        workflow::approve(repo.as_ref(), &other_owner, ApprovalKind::Student, student_id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn students_cannot_approve_students() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let peer = active_student(&repo, &owner, "peer@campus.test", university_id).await;
    let (_, student_id) = pending_student(&repo, "s1@campus.test", university_id).await;

    let result = workflow::approve(repo.as_ref(), &peer, ApprovalKind::Student, student_id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn rso_admin_approves_memberships_of_their_rso() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (rso_admin, rso) = active_rso(&repo, &owner, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;

    let membership = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await.unwrap();
    assert_eq!(membership.status, Status::Pending);

    workflow::approve(
        repo.as_ref(),
        &rso_admin,
        ApprovalKind::Membership,
        membership.membership_id,
    )
    .await
    .unwrap();

    let stored = repo
        .get_membership(membership.membership_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, Status::Active);
}

#[tokio::test]
async fn founders_of_pending_rsos_cannot_approve_memberships() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (rso_admin, rso) = pending_rso(&repo, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;
    let membership = repo
        .insert_membership(joiner.user_id, rso.rso_id)
        .await
        .unwrap()
        .unwrap();

    let result = workflow::approve(
        repo.as_ref(),
        &rso_admin,
        ApprovalKind::Membership,
        membership.membership_id,
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let denied = workflow::deny(
        repo.as_ref(),
        &rso_admin,
        ApprovalKind::Membership,
        membership.membership_id,
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let stored = repo
        .get_membership(membership.membership_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, Status::Pending);
    assert_eq!(
        repo.get_rso(rso.rso_id).await.unwrap().unwrap().status,
        Status::Pending
    );
}

// --- Deny ---

#[tokio::test]
async fn deny_student_removes_the_requesting_account() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (student, student_id) = pending_student(&repo, "s1@campus.test", university_id).await;

    workflow::deny(repo.as_ref(), &owner, ApprovalKind::Student, student_id)
        .await
        .unwrap();

    assert!(repo.get_student(student_id).await.unwrap().is_none());
    assert!(repo.get_user(student.user_id).await.unwrap().is_none());

    let again = workflow::deny(repo.as_ref(), &owner, ApprovalKind::Student, student_id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn deny_rejects_active_targets() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let student = active_student(&repo, &owner, "s1@campus.test", university_id).await;
    let student_id = repo
        .student_for_user(student.user_id)
        .await
        .unwrap()
        .unwrap()
        .student_id;

    let result = workflow::deny(repo.as_ref(), &owner, ApprovalKind::Student, student_id).await;
    match result {
        Err(AppError::NotFound(msg)) => assert_eq!(msg, "Student not found or no longer pending"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(repo.get_user(student.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deny_rso_cascades_to_founder_and_memberships() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (_, rso) = pending_rso(&repo, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;
    // Requests only reach pending RSOs through the store directly.
    let membership = repo
        .insert_membership(joiner.user_id, rso.rso_id)
        .await
        .unwrap()
        .unwrap();

    workflow::deny(repo.as_ref(), &owner, ApprovalKind::Rso, rso.rso_id)
        .await
        .unwrap();

    assert!(repo.get_rso(rso.rso_id).await.unwrap().is_none());
    assert!(repo.get_user(founder.user_id).await.unwrap().is_none());
    assert!(repo.student_for_user(founder.user_id).await.unwrap().is_none());
    assert!(repo
        .get_membership(membership.membership_id)
        .await
        .unwrap()
        .is_none());
    // The joiner only loses the membership row of the removed RSO.
    assert!(repo.get_user(joiner.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deny_membership_keeps_the_requester() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (rso_admin, rso) = active_rso(&repo, &owner, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;
    let membership = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await.unwrap();

    workflow::deny(
        repo.as_ref(),
        &rso_admin,
        ApprovalKind::Membership,
        membership.membership_id,
    )
    .await
    .unwrap();

    assert!(repo
        .get_membership(membership.membership_id)
        .await
        .unwrap()
        .is_none());
    assert!(repo.get_user(joiner.user_id).await.unwrap().is_some());
    assert!(repo.student_for_user(joiner.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_cascade_rolls_back_every_delete() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (student, student_id) = pending_student(&repo, "s1@campus.test", university_id).await;

    repo.inject_failure(FailPoint::UserDelete);
    let result = workflow::deny(repo.as_ref(), &owner, ApprovalKind::Student, student_id).await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let row = repo.get_student(student_id).await.unwrap();
    assert_eq!(row.map(|s| s.status), Some(Status::Pending));
    assert!(repo.get_user(student.user_id).await.unwrap().is_some());
}

// --- Join ---

#[tokio::test]
async fn joining_twice_is_a_conflict_and_never_activates() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (_, rso) = active_rso(&repo, &owner, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;

    let first = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await.unwrap();
    let second = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await;

    match second {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "User already requested to join this RSO"),
        other => panic!("expected Conflict, got {other:?}"),
    }
    let stored = repo.get_membership(first.membership_id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Pending);
}

#[tokio::test]
async fn joining_a_pending_rso_is_not_found() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;
    let (_, rso) = pending_rso(&repo, &founder, "Chess", university_id).await;
    let joiner = active_student(&repo, &owner, "joiner@campus.test", university_id).await;

    let result = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await;
    assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "RSO not found"));
    assert!(repo.memberships_for_user(joiner.user_id).await.unwrap().is_empty());

    workflow::approve(repo.as_ref(), &owner, ApprovalKind::Rso, rso.rso_id)
        .await
        .unwrap();
    let membership = workflow::join(repo.as_ref(), &joiner, rso.rso_id).await.unwrap();
    assert_eq!(membership.status, Status::Pending);
}

#[tokio::test]
async fn joining_a_missing_rso_is_not_found() {
    let repo = repo();
    let student = user(&repo, "s1@campus.test", Role::Student).await;

    let result = workflow::join(repo.as_ref(), &student, 42).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- Registration & RSO creation ---

#[tokio::test]
async fn a_university_account_registers_only_one_university() {
    let repo = repo();
    let owner = user(&repo, "ucf@campus.test", Role::University).await;
    let req = CreateUniversityRequest {
        name: "UCF".to_string(),
        location: "Orlando".to_string(),
        ..Default::default()
    };

    let first = workflow::register_university(repo.as_ref(), &owner, req.clone())
        .await
        .unwrap();
    assert_eq!(first.status, Status::Pending);

    let second = workflow::register_university(repo.as_ref(), &owner, req).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn enrollment_requires_an_active_university() {
    let repo = repo();
    let owner = user(&repo, "ucf@campus.test", Role::University).await;
    let pending = workflow::register_university(
        repo.as_ref(),
        &owner,
        CreateUniversityRequest {
            name: "UCF".to_string(),
            location: "Orlando".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let student = user(&repo, "s1@campus.test", Role::Student).await;

    let result = workflow::enroll_student(
        repo.as_ref(),
        &student,
        CreateStudentRequest {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            university_id: pending.university_id,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn creating_an_rso_promotes_the_founder() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;

    let (_, rso) = pending_rso(&repo, &founder, "Chess", university_id).await;

    assert_eq!(rso.status, Status::Pending);
    assert_eq!(rso.rso_admin, founder.user_id);
    let stored = repo.get_user(founder.user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::RsoAdmin);
}

#[tokio::test]
async fn failed_promotion_rolls_back_the_rso_insert() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (owner, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let founder = active_student(&repo, &owner, "founder@campus.test", university_id).await;

    repo.inject_failure(FailPoint::RolePromotion);
    let result = workflow::create_rso(
        repo.as_ref(),
        &founder,
        CreateRsoRequest {
            name: "Chess".to_string(),
            university_id,
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(repo.list_rsos(university_id, None).await.unwrap().is_empty());
    assert!(repo.rsos_administered_by(founder.user_id).await.unwrap().is_empty());
    let stored = repo.get_user(founder.user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Student);
}

#[tokio::test]
async fn pending_students_cannot_create_rsos() {
    let repo = repo();
    let admin = admin(&repo).await;
    let (_, university_id) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (student, _) = pending_student(&repo, "s1@campus.test", university_id).await;

    let result = workflow::create_rso(
        repo.as_ref(),
        &student,
        CreateRsoRequest {
            name: "Chess".to_string(),
            university_id,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
