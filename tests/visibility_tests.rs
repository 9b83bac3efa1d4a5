mod common;

use campus_events::{
    AppError,
    models::{Event, Role, Visibility},
    visibility::{self, Affiliations, Scope, VisibilityFilter},
    workflow::{self, ApprovalKind},
};
use common::*;

/// UCF with a public and a private event, USF with a private event, and an active
/// "Chess" RSO at UCF hosting an rso-only event.
struct Campus {
    repo: std::sync::Arc<campus_events::InMemoryRepository>,
    ucf_owner: campus_events::auth::AuthUser,
    usf_owner: campus_events::auth::AuthUser,
    rso_admin: campus_events::auth::AuthUser,
    ucf: i64,
    chess: i64,
}

async fn campus() -> Campus {
    let repo = repo();
    let admin = admin(&repo).await;
    let (ucf_owner, ucf) = active_university(&repo, &admin, "ucf@campus.test", "UCF").await;
    let (usf_owner, usf) = active_university(&repo, &admin, "usf@campus.test", "USF").await;
    let founder = active_student(&repo, &ucf_owner, "founder@campus.test", ucf).await;
    let (rso_admin, chess) = active_rso(&repo, &ucf_owner, &founder, "Chess", ucf).await;

    publish(&repo, &ucf_owner, event_request("ucf-public", Visibility::Public, Some(ucf), None)).await;
    publish(&repo, &ucf_owner, event_request("ucf-private", Visibility::Private, Some(ucf), None)).await;
    publish(&repo, &usf_owner, event_request("usf-private", Visibility::Private, Some(usf), None)).await;
    publish(
        &repo,
        &rso_admin,
        event_request("chess-night", Visibility::Rso, None, Some(chess.rso_id)),
    )
    .await;

    Campus {
        repo,
        ucf_owner,
        usf_owner,
        rso_admin,
        ucf,
        chess: chess.rso_id,
    }
}

// --- Student scope ---

#[tokio::test]
async fn active_student_sees_public_and_own_private_events() {
    let c = campus().await;
    let student = active_student(&c.repo, &c.ucf_owner, "s1@campus.test", c.ucf).await;

    let events = visibility::resolve_events(c.repo.as_ref(), &student, Scope::Student)
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["ucf-private", "ucf-public"]);
}

#[tokio::test]
async fn pending_student_sees_only_public_events() {
    let c = campus().await;
    let (student, _) = pending_student(&c.repo, "s1@campus.test", c.ucf).await;

    let events = visibility::resolve_events(c.repo.as_ref(), &student, Scope::Student)
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["ucf-public"]);
}

#[tokio::test]
async fn rso_events_require_an_active_membership() {
    let c = campus().await;
    let student = active_student(&c.repo, &c.ucf_owner, "s1@campus.test", c.ucf).await;
    let membership = workflow::join(c.repo.as_ref(), &student, c.chess).await.unwrap();

    let pending = visibility::resolve_events(c.repo.as_ref(), &student, Scope::Student)
        .await
        .unwrap();
    assert!(!names(&pending).contains(&"chess-night"));

    workflow::approve(
        c.repo.as_ref(),
        &c.rso_admin,
        ApprovalKind::Membership,
        membership.membership_id,
    )
    .await
    .unwrap();

    let active = visibility::resolve_events(c.repo.as_ref(), &student, Scope::Student)
        .await
        .unwrap();
    assert_eq!(names(&active), vec!["chess-night", "ucf-private", "ucf-public"]);
}

#[tokio::test]
async fn user_without_affiliations_sees_public_events_only() {
    let c = campus().await;
    let outsider = user(&c.repo, "nobody@campus.test", Role::Student).await;

    let events = visibility::resolve_events(c.repo.as_ref(), &outsider, Scope::Student)
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["ucf-public"]);
}

// --- University scope ---

#[tokio::test]
async fn university_owner_sees_every_tier_of_their_university() {
    let c = campus().await;

    let events = visibility::resolve_events(c.repo.as_ref(), &c.ucf_owner, Scope::University)
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["chess-night", "ucf-private", "ucf-public"]);

    let usf = visibility::resolve_events(c.repo.as_ref(), &c.usf_owner, Scope::University)
        .await
        .unwrap();
    assert_eq!(names(&usf), vec!["usf-private"]);
}

#[tokio::test]
async fn university_scope_rejects_other_roles() {
    let c = campus().await;
    let student = active_student(&c.repo, &c.ucf_owner, "s1@campus.test", c.ucf).await;

    let result = visibility::resolve_events(c.repo.as_ref(), &student, Scope::University).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

// --- RSO admin scope ---

#[tokio::test]
async fn rso_admin_sees_events_of_their_active_rsos() {
    let c = campus().await;

    let events = visibility::resolve_events(c.repo.as_ref(), &c.rso_admin, Scope::RsoAdmin)
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["chess-night"]);
}

#[tokio::test]
async fn rso_admin_of_a_pending_rso_gets_an_empty_list() {
    let c = campus().await;
    let founder = active_student(&c.repo, &c.ucf_owner, "go@campus.test", c.ucf).await;
    let (pending_admin, _) = pending_rso(&c.repo, &founder, "Go Club", c.ucf).await;

    let events = visibility::resolve_events(c.repo.as_ref(), &pending_admin, Scope::RsoAdmin)
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn rso_admin_scope_rejects_students() {
    let c = campus().await;
    let student = active_student(&c.repo, &c.ucf_owner, "s1@campus.test", c.ucf).await;

    let result = visibility::resolve_events(c.repo.as_ref(), &student, Scope::RsoAdmin).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

// --- Single event reads ---

#[tokio::test]
async fn invisible_events_read_as_not_found() {
    let c = campus().await;
    let student = active_student(&c.repo, &c.ucf_owner, "s1@campus.test", c.ucf).await;
    let all = visibility::resolve_events(c.repo.as_ref(), &c.usf_owner, Scope::University)
        .await
        .unwrap();
    let usf_private = all[0].event_id;

    let result = visibility::load_visible_event(c.repo.as_ref(), &student, usf_private).await;
    assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "Event not found"));

    let own = visibility::load_visible_event(c.repo.as_ref(), &c.usf_owner, usf_private).await;
    assert!(own.is_ok());
}

// --- Filter semantics ---

fn event(event_id: i64, visibility: Visibility, university_id: i64, rso_id: Option<i64>) -> Event {
    Event {
        event_id,
        visibility,
        university_id,
        rso_id,
        ..Default::default()
    }
}

#[test]
fn student_filter_admits_by_tier() {
    let aff = Affiliations {
        active_student_universities: vec![1],
        active_memberships: vec![10],
        ..Default::default()
    };
    let filter = VisibilityFilter::student(&aff);

    assert!(filter.admits(&event(1, Visibility::Public, 2, None)));
    assert!(filter.admits(&event(2, Visibility::Private, 1, None)));
    assert!(!filter.admits(&event(3, Visibility::Private, 2, None)));
    assert!(filter.admits(&event(4, Visibility::Rso, 1, Some(10))));
    assert!(!filter.admits(&event(5, Visibility::Rso, 1, Some(11))));
}

#[test]
fn empty_affiliations_give_empty_owner_filters() {
    let aff = Affiliations::default();

    assert!(VisibilityFilter::university_owner(&aff).is_empty());
    assert!(VisibilityFilter::rso_admin(&aff).is_empty());
    assert!(!VisibilityFilter::student(&aff).is_empty());
}

#[test]
fn union_admits_what_either_side_admits() {
    let owner = VisibilityFilter::university_owner(&Affiliations {
        owned_university: Some(3),
        ..Default::default()
    });
    let rso = VisibilityFilter::rso_admin(&Affiliations {
        administered_active_rsos: vec![7],
        ..Default::default()
    });
    let both = owner.clone().union(rso.clone());

    let at_university = event(1, Visibility::Private, 3, None);
    let at_rso = event(2, Visibility::Rso, 9, Some(7));
    assert!(both.admits(&at_university) && both.admits(&at_rso));
    assert!(!owner.admits(&at_rso));
    assert!(!rso.admits(&at_university));
}

#[test]
fn dedup_keeps_first_occurrence() {
    let events = vec![
        event(1, Visibility::Public, 1, None),
        event(2, Visibility::Public, 1, None),
        event(1, Visibility::Public, 1, None),
    ];
    let ids: Vec<i64> = visibility::dedup_events(events)
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}
