//! End-to-end moderation flow
//!
//! Exercises the full path from report intake through assignment to
//! resolution: load-balanced routing, the single-active-investigation
//! rule, supervisory reassignment, and the remove-content resolution with
//! its owner notification.

mod common;

use std::sync::Arc;

use accounts::{Account, Role};
use common::FakeContentStore;
use moderation::{
    ContentType, Priority, ReportError, ReportReason, ReportRouter, ReportStatus,
    ResolutionAction, ResolutionEngine, SideEffect,
};
use notifications::{NotificationKind, NotificationService};

/// The worked scenario: R reports song S by artist X; admin A1 carries two
/// active cases and A2 none, so the report lands on A2; A2 resolves with
/// remove_content; S is deleted and X is notified with the note.
#[tokio::test]
async fn test_report_routing_and_remove_content_resolution() {
    let db = storage::open_in_memory().await.unwrap();
    let pool = db.pool().clone();

    let artist_x = Account::create(&pool, "artist-x", Role::User).await.unwrap();
    let reporter_r = Account::create(&pool, "reporter-r", Role::User).await.unwrap();
    let other_reporter = Account::create(&pool, "reporter-2", Role::User).await.unwrap();
    let admin_1 = Account::create(&pool, "admin-1", Role::Admin).await.unwrap();
    let admin_2 = Account::create(&pool, "admin-2", Role::Admin).await.unwrap();
    let root = Account::create(&pool, "root", Role::SuperAdmin).await.unwrap();

    let content = Arc::new(FakeContentStore::new());
    content.insert(ContentType::Song, 100, vec![artist_x.id]);
    content.insert(ContentType::Song, 101, vec![artist_x.id]);
    content.insert(ContentType::Song, 777, vec![artist_x.id]);

    let router = ReportRouter::new(pool.clone(), content.clone());
    let engine = ResolutionEngine::new(pool.clone(), content.clone());

    // Two earlier cases; the super admin piles both onto admin_1.
    let first = router
        .submit(other_reporter.id, ContentType::Song, 100, ReportReason::Spam, None)
        .await
        .unwrap();
    let second = router
        .submit(other_reporter.id, ContentType::Song, 101, ReportReason::Spam, None)
        .await
        .unwrap();
    router.reassign(first.id, admin_1.id, root.id).await.unwrap();
    router.reassign(second.id, admin_1.id, root.id).await.unwrap();
    assert_eq!(router.assigned_to(admin_1.id).await.unwrap().len(), 2);
    assert_eq!(router.assigned_to(admin_2.id).await.unwrap().len(), 0);

    // R's report lands on the idle admin.
    let report = router
        .submit(
            reporter_r.id,
            ContentType::Song,
            777,
            ReportReason::Spam,
            Some("auto-generated upload spam"),
        )
        .await
        .unwrap();
    assert_eq!(report.assigned_admin_id, Some(admin_2.id));

    // A2 works the case.
    let report = engine.open_review(report.id, admin_2.id).await.unwrap();
    assert_eq!(report.status, ReportStatus::InReview);

    let outcome = engine
        .resolve(
            report.id,
            ResolutionAction::RemoveContent,
            "confirmed spam, removed",
            admin_2.id,
        )
        .await
        .unwrap();

    assert_eq!(outcome.report.status, ReportStatus::Resolved);
    assert_eq!(outcome.side_effect, SideEffect::Applied);
    assert!(content.was_deleted(ContentType::Song, 777));

    // X receives a moderation notice carrying the resolution note.
    let inbox = NotificationService::new(pool.clone());
    let visible = inbox.list_visible(artist_x.id).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].kind, NotificationKind::ContentRemoved);
    assert!(visible[0].message.contains("confirmed spam, removed"));

    // Nobody told the reporter or the admins anything.
    assert!(inbox.list_visible(reporter_r.id).await.unwrap().is_empty());
    assert!(inbox.list_visible(admin_2.id).await.unwrap().is_empty());
}

/// At most one active report exists per content item, whoever reports it.
#[tokio::test]
async fn test_single_active_investigation_per_content() {
    let db = storage::open_in_memory().await.unwrap();
    let pool = db.pool().clone();

    let artist = Account::create(&pool, "artist", Role::User).await.unwrap();
    let r1 = Account::create(&pool, "listener-1", Role::User).await.unwrap();
    let r2 = Account::create(&pool, "listener-2", Role::User).await.unwrap();
    let admin = Account::create(&pool, "admin-1", Role::Admin).await.unwrap();

    let content = Arc::new(FakeContentStore::new());
    content.insert(ContentType::Playlist, 5, vec![artist.id]);

    let router = ReportRouter::new(pool.clone(), content.clone());
    let engine = ResolutionEngine::new(pool.clone(), content.clone());

    let report = router
        .submit(r1.id, ContentType::Playlist, 5, ReportReason::Other, None)
        .await
        .unwrap();

    let err = router
        .submit(r1.id, ContentType::Playlist, 5, ReportReason::Spam, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::DuplicateActiveReport));

    let err = router
        .submit(r2.id, ContentType::Playlist, 5, ReportReason::Spam, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::ContentAlreadyUnderInvestigation));

    // Closing the investigation frees the slot.
    engine
        .reject(report.id, "not actionable", admin.id)
        .await
        .unwrap();
    router
        .submit(r2.id, ContentType::Playlist, 5, ReportReason::Spam, None)
        .await
        .unwrap();
}

/// After any assignment, no active admin's caseload differs from the
/// minimum by more than one.
#[tokio::test]
async fn test_load_balance_bound_over_many_submissions() {
    let db = storage::open_in_memory().await.unwrap();
    let pool = db.pool().clone();

    let artist = Account::create(&pool, "artist", Role::User).await.unwrap();
    let reporter = Account::create(&pool, "listener", Role::User).await.unwrap();
    let admins = [
        Account::create(&pool, "admin-1", Role::Admin).await.unwrap(),
        Account::create(&pool, "admin-2", Role::Admin).await.unwrap(),
        Account::create(&pool, "admin-3", Role::Admin).await.unwrap(),
    ];

    let content = Arc::new(FakeContentStore::new());
    let router = ReportRouter::new(pool.clone(), content.clone());

    for content_id in 0..10i64 {
        content.insert(ContentType::Song, content_id, vec![artist.id]);
        router
            .submit(reporter.id, ContentType::Song, content_id, ReportReason::Spam, None)
            .await
            .unwrap();

        let mut caseloads = Vec::new();
        for admin in &admins {
            caseloads.push(router.assigned_to(admin.id).await.unwrap().len() as i64);
        }
        let max = caseloads.iter().max().unwrap();
        let min = caseloads.iter().min().unwrap();
        assert!(
            max - min <= 1,
            "caseloads drifted past the balance bound: {caseloads:?}"
        );
    }
}

/// Reports filed with no admins on duty surface in the orphan queue and
/// are recoverable through supervisory reassignment.
#[tokio::test]
async fn test_orphaned_report_recovered_by_reassignment() {
    let db = storage::open_in_memory().await.unwrap();
    let pool = db.pool().clone();

    let artist = Account::create(&pool, "artist", Role::User).await.unwrap();
    let reporter = Account::create(&pool, "listener", Role::User).await.unwrap();
    let root = Account::create(&pool, "root", Role::SuperAdmin).await.unwrap();

    let content = Arc::new(FakeContentStore::new());
    content.insert(ContentType::Comment, 9, vec![artist.id]);

    let router = ReportRouter::new(pool.clone(), content.clone());
    let engine = ResolutionEngine::new(pool.clone(), content.clone());

    let report = router
        .submit(reporter.id, ContentType::Comment, 9, ReportReason::Harassment, None)
        .await
        .unwrap();
    assert_eq!(report.assigned_admin_id, None);
    assert_eq!(router.unassigned().await.unwrap().len(), 1);

    // An admin comes on duty; the super admin hands the case over.
    let admin = Account::create(&pool, "admin-1", Role::Admin).await.unwrap();
    let report = router.reassign(report.id, admin.id, root.id).await.unwrap();
    assert_eq!(report.assigned_admin_id, Some(admin.id));
    assert!(router.unassigned().await.unwrap().is_empty());

    // Priority can move while the case is active.
    let report = router
        .set_priority(report.id, Priority::Urgent, admin.id)
        .await
        .unwrap();
    assert_eq!(report.priority, Priority::Urgent);

    engine
        .resolve(report.id, ResolutionAction::NoAction, "handled", admin.id)
        .await
        .unwrap();
}

/// Suspending through a report resolution runs the full path: user report,
/// admin immunity for staff targets, standing change for regular targets.
#[tokio::test]
async fn test_user_report_resolution_applies_standing_changes() {
    let db = storage::open_in_memory().await.unwrap();
    let pool = db.pool().clone();

    let troll = Account::create(&pool, "troll", Role::User).await.unwrap();
    let reporter = Account::create(&pool, "listener", Role::User).await.unwrap();
    let admin = Account::create(&pool, "admin-1", Role::Admin).await.unwrap();

    let content = Arc::new(FakeContentStore::new());
    let router = ReportRouter::new(pool.clone(), content.clone());
    let engine = ResolutionEngine::new(pool.clone(), content.clone());

    let report = router
        .submit(
            reporter.id,
            ContentType::User,
            troll.id,
            ReportReason::Harassment,
            Some("abusive comments on every upload"),
        )
        .await
        .unwrap();

    let outcome = engine
        .resolve(
            report.id,
            ResolutionAction::SuspendUser { days: 14 },
            "two-week suspension for harassment",
            admin.id,
        )
        .await
        .unwrap();
    assert_eq!(outcome.side_effect, SideEffect::Applied);

    let troll = Account::fetch(&pool, troll.id).await.unwrap().unwrap();
    assert!(troll.is_suspended);
    assert!(!troll.can_upload);
}
