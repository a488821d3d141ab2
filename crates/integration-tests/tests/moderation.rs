//! The moderation gate and the ban and report lifecycles over a real store.

use std::sync::Arc;

use chrono::Duration;
use domains::{
    ErrorKind, MockSpamChecker, ModerationStore, NewPatternBan, NewWordFilter, PatternTarget, SpamVerdict,
    StaffRank,
};
use integration_tests::{ip_ban, new_thread, reply, staff, TestSite};
use services::BanRequest;

#[tokio::test]
async fn cooldowns_hold_back_fast_posters() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let op = site.pipeline.submit_post(new_thread(&board, "first")).await.unwrap();

    let err = site
        .pipeline
        .submit_post(new_thread(&board, "second thread"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Moderation);
    assert_eq!(err.message, "Please wait before making a new post");

    let err = site
        .pipeline
        .submit_post(reply(&board, op.thread.id, "too quick"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Moderation);

    site.clock.advance(Duration::seconds(8));
    tokio_test::assert_ok!(site.pipeline.submit_post(reply(&board, op.thread.id, "patient")).await);

    // the reply above restarted the reply cooldown but not the thread one
    site.clock.advance(Duration::seconds(25));
    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&board, "second thread")).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_threads_from_one_address_are_serialised() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let (first, second) = tokio::join!(
        site.pipeline.submit_post(new_thread(&board, "one")),
        site.pipeline.submit_post(new_thread(&board, "two")),
    );

    let mut outcomes = [first, second];
    outcomes.sort_by_key(|outcome| outcome.is_err());
    let [accepted, refused] = outcomes;
    tokio_test::assert_ok!(accepted);
    let err = refused.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Moderation);
    assert_eq!(err.message, "Please wait before making a new post");
    assert_eq!(site.list("b/res").len(), 2);
}

#[tokio::test]
async fn other_addresses_are_not_slowed_down() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    site.pipeline.submit_post(new_thread(&board, "first")).await.unwrap();

    let mut other = new_thread(&board, "someone else");
    other.ip = "198.51.100.7".into();
    tokio_test::assert_ok!(site.pipeline.submit_post(other).await);
}

#[tokio::test]
async fn board_bans_only_apply_to_their_board() {
    let site = TestSite::new().await;
    let b = site.board("b").await;
    let g = site.board("g").await;
    let moderator = staff(StaffRank::Moderator);
    let op = site.post(new_thread(&b, "op")).await;

    let ban = site
        .pipeline
        .issue_ban(
            &moderator,
            BanRequest {
                ban: ip_ban(Some(b.id), "203.0.113.10", site.now()),
                post_id: None,
                banned_message: None,
            },
        )
        .await
        .unwrap();

    let err = site
        .pipeline
        .submit_post(reply(&b, op.thread.id, "let me in"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Moderation);
    let notice = err.ban.expect("ban notice");
    assert_eq!(notice.ban_id, ban.id);
    assert_eq!(notice.reason, "spamming");
    assert!(notice.can_appeal);

    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&g, "elsewhere")).await);
}

#[tokio::test]
async fn global_range_bans_cover_every_board() {
    let site = TestSite::new().await;
    let b = site.board("b").await;
    let g = site.board("g").await;
    let moderator = staff(StaffRank::Moderator);

    site.pipeline
        .issue_ban(
            &moderator,
            BanRequest {
                ban: ip_ban(None, "203.0.113.0/24", site.now()),
                post_id: None,
                banned_message: None,
            },
        )
        .await
        .unwrap();

    for board in [&b, &g] {
        let err = site.pipeline.submit_post(new_thread(board, "hi")).await.unwrap_err();
        assert!(err.ban.is_some(), "/{}/ let a banned range through", board.dir);
    }

    let mut outside = new_thread(&b, "hi");
    outside.ip = "198.51.100.7".into();
    tokio_test::assert_ok!(site.pipeline.submit_post(outside).await);
}

#[tokio::test]
async fn expired_bans_stop_applying() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let moderator = staff(StaffRank::Moderator);

    site.pipeline
        .issue_ban(
            &moderator,
            BanRequest {
                ban: ip_ban(None, "203.0.113.10", site.now()),
                post_id: None,
                banned_message: None,
            },
        )
        .await
        .unwrap();
    assert!(site.pipeline.submit_post(new_thread(&board, "hi")).await.is_err());

    site.clock.advance(Duration::days(4));
    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&board, "back again")).await);
}

#[tokio::test]
async fn banning_for_a_post_marks_it_on_the_page() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "op")).await;
    let bad = site.post(reply(&board, op.thread.id, "buy cheap watches")).await;
    let moderator = staff(StaffRank::Moderator);

    site.pipeline
        .issue_ban(
            &moderator,
            BanRequest {
                ban: ip_ban(Some(board.id), &bad.post.ip, site.now()),
                post_id: Some(bad.post.id),
                banned_message: Some("USER WAS BANNED FOR THIS POST".into()),
            },
        )
        .await
        .unwrap();

    let html = site.read(&format!("b/res/{}.html", op.thread.id));
    assert!(html.contains("USER WAS BANNED FOR THIS POST"));
}

#[tokio::test]
async fn janitors_cannot_ban() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let err = site
        .pipeline
        .issue_ban(
            &staff(StaffRank::Janitor),
            BanRequest {
                ban: ip_ban(Some(board.id), "203.0.113.10", site.now()),
                post_id: None,
                banned_message: None,
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(site.store.active_ip_bans(board.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn an_approved_appeal_lifts_the_ban() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let moderator = staff(StaffRank::Moderator);
    let ban = site
        .pipeline
        .issue_ban(
            &moderator,
            BanRequest {
                ban: ip_ban(None, "203.0.113.10", site.now()),
                post_id: None,
                banned_message: None,
            },
        )
        .await
        .unwrap();
    let bans = site.pipeline.bans();

    let early = bans.submit_appeal(ban.id, "sorry").await.unwrap_err();
    assert!(early.to_string().contains("You may appeal this ban after"));

    site.clock.advance(Duration::days(1) + Duration::minutes(1));
    let appeal = bans.submit_appeal(ban.id, "sorry").await.unwrap();
    assert!(!appeal.is_approved());
    assert!(bans.submit_appeal(ban.id, "really sorry").await.is_err());

    let approved = bans.approve_appeal(&moderator, appeal.id).await.unwrap();
    assert_eq!(approved.approved_by, Some(moderator.id));
    assert!(!site.store.ip_ban_by_id(ban.id).await.unwrap().is_active);

    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&board, "reformed")).await);
}

#[tokio::test]
async fn blocked_reports_stay_blocked() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "controversial")).await;
    let reports = site.pipeline.reports();

    let report = reports.file_report(op.post.id, "198.51.100.7", "off topic").await.unwrap();
    assert_eq!(reports.open_reports(&staff(StaffRank::Janitor)).await.unwrap().len(), 1);

    let err = reports
        .clear_report(&staff(StaffRank::Janitor), report.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, domains::DomainError::Unauthorized(_)));

    reports
        .clear_report(&staff(StaffRank::Admin), report.id, true)
        .await
        .unwrap();
    assert!(reports.open_reports(&staff(StaffRank::Janitor)).await.unwrap().is_empty());

    let again = reports
        .file_report(op.post.id, "198.51.100.8", "still off topic")
        .await
        .unwrap_err();
    assert!(matches!(again, domains::DomainError::Conflict(_)));
}

#[tokio::test]
async fn name_bans_and_word_filters_apply_per_board() {
    let site = TestSite::new().await;
    let b = site.board("b").await;
    let g = site.board("g").await;
    let bans = site.pipeline.bans();

    bans.issue_pattern_ban(
        &staff(StaffRank::Moderator),
        NewPatternBan {
            target: PatternTarget::Name,
            board_id: Some(b.id),
            pattern: "spammer".into(),
            is_regex: false,
            staff_note: String::new(),
        },
    )
    .await
    .unwrap();
    bans.add_word_filter(
        &staff(StaffRank::Admin),
        NewWordFilter {
            board_id: None,
            search: "darn".into(),
            is_regex: false,
            change_to: "gosh".into(),
            staff_note: String::new(),
        },
    )
    .await
    .unwrap();

    let mut named = new_thread(&b, "hello");
    named.name = "spammer".into();
    let err = site.pipeline.submit_post(named.clone()).await.unwrap_err();
    assert_eq!(err.message, "That name is banned");

    named.board_id = g.id;
    named.message = "darn it".into();
    let receipt = site.post(named).await;
    assert_eq!(receipt.post.message_raw, "gosh it");
    assert!(site.read(&format!("g/res/{}.html", receipt.thread.id)).contains("gosh it"));
}

#[tokio::test]
async fn spam_verdicts_reject_and_outages_do_not() {
    let mut spam = MockSpamChecker::new();
    spam.expect_check().returning(|submission| {
        if submission.message.contains("casino") {
            SpamVerdict::Spam
        } else {
            SpamVerdict::Unavailable
        }
    });
    let site = TestSite::with_spam_checker(Arc::new(spam)).await;
    let board = site.board("b").await;

    let err = site
        .pipeline
        .submit_post(new_thread(&board, "online casino"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Your post looks like spam");

    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&board, "a real post")).await);
}

#[tokio::test]
async fn foreign_referers_are_turned_away() {
    let site = TestSite::with_settings(|settings| settings.check_referer = true).await;
    let board = site.board("b").await;

    let mut forged = new_thread(&board, "hi");
    forged.referer = Some("http://evil.example/b/".into());
    assert!(site.pipeline.submit_post(forged).await.is_err());

    let mut missing = new_thread(&board, "hi");
    missing.referer = None;
    assert!(site.pipeline.submit_post(missing).await.is_err());

    tokio_test::assert_ok!(site.pipeline.submit_post(new_thread(&board, "hi")).await);
}
