//! Board pagination, catalogs and full rebuilds.

use domains::{ErrorKind, StaffRank, ThreadAttribute};
use integration_tests::{new_thread, png, reply, staff, upload, TestSite};
use services::{Credential, RebuildSummary};

async fn paged_site() -> TestSite {
    TestSite::with_settings(|settings| {
        settings.default_policy.threads_per_page = 2;
        settings.default_policy.catalog_threads_per_page = 3;
    })
    .await
}

#[tokio::test]
async fn board_pages_follow_the_thread_count() {
    let site = paged_site().await;
    let board = site.board("b").await;
    let mut ids = Vec::new();
    for n in 1..=5 {
        ids.push(site.post(new_thread(&board, &format!("thread number {n}"))).await.thread.id);
    }

    assert!(site.exists("b/index.html"));
    assert!(site.exists("b/2.html"));
    assert!(site.exists("b/3.html"));
    assert!(!site.exists("b/4.html"));

    let first = site.read("b/index.html");
    assert!(first.contains("thread number 5"));
    assert!(first.contains("thread number 4"));
    assert!(!first.contains("thread number 3"));
    assert!(site.read("b/3.html").contains("thread number 1"));

    for id in &ids[..3] {
        site.pipeline
            .delete_post(*id, Credential::Password("hunter2"), false)
            .await
            .unwrap();
    }
    assert!(site.exists("b/index.html"));
    assert!(!site.exists("b/2.html"));
    assert!(!site.exists("b/3.html"));
}

#[tokio::test]
async fn stickies_lead_the_board_and_the_catalog() {
    let site = paged_site().await;
    let board = site.board("b").await;
    let oldest = site.post(new_thread(&board, "old news")).await.thread.id;
    for n in 0..3 {
        site.post(new_thread(&board, &format!("filler {n}"))).await;
    }

    site.pipeline
        .set_thread_attribute(&staff(StaffRank::Moderator), oldest, ThreadAttribute::Stickied, true)
        .await
        .unwrap();

    assert!(site.read("b/index.html").contains("old news"));
    let catalog: serde_json::Value = serde_json::from_str(&site.read("b/catalog.json")).unwrap();
    let pages = catalog.as_array().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0]["page"], 1);
    assert_eq!(pages[0]["threads"].as_array().unwrap().len(), 3);
    assert_eq!(pages[0]["threads"][0]["id"], oldest);
    assert_eq!(pages[0]["threads"][0]["sticky"], true);
    assert_eq!(pages[1]["threads"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn catalog_counts_replies_and_their_images() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let mut op = new_thread(&board, "op with a picture");
    op.file = Some(upload("op.png", png(40, 40)));
    let tid = site.post(op).await.thread.id;
    let mut with_image = reply(&board, tid, "reply with a picture");
    with_image.file = Some(upload("reply.png", png(40, 40)));
    site.post(with_image).await;
    site.post(reply(&board, tid, "plain reply")).await;

    let catalog: serde_json::Value = serde_json::from_str(&site.read("b/catalog.json")).unwrap();
    let thread = &catalog[0]["threads"][0];
    assert_eq!(thread["replies"], 2);
    assert_eq!(thread["images"], 1);
    assert!(thread["catalog_thumb"].as_str().unwrap().starts_with("/b/thumb/"));
    assert!(site.read("b/catalog.html").contains("R: 2 / I: 1"));
}

#[tokio::test]
async fn board_pages_preview_only_the_latest_replies() {
    let site = TestSite::with_settings(|settings| settings.default_policy.replies_on_board_page = 2).await;
    let board = site.board("b").await;
    let tid = site.post(new_thread(&board, "op")).await.thread.id;
    for n in 1..=4 {
        site.post(reply(&board, tid, &format!("reply number {n}"))).await;
    }

    let page = site.read("b/index.html");
    assert!(!page.contains("reply number 2"));
    assert!(page.contains("reply number 3"));
    assert!(page.contains("reply number 4"));
    assert!(page.contains("2 posts omitted."));

    let thread = site.read(&format!("b/res/{tid}.html"));
    for n in 1..=4 {
        assert!(thread.contains(&format!("reply number {n}")));
    }
}

#[tokio::test]
async fn a_full_rebuild_restores_every_page_identically() {
    let site = TestSite::new().await;
    let b = site.board("b").await;
    let g = site.board("g").await;
    let first = site.post(new_thread(&b, "on b")).await.thread.id;
    site.post(reply(&b, first, "reply on b")).await;
    let second = site.post(new_thread(&g, "on g")).await.thread.id;

    let before = site.read(&format!("b/res/{first}.html"));
    std::fs::remove_file(site.path(&format!("b/res/{first}.html"))).unwrap();
    std::fs::remove_file(site.path("g/catalog.json")).unwrap();
    std::fs::remove_file(site.path("index.html")).unwrap();

    let summary = site.pipeline.rebuild_all().await.unwrap();
    assert_eq!(
        summary,
        RebuildSummary {
            boards: 2,
            board_pages: 2,
            threads: 2
        }
    );
    assert_eq!(site.read(&format!("b/res/{first}.html")), before);
    assert!(site.exists("g/catalog.json"));
    assert!(site.exists(&format!("g/res/{second}.json")));
    assert!(site.read("index.html").contains("reply on b"));
}

#[tokio::test]
async fn rebuilding_an_unknown_board_is_not_found() {
    let site = TestSite::new().await;
    site.board("b").await;

    let summary = site.pipeline.rebuild_board("b").await.unwrap();
    assert_eq!(summary.board_pages, 1);
    assert_eq!(summary.threads, 0);

    let err = site.pipeline.rebuild_board("nope").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.context.get("boardDir"), Some(&serde_json::json!("nope")));
}
