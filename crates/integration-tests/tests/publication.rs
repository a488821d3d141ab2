//! Posting, editing and deleting through the full pipeline, checked against
//! the files left in the document root.

use domains::{ContentStore, ErrorKind, StaffRank, ThreadAttribute};
use integration_tests::{new_thread, png, reply, staff, upload, TestSite};
use services::Credential;

#[tokio::test]
async fn a_new_thread_publishes_every_page_that_shows_it() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let receipt = site.post(new_thread(&board, "hello world")).await;
    let id = receipt.post.id;

    assert_eq!(receipt.thread.id, id);
    assert!(receipt.post.is_top_post);
    assert_eq!(receipt.redirect, "/b/");
    for page in [
        "b/index.html".to_string(),
        "b/catalog.html".to_string(),
        "b/catalog.json".to_string(),
        format!("b/res/{id}.html"),
        format!("b/res/{id}.json"),
        "index.html".to_string(),
    ] {
        assert!(site.exists(&page), "{page} was not written");
    }
    assert!(site.read(&format!("b/res/{id}.html")).contains("hello world"));
    assert!(site.read("b/index.html").contains("hello world"));
    assert!(site.read("index.html").contains("hello world"));
}

#[tokio::test]
async fn replies_link_back_and_show_in_order() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "op")).await;
    let tid = op.thread.id;

    let first = site.post(reply(&board, tid, "first reply")).await;
    let second = site.post(reply(&board, tid, &format!(">>{}\nagreed", first.post.id))).await;

    assert_eq!(second.post.thread_id, tid);
    let html = site.read(&format!("b/res/{tid}.html"));
    assert!(html.contains(&format!("href=\"/b/res/{tid}.html#{}\"", first.post.id)));

    let json: serde_json::Value = serde_json::from_str(&site.read(&format!("b/res/{tid}.json"))).unwrap();
    let ids: Vec<i64> = json["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![tid, first.post.id, second.post.id]);
}

#[tokio::test]
async fn noko_sends_the_poster_to_their_post() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "op")).await;

    let mut submission = reply(&board, op.thread.id, "staying here");
    submission.email = "noko".into();
    let receipt = site.post(submission).await;

    assert_eq!(
        receipt.redirect,
        format!("/b/res/{}.html#{}", op.thread.id, receipt.post.id)
    );
    assert!(receipt.post.email.is_empty());
}

#[tokio::test]
async fn sage_replies_leave_the_thread_where_it_is() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let older = site.post(new_thread(&board, "older")).await;
    let newer = site.post(new_thread(&board, "newer")).await;

    let mut sage = reply(&board, older.thread.id, "quiet");
    sage.email = "sage".into();
    site.post(sage).await;

    let order: Vec<i64> = site
        .store
        .board_threads(board.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.thread.id)
        .collect();
    assert_eq!(order, vec![newer.thread.id, older.thread.id]);

    site.post(reply(&board, older.thread.id, "bump")).await;
    let first = site.store.board_threads(board.id).await.unwrap()[0].thread.id;
    assert_eq!(first, older.thread.id);
}

#[tokio::test]
async fn edits_need_the_password_or_a_moderator() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "original text")).await;
    let id = op.post.id;

    let err = site
        .pipeline
        .edit_post(id, Credential::Password("wrong"), "vandalised")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    let janitor = staff(StaffRank::Janitor);
    let err = site
        .pipeline
        .edit_post(id, Credential::Staff(&janitor), "vandalised")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    site.pipeline
        .edit_post(id, Credential::Password("hunter2"), "corrected text")
        .await
        .unwrap();
    let html = site.read(&format!("b/res/{id}.html"));
    assert!(html.contains("corrected text"));
    assert!(!html.contains("original text"));
}

#[tokio::test]
async fn edits_cannot_blank_a_post_without_files() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "words")).await;

    let err = site
        .pipeline
        .edit_post(op.post.id, Credential::Password("hunter2"), "  \n ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "Your post must have an upload or a comment");

    let mut pictured = reply(&board, op.thread.id, "caption");
    pictured.file = Some(upload("cat.png", png(32, 32)));
    let with_file = site.post(pictured).await;
    let edited = site
        .pipeline
        .edit_post(with_file.post.id, Credential::Password("hunter2"), "")
        .await
        .unwrap();
    assert!(edited.message_raw.is_empty());
}

#[tokio::test]
async fn deleting_the_top_post_takes_the_thread_pages_with_it() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "doomed thread")).await;
    let tid = op.thread.id;
    site.post(reply(&board, tid, "doomed reply")).await;

    let receipt = site
        .pipeline
        .delete_post(tid, Credential::Password("hunter2"), false)
        .await
        .unwrap();

    assert!(receipt.thread_removed);
    assert_eq!(receipt.removed_posts, 2);
    assert!(!site.exists(&format!("b/res/{tid}.html")));
    assert!(!site.exists(&format!("b/res/{tid}.json")));
    assert!(!site.read("b/index.html").contains("doomed thread"));
    assert!(!site.read("index.html").contains("doomed reply"));
}

#[tokio::test]
async fn deleting_a_reply_keeps_the_thread() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "op")).await;
    let tid = op.thread.id;
    let doomed = site.post(reply(&board, tid, "regrettable")).await;

    let moderator = staff(StaffRank::Janitor);
    let receipt = site
        .pipeline
        .delete_post(doomed.post.id, Credential::Staff(&moderator), false)
        .await
        .unwrap();

    assert!(!receipt.thread_removed);
    assert_eq!(receipt.removed_posts, 1);
    let html = site.read(&format!("b/res/{tid}.html"));
    assert!(!html.contains("regrettable"));
}

#[tokio::test]
async fn locked_threads_refuse_replies() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    let op = site.post(new_thread(&board, "op")).await;
    let moderator = staff(StaffRank::Moderator);

    let thread = site
        .pipeline
        .set_thread_attribute(&moderator, op.thread.id, ThreadAttribute::Locked, true)
        .await
        .unwrap();
    assert!(thread.locked);

    let err = site
        .pipeline
        .submit_post(reply(&board, op.thread.id, "too late"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Thread is locked");
    assert_eq!(site.store.thread_posts(op.thread.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn replies_to_another_boards_thread_are_not_found() {
    let site = TestSite::new().await;
    let b = site.board("b").await;
    let g = site.board("g").await;
    let op = site.post(new_thread(&b, "op on b")).await;

    let err = site
        .pipeline
        .submit_post(reply(&g, op.thread.id, "wrong board"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn board_dirs_are_unique_and_plain() {
    let site = TestSite::new().await;
    let board = site.board("b").await;
    assert!(site.exists("b/index.html"));
    assert!(site.read("index.html").contains("href=\"/b/\""));
    assert_eq!(board.max_message_length, 8192);

    let duplicate = site
        .pipeline
        .create_board(domains::NewBoard {
            dir: "b".into(),
            title: "Again".into(),
            subtitle: String::new(),
            description: String::new(),
            max_message_length: 0,
        })
        .await
        .unwrap_err();
    assert_eq!(duplicate.message, "Board /b/ already exists");

    let invalid = site
        .pipeline
        .create_board(domains::NewBoard {
            dir: "../etc".into(),
            title: "Nope".into(),
            subtitle: String::new(),
            description: String::new(),
            max_message_length: 0,
        })
        .await
        .unwrap_err();
    assert_eq!(invalid.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn overlong_messages_are_refused_before_anything_is_written() {
    let site = TestSite::new().await;
    let board = site.board("b").await;

    let err = site
        .pipeline
        .submit_post(new_thread(&board, &"x".repeat(8193)))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.context.get("maxMessageLength"), Some(&serde_json::json!(8192)));
    assert!(site.list("b/res").is_empty());
}
