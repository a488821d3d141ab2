//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the services.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::*;

/// Transactional persistence for boards, threads, posts and uploads.
///
/// Every mutating method runs in its own transaction and leaves no partial
/// rows behind when it fails.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    // Board Operations
    async fn create_board(&self, board: NewBoard) -> Result<Board>;
    async fn board_by_id(&self, id: i64) -> Result<Board>;
    async fn board_by_dir(&self, dir: &str) -> Result<Board>;
    async fn list_boards(&self) -> Result<Vec<Board>>;

    // Post Operations
    /// Creates the thread when `post.thread_id` is `None`, otherwise replies to
    /// an existing unlocked thread, and attaches `upload` in the same transaction.
    async fn insert_post(&self, post: NewPost, upload: Option<Upload>) -> Result<InsertedPost>;
    /// Fails with `AlreadyAttached` when `upload.id` is already set.
    async fn attach_file(&self, post_id: i64, upload: Upload) -> Result<Upload>;
    async fn post_by_id(&self, id: i64) -> Result<Post>;
    async fn update_post(&self, id: i64, edit: PostEdit) -> Result<Post>;
    async fn set_banned_message(&self, id: i64, message: &str) -> Result<Post>;
    /// Deleting a top post removes the whole thread.
    async fn delete_post(&self, id: i64) -> Result<DeletedPost>;
    /// Removes only the uploads of a post and returns them.
    async fn delete_post_uploads(&self, id: i64) -> Result<Vec<Upload>>;

    // Thread Operations
    async fn thread_by_id(&self, id: i64) -> Result<Thread>;
    async fn set_thread_attribute(&self, id: i64, attribute: ThreadAttribute, value: bool) -> Result<Thread>;

    // Cooldown lookups
    async fn last_thread_by_ip(&self, ip: &str) -> Result<Option<DateTime<Utc>>>;
    async fn last_post_by_ip(&self, ip: &str) -> Result<Option<DateTime<Utc>>>;

    // Read projections for page building
    /// Threads ordered stickied first, then by last bump descending.
    async fn board_threads(&self, board_id: i64) -> Result<Vec<ThreadOverview>>;
    async fn thread_posts(&self, thread_id: i64) -> Result<Vec<PostWithUploads>>;
    /// The newest `limit` replies of a thread, oldest first.
    async fn latest_replies(&self, thread_id: i64, limit: usize) -> Result<Vec<PostWithUploads>>;
    async fn recent_posts(&self, limit: usize) -> Result<Vec<RecentPost>>;
}

/// Persistence for bans, appeals, reports and word filters.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ModerationStore: Send + Sync {
    // IP bans
    async fn create_ip_ban(&self, ban: NewIpBan, staff_id: i64, created_on: DateTime<Utc>) -> Result<IpBan>;
    async fn ip_ban_by_id(&self, id: i64) -> Result<IpBan>;
    /// Active bans scoped to `board_id` or global; expiry is left to the caller.
    async fn active_ip_bans(&self, board_id: i64) -> Result<Vec<IpBan>>;
    async fn list_ip_bans(&self, board_id: Option<i64>, limit: i64) -> Result<Vec<IpBan>>;
    /// Returns false when the ban was already inactive.
    async fn deactivate_ip_ban(&self, id: i64, staff_id: i64) -> Result<bool>;

    // Name, filename and checksum bans
    async fn create_pattern_ban(&self, ban: NewPatternBan, staff_id: i64, created_on: DateTime<Utc>) -> Result<PatternBan>;
    async fn active_pattern_bans(&self, target: PatternTarget, board_id: i64) -> Result<Vec<PatternBan>>;
    async fn deactivate_pattern_ban(&self, target: PatternTarget, id: i64) -> Result<bool>;

    // Appeals
    async fn create_appeal(&self, ban_id: i64, message: &str, created_on: DateTime<Utc>) -> Result<Appeal>;
    async fn appeal_by_id(&self, id: i64) -> Result<Appeal>;
    async fn list_appeals(&self, ban_id: Option<i64>, limit: i64) -> Result<Vec<Appeal>>;
    /// Records the approval and deactivates the ban in one transaction.
    async fn approve_appeal(&self, id: i64, staff_id: i64, approved_on: DateTime<Utc>) -> Result<Appeal>;

    // Reports
    async fn create_report(&self, post_id: i64, ip: &str, reason: &str, created_on: DateTime<Utc>) -> Result<Report>;
    async fn report_by_id(&self, id: i64) -> Result<Report>;
    async fn reports_blocked(&self, post_id: i64) -> Result<bool>;
    async fn open_reports(&self) -> Result<Vec<Report>>;
    /// Returns false when no open report matched.
    async fn clear_report(&self, id: i64, staff_id: i64, block: bool) -> Result<bool>;

    // Word filters
    async fn create_word_filter(&self, filter: NewWordFilter, staff_id: i64) -> Result<WordFilter>;
    async fn active_word_filters(&self, board_id: i64) -> Result<Vec<WordFilter>>;
}

/// Turns a page context into bytes. Failures are reported, not retried.
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, page: &PageContext, format: OutputFormat) -> Result<Bytes>;
}

/// External spam-check capability (e.g. a DNS blocklist or Akismet-like service).
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait SpamChecker: Send + Sync {
    async fn check(&self, submission: &SpamSubmission) -> SpamVerdict;
}

/// Generated-artifact storage under the document root. Paths are relative.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait SiteFilesystem: Send + Sync {
    /// Replaces the file atomically and applies the configured ownership.
    async fn write_artifact(&self, path: &str, contents: Bytes) -> Result<()>;
    /// Removing a missing file is not an error.
    async fn remove_file(&self, path: &str) -> Result<()>;
    /// File names in a directory; a missing directory yields an empty list.
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;
}

/// Upload storage: raw file plus thumbnails.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Writes the raw file and its thumbnails and returns an unattached upload.
    async fn store_upload(
        &self,
        board_dir: &str,
        file: IncomingFile,
        checksum: String,
        thumbnail: ThumbnailSize,
        catalog_thumbnail: Option<ThumbnailSize>,
    ) -> Result<StoredMedia>;
    /// Removes the raw file and thumbnails, tolerating files already gone.
    async fn remove_upload(&self, board_dir: &str, upload: &Upload) -> Result<()>;
    /// Removes exactly the given relative paths, tolerating files already gone.
    async fn remove_paths(&self, paths: &[String]) -> Result<()>;
}

/// Source of the current time, injectable for cooldown and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
