use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A thread groups a top post and its replies on one board.
///
/// The thread's ID always equals the ID of its top post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub board_id: i64,
    pub locked: bool,
    pub stickied: bool,
    /// Anchored threads are never bumped by replies.
    pub anchored: bool,
    pub cyclical: bool,
    /// The timestamp used for sorting threads by activity
    pub last_bump: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    /// ID of the thread's top post; `None` for the top post itself.
    pub parent_id: Option<i64>,
    pub is_top_post: bool,
    pub ip: String,
    pub name: String,
    pub tripcode: String,
    pub email: String,
    pub subject: String,
    /// Source body after word filters, before formatting.
    pub message_raw: String,
    /// Rendered HTML body.
    pub message: String,
    /// Argon2 hash of the deletion password.
    pub password: String,
    pub created_on: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Staff note appended when the poster was banned for this post.
    pub banned_message: Option<String>,
}

impl Post {
    pub fn top_post_id(&self) -> i64 {
        self.parent_id.unwrap_or(self.id)
    }
}

/// A file attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// `0` until the upload has been attached to a post.
    pub id: i64,
    pub post_id: i64,
    /// Position among the post's uploads, assigned by the store starting at 0.
    pub file_order: i64,
    pub original_filename: String,
    /// Stored filename under `<board>/src/`.
    pub filename: String,
    pub checksum: String,
    pub file_size: i64,
    pub is_spoilered: bool,
    pub thumbnail_width: i64,
    pub thumbnail_height: i64,
    pub width: i64,
    pub height: i64,
}

impl Upload {
    pub fn is_attached(&self) -> bool {
        self.id > 0
    }

    /// Videos and unreadable formats are stored without thumbnails.
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_width > 0 && self.thumbnail_height > 0
    }

    /// Stored file, relative to the document root.
    pub fn src_path(&self, board_dir: &str) -> String {
        format!("{}/src/{}", board_dir, self.filename)
    }

    /// Thumbnail location relative to the document root, or `None` when the
    /// file type never gets one.
    pub fn thumbnail_path(&self, board_dir: &str, kind: ThumbnailKind) -> Option<String> {
        let ext = thumbnail_extension(&self.filename)?;
        let (stem, _) = self.filename.rsplit_once('.')?;
        Some(format!("{}/thumb/{}{}.{}", board_dir, stem, kind.suffix(), ext))
    }
}

/// Inline thumbnails sit next to the post; catalog thumbnails are OP-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailKind {
    Inline,
    Catalog,
}

impl ThumbnailKind {
    pub fn suffix(self) -> char {
        match self {
            ThumbnailKind::Inline => 't',
            ThumbnailKind::Catalog => 'c',
        }
    }
}

/// Image format a thumbnail of `filename` is written in.
pub fn thumbnail_extension(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "gif" | "mp4" | "png" | "webm" | "webp" => Some("png"),
        "jfif" | "jpg" | "jpeg" => Some("jpg"),
        _ => None,
    }
}

/// A validated post ready for `ContentStore::insert_post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub board_id: i64,
    /// `None` starts a new thread.
    pub thread_id: Option<i64>,
    pub ip: String,
    pub name: String,
    pub tripcode: String,
    pub email: String,
    pub subject: String,
    pub message_raw: String,
    pub message: String,
    pub password: String,
    pub created_on: DateTime<Utc>,
    /// Whether a reply moves its thread to the top. Ignored for new threads.
    pub bump: bool,
}

/// Result of a committed insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedPost {
    pub post: Post,
    pub thread: Thread,
    pub upload: Option<Upload>,
}

/// Result of a committed delete, used for filesystem cleanup and rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPost {
    pub post: Post,
    pub board_id: i64,
    /// True when the whole thread went with its top post.
    pub thread_removed: bool,
    pub removed_post_ids: Vec<i64>,
    pub removed_uploads: Vec<Upload>,
}

/// Content change applied by `ContentStore::update_post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEdit {
    pub message_raw: String,
    pub message: String,
    pub modified_on: DateTime<Utc>,
}

/// Staff-toggleable thread flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadAttribute {
    Locked,
    Stickied,
    Anchored,
    Cyclical,
}

impl ThreadAttribute {
    pub fn column(self) -> &'static str {
        match self {
            ThreadAttribute::Locked => "locked",
            ThreadAttribute::Stickied => "stickied",
            ThreadAttribute::Anchored => "anchored",
            ThreadAttribute::Cyclical => "cyclical",
        }
    }

    pub fn current(self, thread: &Thread) -> bool {
        match self {
            ThreadAttribute::Locked => thread.locked,
            ThreadAttribute::Stickied => thread.stickied,
            ThreadAttribute::Anchored => thread.anchored,
            ThreadAttribute::Cyclical => thread.cyclical,
        }
    }
}

impl fmt::Display for ThreadAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A post with its uploads in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithUploads {
    pub post: Post,
    pub uploads: Vec<Upload>,
}

/// One row of a board's thread listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadOverview {
    pub thread: Thread,
    pub top_post: PostWithUploads,
    pub reply_count: i64,
    /// Uploads attached to replies (the top post's files are not counted).
    pub image_count: i64,
}

/// A post listed on the front page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPost {
    pub board_dir: String,
    pub post: Post,
    pub thumbnail: Option<Upload>,
}

/// Raw upload received with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub original_filename: String,
    pub data: Bytes,
    pub is_spoilered: bool,
}

/// Bounding box for a generated thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

/// An upload written to disk but not yet attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub upload: Upload,
    /// Paths relative to the document root, in write order.
    pub written: Vec<String>,
}
