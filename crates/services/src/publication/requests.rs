use domains::{IncomingFile, NewIpBan, Post, Staff, Thread, Upload};

/// A post as it arrives from a visitor.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub board_id: i64,
    /// `None` starts a new thread.
    pub thread_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Deletion password; an empty one makes the post staff-only to delete.
    pub password: String,
    pub ip: String,
    pub referer: Option<String>,
    pub user_agent: String,
    pub file: Option<IncomingFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub post: Post,
    pub thread: Thread,
    pub upload: Option<Upload>,
    /// Where the poster should be sent next.
    pub redirect: String,
}

/// Who is asking to change a post.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// The deletion password given when posting.
    Password(&'a str),
    Staff(&'a Staff),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReceipt {
    pub post_id: i64,
    pub thread_id: i64,
    pub thread_removed: bool,
    pub removed_posts: usize,
    pub removed_files: usize,
}

/// An IP ban, optionally marking the post that earned it.
#[derive(Debug, Clone)]
pub struct BanRequest {
    pub ban: NewIpBan,
    pub post_id: Option<i64>,
    /// Shown under the post, e.g. "USER WAS BANNED FOR THIS POST".
    pub banned_message: Option<String>,
}
