use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::ThumbnailSize;

/// Effective per-board posting and rendering rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPolicy {
    pub threads_per_page: usize,
    pub catalog_threads_per_page: usize,
    pub new_thread_cooldown: Duration,
    pub reply_cooldown: Duration,
    pub max_message_length: usize,
    pub replies_on_board_page: usize,
    pub sticky_replies_on_board_page: usize,
    pub new_threads_require_upload: bool,
    pub op_thumbnail: ThumbnailSize,
    pub reply_thumbnail: ThumbnailSize,
    pub catalog_thumbnail: ThumbnailSize,
    /// Lower-case extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for BoardPolicy {
    fn default() -> Self {
        Self {
            threads_per_page: 15,
            catalog_threads_per_page: 50,
            new_thread_cooldown: Duration::from_secs(30),
            reply_cooldown: Duration::from_secs(7),
            max_message_length: 8192,
            replies_on_board_page: 3,
            sticky_replies_on_board_page: 1,
            new_threads_require_upload: false,
            op_thumbnail: ThumbnailSize { width: 200, height: 200 },
            reply_thumbnail: ThumbnailSize { width: 125, height: 125 },
            catalog_thumbnail: ThumbnailSize { width: 50, height: 50 },
            allowed_extensions: ["gif", "jpg", "jpeg", "jfif", "png", "webp", "webm", "mp4"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl BoardPolicy {
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

/// Site-wide values consumed by the publication pipeline and page builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub document_root: PathBuf,
    pub web_root: String,
    pub site_name: String,
    /// Host expected in the Referer of browser submissions.
    pub site_host: String,
    pub check_referer: bool,
    pub max_recent_posts: usize,
    /// Unix permission bits applied to every generated file.
    pub file_mode: u32,
    pub owner_uid: Option<u32>,
    pub owner_gid: Option<u32>,
    /// Secret mixed into secure tripcodes.
    pub tripcode_secret: String,
    pub default_policy: BoardPolicy,
    /// Per-board overrides keyed by board dir.
    pub board_policies: HashMap<String, BoardPolicy>,
}

impl SiteSettings {
    pub fn policy_for(&self, board_dir: &str) -> &BoardPolicy {
        self.board_policies.get(board_dir).unwrap_or(&self.default_policy)
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("html"),
            web_root: "/".into(),
            site_name: "boardsmith".into(),
            site_host: "localhost".into(),
            check_referer: true,
            max_recent_posts: 12,
            file_mode: 0o644,
            owner_uid: None,
            owner_gid: None,
            tripcode_secret: String::new(),
            default_policy: BoardPolicy::default(),
            board_policies: HashMap::new(),
        }
    }
}
