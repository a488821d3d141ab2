use std::time::Duration;

use domains::{BoardPolicy, ThumbnailSize};
use serde::Deserialize;

/// Posting and page rules for a board, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub threads_per_page: usize,
    pub catalog_threads_per_page: usize,
    /// Seconds between two new threads from one IP.
    pub new_thread_cooldown: u64,
    /// Seconds between two posts from one IP.
    pub reply_cooldown: u64,
    pub max_message_length: usize,
    pub replies_on_board_page: usize,
    pub sticky_replies_on_board_page: usize,
    pub new_threads_require_upload: bool,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub reply_thumb_width: u32,
    pub reply_thumb_height: u32,
    pub catalog_thumb_width: u32,
    pub catalog_thumb_height: u32,
    pub allowed_extensions: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::from(&BoardPolicy::default())
    }
}

impl From<&BoardPolicy> for BoardConfig {
    fn from(policy: &BoardPolicy) -> Self {
        Self {
            threads_per_page: policy.threads_per_page,
            catalog_threads_per_page: policy.catalog_threads_per_page,
            new_thread_cooldown: policy.new_thread_cooldown.as_secs(),
            reply_cooldown: policy.reply_cooldown.as_secs(),
            max_message_length: policy.max_message_length,
            replies_on_board_page: policy.replies_on_board_page,
            sticky_replies_on_board_page: policy.sticky_replies_on_board_page,
            new_threads_require_upload: policy.new_threads_require_upload,
            thumb_width: policy.op_thumbnail.width,
            thumb_height: policy.op_thumbnail.height,
            reply_thumb_width: policy.reply_thumbnail.width,
            reply_thumb_height: policy.reply_thumbnail.height,
            catalog_thumb_width: policy.catalog_thumbnail.width,
            catalog_thumb_height: policy.catalog_thumbnail.height,
            allowed_extensions: policy.allowed_extensions.clone(),
        }
    }
}

impl BoardConfig {
    pub fn to_policy(&self) -> BoardPolicy {
        BoardPolicy {
            threads_per_page: self.threads_per_page,
            catalog_threads_per_page: self.catalog_threads_per_page,
            new_thread_cooldown: Duration::from_secs(self.new_thread_cooldown),
            reply_cooldown: Duration::from_secs(self.reply_cooldown),
            max_message_length: self.max_message_length,
            replies_on_board_page: self.replies_on_board_page,
            sticky_replies_on_board_page: self.sticky_replies_on_board_page,
            new_threads_require_upload: self.new_threads_require_upload,
            op_thumbnail: ThumbnailSize { width: self.thumb_width, height: self.thumb_height },
            reply_thumbnail: ThumbnailSize { width: self.reply_thumb_width, height: self.reply_thumb_height },
            catalog_thumbnail: ThumbnailSize { width: self.catalog_thumb_width, height: self.catalog_thumb_height },
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// These defaults with `over`'s fields laid on top.
    pub fn merged(&self, over: &BoardOverride) -> BoardConfig {
        let mut merged = self.clone();
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &over.$field { merged.$field = value.clone(); })*
            };
        }
        take!(
            threads_per_page,
            catalog_threads_per_page,
            new_thread_cooldown,
            reply_cooldown,
            max_message_length,
            replies_on_board_page,
            sticky_replies_on_board_page,
            new_threads_require_upload,
            thumb_width,
            thumb_height,
            reply_thumb_width,
            reply_thumb_height,
            catalog_thumb_width,
            catalog_thumb_height,
            allowed_extensions,
        );
        merged
    }

    /// Current value of a field by its config name, formatted for display.
    pub fn value_of(&self, name: &str) -> Option<String> {
        let value = match name {
            "threads_per_page" => self.threads_per_page.to_string(),
            "catalog_threads_per_page" => self.catalog_threads_per_page.to_string(),
            "new_thread_cooldown" => self.new_thread_cooldown.to_string(),
            "reply_cooldown" => self.reply_cooldown.to_string(),
            "max_message_length" => self.max_message_length.to_string(),
            "replies_on_board_page" => self.replies_on_board_page.to_string(),
            "sticky_replies_on_board_page" => self.sticky_replies_on_board_page.to_string(),
            "new_threads_require_upload" => self.new_threads_require_upload.to_string(),
            "thumb_width" => self.thumb_width.to_string(),
            "thumb_height" => self.thumb_height.to_string(),
            "reply_thumb_width" => self.reply_thumb_width.to_string(),
            "reply_thumb_height" => self.reply_thumb_height.to_string(),
            "catalog_thumb_width" => self.catalog_thumb_width.to_string(),
            "catalog_thumb_height" => self.catalog_thumb_height.to_string(),
            "allowed_extensions" => self.allowed_extensions.join(","),
            _ => return None,
        };
        Some(value)
    }
}

/// Per-board settings that differ from `board_defaults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoardOverride {
    pub threads_per_page: Option<usize>,
    pub catalog_threads_per_page: Option<usize>,
    pub new_thread_cooldown: Option<u64>,
    pub reply_cooldown: Option<u64>,
    pub max_message_length: Option<usize>,
    pub replies_on_board_page: Option<usize>,
    pub sticky_replies_on_board_page: Option<usize>,
    pub new_threads_require_upload: Option<bool>,
    pub thumb_width: Option<u32>,
    pub thumb_height: Option<u32>,
    pub reply_thumb_width: Option<u32>,
    pub reply_thumb_height: Option<u32>,
    pub catalog_thumb_width: Option<u32>,
    pub catalog_thumb_height: Option<u32>,
    pub allowed_extensions: Option<Vec<String>>,
}
