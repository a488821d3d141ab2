//! Typed contexts handed to the template renderer, one per artifact kind.
//! They never carry IPs or password hashes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::Board;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardLink {
    pub dir: String,
    pub title: String,
}

/// Navigation and branding shared by every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteView {
    pub site_name: String,
    pub web_root: String,
    pub boards: Vec<BoardLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadView {
    pub original_filename: String,
    pub file_size: i64,
    pub width: i64,
    pub height: i64,
    pub thumbnail_width: i64,
    pub thumbnail_height: i64,
    pub is_spoilered: bool,
    /// Web path of the stored file.
    pub file_path: String,
    /// Web path of the inline thumbnail, when one exists.
    pub thumb_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub thread_id: i64,
    pub is_top_post: bool,
    pub name: String,
    pub tripcode: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_on: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub banned_message: Option<String>,
    pub link: String,
    pub uploads: Vec<UploadView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadView {
    pub id: i64,
    pub locked: bool,
    pub stickied: bool,
    pub anchored: bool,
    pub cyclical: bool,
    pub op: PostView,
    pub replies: Vec<PostView>,
    pub reply_count: i64,
    pub image_count: i64,
    /// Replies in the thread but not shown on the board page
    pub omitted_posts: i64,
    /// Reply uploads in the thread but not shown on the board page
    pub omitted_images: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardPageContext {
    pub site: SiteView,
    pub board: Board,
    pub page: usize,
    pub num_pages: usize,
    pub threads: Vec<ThreadView>,
}

impl BoardPageContext {
    /// Page numbers for the pager, 1-based.
    pub fn page_numbers(&self) -> Vec<usize> {
        (1..=self.num_pages.max(1)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogThread {
    pub id: i64,
    pub subject: String,
    pub message: String,
    pub name: String,
    #[serde(rename = "replies")]
    pub reply_count: i64,
    #[serde(rename = "images")]
    pub image_count: i64,
    #[serde(rename = "sticky")]
    pub stickied: bool,
    #[serde(rename = "closed")]
    pub locked: bool,
    pub catalog_thumb: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    #[serde(rename = "page")]
    pub number: usize,
    pub threads: Vec<CatalogThread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogContext {
    pub site: SiteView,
    pub board: Board,
    pub pages: Vec<CatalogPage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadPageContext {
    pub site: SiteView,
    pub board: Board,
    pub thread: ThreadView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPostView {
    pub board_dir: String,
    pub id: i64,
    pub link: String,
    pub excerpt: String,
    pub created_on: DateTime<Utc>,
    pub thumb_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontPageContext {
    pub site: SiteView,
    pub recent_posts: Vec<RecentPostView>,
}

/// Everything the page builder can ask the renderer for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageContext {
    BoardPage(BoardPageContext),
    Catalog(CatalogContext),
    Thread(ThreadPageContext),
    Front(FrontPageContext),
}

impl PageContext {
    /// Template name used in logs and build errors.
    pub fn template_name(&self) -> &'static str {
        match self {
            PageContext::BoardPage(_) => "board_page",
            PageContext::Catalog(_) => "catalog",
            PageContext::Thread(_) => "thread",
            PageContext::Front(_) => "front",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
