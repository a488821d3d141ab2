//! Conversions from stored records to the typed page contexts.
//! Nothing here reads IPs or password hashes into a view.

use domains::{
    Board, BoardLink, CatalogThread, PostView, PostWithUploads, RecentPost, RecentPostView, SiteSettings,
    SiteView, Thread, ThreadOverview, ThreadView, ThumbnailKind, Upload, UploadView,
};

const EXCERPT_CHARS: usize = 120;

/// Joins the configured web root and a document-root-relative path.
pub fn web_path(web_root: &str, relative: &str) -> String {
    format!("{}/{}", web_root.trim_end_matches('/'), relative.trim_start_matches('/'))
}

pub fn site_view(settings: &SiteSettings, boards: &[Board]) -> SiteView {
    SiteView {
        site_name: settings.site_name.clone(),
        web_root: settings.web_root.clone(),
        boards: boards
            .iter()
            .map(|b| BoardLink { dir: b.dir.clone(), title: b.title.clone() })
            .collect(),
    }
}

pub fn upload_view(web_root: &str, board_dir: &str, upload: &Upload) -> UploadView {
    UploadView {
        original_filename: upload.original_filename.clone(),
        file_size: upload.file_size,
        width: upload.width,
        height: upload.height,
        thumbnail_width: upload.thumbnail_width,
        thumbnail_height: upload.thumbnail_height,
        is_spoilered: upload.is_spoilered,
        file_path: web_path(web_root, &upload.src_path(board_dir)),
        thumb_path: upload
            .thumbnail_path(board_dir, ThumbnailKind::Inline)
            .filter(|_| upload.has_thumbnail())
            .map(|p| web_path(web_root, &p)),
    }
}

pub fn post_view(web_root: &str, board_dir: &str, entry: &PostWithUploads) -> PostView {
    let post = &entry.post;
    PostView {
        id: post.id,
        thread_id: post.thread_id,
        is_top_post: post.is_top_post,
        name: post.name.clone(),
        tripcode: post.tripcode.clone(),
        email: post.email.clone(),
        subject: post.subject.clone(),
        message: post.message.clone(),
        created_on: post.created_on,
        last_modified: post.last_modified,
        banned_message: post.banned_message.clone(),
        link: web_path(
            web_root,
            &format!("{}/res/{}.html#{}", board_dir, post.top_post_id(), post.id),
        ),
        uploads: entry
            .uploads
            .iter()
            .map(|u| upload_view(web_root, board_dir, u))
            .collect(),
    }
}

/// A thread with `replies` shown out of `reply_count`, `image_count` of
/// which carry uploads.
pub fn thread_view(
    web_root: &str,
    board_dir: &str,
    thread: &Thread,
    op: &PostWithUploads,
    replies: &[PostWithUploads],
    reply_count: i64,
    image_count: i64,
) -> ThreadView {
    let shown_images: i64 = replies.iter().map(|r| r.uploads.len() as i64).sum();
    ThreadView {
        id: thread.id,
        locked: thread.locked,
        stickied: thread.stickied,
        anchored: thread.anchored,
        cyclical: thread.cyclical,
        op: post_view(web_root, board_dir, op),
        replies: replies.iter().map(|r| post_view(web_root, board_dir, r)).collect(),
        reply_count,
        image_count,
        omitted_posts: (reply_count - replies.len() as i64).max(0),
        omitted_images: (image_count - shown_images).max(0),
    }
}

pub fn catalog_thread(web_root: &str, board_dir: &str, overview: &ThreadOverview) -> CatalogThread {
    let op = &overview.top_post;
    CatalogThread {
        id: overview.thread.id,
        subject: op.post.subject.clone(),
        message: op.post.message.clone(),
        name: op.post.name.clone(),
        reply_count: overview.reply_count,
        image_count: overview.image_count,
        stickied: overview.thread.stickied,
        locked: overview.thread.locked,
        catalog_thumb: op
            .uploads
            .first()
            .filter(|u| u.has_thumbnail())
            .and_then(|u| u.thumbnail_path(board_dir, ThumbnailKind::Catalog))
            .map(|p| web_path(web_root, &p)),
        link: web_path(web_root, &format!("{}/res/{}.html", board_dir, overview.thread.id)),
    }
}

pub fn recent_post_view(web_root: &str, recent: &RecentPost) -> RecentPostView {
    let post = &recent.post;
    RecentPostView {
        board_dir: recent.board_dir.clone(),
        id: post.id,
        link: web_path(
            web_root,
            &format!("{}/res/{}.html#{}", recent.board_dir, post.top_post_id(), post.id),
        ),
        excerpt: excerpt(&post.message_raw),
        created_on: post.created_on,
        thumb_path: recent
            .thumbnail
            .as_ref()
            .filter(|u| u.has_thumbnail())
            .and_then(|u| u.thumbnail_path(&recent.board_dir, ThumbnailKind::Inline))
            .map(|p| web_path(web_root, &p)),
    }
}

fn excerpt(raw: &str) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_paths_join_cleanly() {
        assert_eq!(web_path("/", "b/res/1.html"), "/b/res/1.html");
        assert_eq!(web_path("/chan/", "b/src/2.png"), "/chan/b/src/2.png");
        assert_eq!(web_path("", "b/"), "/b/");
    }

    #[test]
    fn long_excerpts_are_cut() {
        let long = "word ".repeat(100);
        let cut = excerpt(&long);
        assert!(cut.ends_with('…'));
        assert!(cut.chars().count() <= EXCERPT_CHARS + 1);
        assert_eq!(excerpt("short\n\nmessage"), "short message");
    }
}
