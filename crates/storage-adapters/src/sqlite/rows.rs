//! Row → domain model mapping.

use domains::{Appeal, Board, IpBan, PatternBan, Post, Report, Thread, Upload, WordFilter};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub(crate) const BOARD_COLUMNS: &str =
    "id, dir, title, subtitle, description, max_message_length, created_on";

pub(crate) const THREAD_COLUMNS: &str =
    "t.id, t.board_id, t.locked, t.stickied, t.anchored, t.cyclical, t.last_bump, t.created_on";

pub(crate) const POST_COLUMNS: &str = "p.id, p.thread_id, p.is_top_post, p.ip, p.name, p.tripcode, \
     p.email, p.subject, p.message_raw, p.message, p.password, p.created_on, p.last_modified, \
     p.banned_message";

pub(crate) const UPLOAD_COLUMNS: &str = "u.id, u.post_id, u.file_order, u.original_filename, \
     u.filename, u.checksum, u.file_size, u.is_spoilered, u.thumbnail_width, u.thumbnail_height, \
     u.width, u.height";

pub(crate) fn board(row: &SqliteRow) -> sqlx::Result<Board> {
    Ok(Board {
        id: row.try_get("id")?,
        dir: row.try_get("dir")?,
        title: row.try_get("title")?,
        subtitle: row.try_get("subtitle")?,
        description: row.try_get("description")?,
        max_message_length: row.try_get("max_message_length")?,
        created_on: row.try_get("created_on")?,
    })
}

pub(crate) fn thread(row: &SqliteRow) -> sqlx::Result<Thread> {
    Ok(Thread {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        locked: row.try_get("locked")?,
        stickied: row.try_get("stickied")?,
        anchored: row.try_get("anchored")?,
        cyclical: row.try_get("cyclical")?,
        last_bump: row.try_get("last_bump")?,
        created_on: row.try_get("created_on")?,
    })
}

pub(crate) fn post(row: &SqliteRow) -> sqlx::Result<Post> {
    let id: i64 = row.try_get("id")?;
    let is_top_post: bool = row.try_get("is_top_post")?;
    let thread_id = row.try_get::<Option<i64>, _>("thread_id")?.unwrap_or(id);
    Ok(Post {
        id,
        thread_id,
        parent_id: (!is_top_post).then_some(thread_id),
        is_top_post,
        ip: row.try_get("ip")?,
        name: row.try_get("name")?,
        tripcode: row.try_get("tripcode")?,
        email: row.try_get("email")?,
        subject: row.try_get("subject")?,
        message_raw: row.try_get("message_raw")?,
        message: row.try_get("message")?,
        password: row.try_get("password")?,
        created_on: row.try_get("created_on")?,
        last_modified: row.try_get("last_modified")?,
        banned_message: row.try_get("banned_message")?,
    })
}

pub(crate) fn upload(row: &SqliteRow) -> sqlx::Result<Upload> {
    Ok(Upload {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        file_order: row.try_get("file_order")?,
        original_filename: row.try_get("original_filename")?,
        filename: row.try_get("filename")?,
        checksum: row.try_get("checksum")?,
        file_size: row.try_get("file_size")?,
        is_spoilered: row.try_get("is_spoilered")?,
        thumbnail_width: row.try_get("thumbnail_width")?,
        thumbnail_height: row.try_get("thumbnail_height")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
    })
}

pub(crate) fn ip_ban(row: &SqliteRow) -> sqlx::Result<IpBan> {
    Ok(IpBan {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        staff_id: row.try_get("staff_id")?,
        ip: row.try_get("ip")?,
        is_active: row.try_get("is_active")?,
        created_on: row.try_get("created_on")?,
        expires_at: row.try_get("expires_at")?,
        appeal_at: row.try_get("appeal_at")?,
        permanent: row.try_get("permanent")?,
        can_appeal: row.try_get("can_appeal")?,
        message: row.try_get("message")?,
        staff_note: row.try_get("staff_note")?,
        deactivated_by: row.try_get("deactivated_by")?,
    })
}

pub(crate) fn pattern_ban(row: &SqliteRow) -> sqlx::Result<PatternBan> {
    Ok(PatternBan {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        staff_id: row.try_get("staff_id")?,
        pattern: row.try_get("pattern")?,
        is_regex: row.try_get("is_regex")?,
        is_active: row.try_get("is_active")?,
        staff_note: row.try_get("staff_note")?,
        created_on: row.try_get("created_on")?,
    })
}

pub(crate) fn appeal(row: &SqliteRow) -> sqlx::Result<Appeal> {
    Ok(Appeal {
        id: row.try_get("id")?,
        ban_id: row.try_get("ban_id")?,
        message: row.try_get("message")?,
        created_on: row.try_get("created_on")?,
        approved_by: row.try_get("approved_by")?,
        approved_on: row.try_get("approved_on")?,
    })
}

pub(crate) fn report(row: &SqliteRow) -> sqlx::Result<Report> {
    Ok(Report {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        ip: row.try_get("ip")?,
        reason: row.try_get("reason")?,
        created_on: row.try_get("created_on")?,
        handled_by_staff_id: row.try_get("handled_by_staff_id")?,
        is_cleared: row.try_get("is_cleared")?,
        blocks_further: row.try_get("blocks_further")?,
    })
}

pub(crate) fn word_filter(row: &SqliteRow) -> sqlx::Result<WordFilter> {
    Ok(WordFilter {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        staff_id: row.try_get("staff_id")?,
        search: row.try_get("search")?,
        is_regex: row.try_get("is_regex")?,
        change_to: row.try_get("change_to")?,
        is_active: row.try_get("is_active")?,
        staff_note: row.try_get("staff_note")?,
    })
}

/// Maps every row, stopping at the first decode failure.
pub(crate) fn all<T>(rows: &[SqliteRow], map: fn(&SqliteRow) -> sqlx::Result<T>) -> sqlx::Result<Vec<T>> {
    rows.iter().map(map).collect()
}
