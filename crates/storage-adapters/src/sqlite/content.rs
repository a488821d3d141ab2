use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Board, ContentStore, DeletedPost, DomainError, InsertedPost, NewBoard, NewPost, Post, PostEdit,
    PostWithUploads, RecentPost, Result, Thread, ThreadAttribute, ThreadOverview, Upload,
};
use sqlx::{Row, SqliteConnection};

use super::rows::{self, BOARD_COLUMNS, POST_COLUMNS, THREAD_COLUMNS, UPLOAD_COLUMNS};
use super::{storage_err, SqliteStore};

async fn fetch_thread(conn: &mut SqliteConnection, id: i64) -> Result<Thread> {
    let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads t WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| DomainError::not_found("thread", id))?;
    rows::thread(&row).map_err(storage_err)
}

async fn fetch_post(conn: &mut SqliteConnection, id: i64) -> Result<Post> {
    let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| DomainError::not_found("post", id))?;
    rows::post(&row).map_err(storage_err)
}

async fn uploads_of_post(conn: &mut SqliteConnection, post_id: i64) -> Result<Vec<Upload>> {
    let found = sqlx::query(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads u WHERE u.post_id = ? ORDER BY u.file_order"
    ))
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_err)?;
    rows::all(&found, rows::upload).map_err(storage_err)
}

/// Uploads of every post in the thread whose id is at least `from_post`.
async fn uploads_of_thread(conn: &mut SqliteConnection, thread_id: i64, from_post: i64) -> Result<Vec<Upload>> {
    let found = sqlx::query(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads u JOIN posts p ON p.id = u.post_id \
         WHERE p.thread_id = ? AND u.post_id >= ? ORDER BY u.post_id, u.file_order"
    ))
    .bind(thread_id)
    .bind(from_post)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_err)?;
    rows::all(&found, rows::upload).map_err(storage_err)
}

/// Attaches `upload` at the next free position of the post.
async fn insert_upload(conn: &mut SqliteConnection, post_id: i64, mut upload: Upload) -> Result<Upload> {
    if upload.is_attached() {
        return Err(DomainError::AlreadyAttached);
    }
    let file_order: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(file_order) + 1, 0) FROM uploads WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(storage_err)?;

    let result = sqlx::query(
        "INSERT INTO uploads (post_id, file_order, original_filename, filename, checksum, file_size, \
         is_spoilered, thumbnail_width, thumbnail_height, width, height) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(file_order)
    .bind(&upload.original_filename)
    .bind(&upload.filename)
    .bind(&upload.checksum)
    .bind(upload.file_size)
    .bind(upload.is_spoilered)
    .bind(upload.thumbnail_width)
    .bind(upload.thumbnail_height)
    .bind(upload.width)
    .bind(upload.height)
    .execute(&mut *conn)
    .await
    .map_err(storage_err)?;

    upload.id = result.last_insert_rowid();
    upload.post_id = post_id;
    upload.file_order = file_order;
    Ok(upload)
}

async fn insert_post_row(conn: &mut SqliteConnection, post: &NewPost, thread_id: Option<i64>) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO posts (thread_id, is_top_post, ip, name, tripcode, email, subject, message_raw, \
         message, password, created_on, last_modified) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(thread_id)
    .bind(thread_id.is_none())
    .bind(&post.ip)
    .bind(&post.name)
    .bind(&post.tripcode)
    .bind(&post.email)
    .bind(&post.subject)
    .bind(&post.message_raw)
    .bind(&post.message)
    .bind(&post.password)
    .bind(post.created_on)
    .bind(post.created_on)
    .execute(&mut *conn)
    .await
    .map_err(storage_err)?;
    Ok(result.last_insert_rowid())
}

/// Pairs posts with their uploads, keeping the order of `posts`.
fn with_uploads(posts: Vec<Post>, uploads: Vec<Upload>) -> Vec<PostWithUploads> {
    let mut by_post: HashMap<i64, Vec<Upload>> = HashMap::new();
    for upload in uploads {
        by_post.entry(upload.post_id).or_default().push(upload);
    }
    posts
        .into_iter()
        .map(|post| PostWithUploads {
            uploads: by_post.remove(&post.id).unwrap_or_default(),
            post,
        })
        .collect()
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn create_board(&self, board: NewBoard) -> Result<Board> {
        let result = sqlx::query(
            "INSERT INTO boards (dir, title, subtitle, description, max_message_length, created_on) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&board.dir)
        .bind(&board.title)
        .bind(&board.subtitle)
        .bind(&board.description)
        .bind(board.max_message_length)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match storage_err(e) {
            DomainError::Conflict(_) => DomainError::Conflict(format!("Board /{}/ already exists", board.dir)),
            other => other,
        })?;
        self.board_by_id(result.last_insert_rowid()).await
    }

    async fn board_by_id(&self, id: i64) -> Result<Board> {
        let row = sqlx::query(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| DomainError::not_found("board", id))?;
        rows::board(&row).map_err(storage_err)
    }

    async fn board_by_dir(&self, dir: &str) -> Result<Board> {
        let row = sqlx::query(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE dir = ?"))
            .bind(dir)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| DomainError::not_found("board", dir))?;
        rows::board(&row).map_err(storage_err)
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        let found = sqlx::query(&format!("SELECT {BOARD_COLUMNS} FROM boards ORDER BY dir"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows::all(&found, rows::board).map_err(storage_err)
    }

    async fn insert_post(&self, post: NewPost, upload: Option<Upload>) -> Result<InsertedPost> {
        if upload.as_ref().is_some_and(Upload::is_attached) {
            return Err(DomainError::AlreadyAttached);
        }

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let post_id = match post.thread_id {
            Some(thread_id) => {
                let thread = fetch_thread(&mut tx, thread_id).await?;
                if thread.board_id != post.board_id {
                    return Err(DomainError::not_found("thread", thread_id));
                }
                if thread.locked {
                    return Err(DomainError::Conflict("Thread is locked".into()));
                }
                let id = insert_post_row(&mut tx, &post, Some(thread_id)).await?;
                if post.bump && !thread.anchored {
                    sqlx::query("UPDATE threads SET last_bump = ? WHERE id = ?")
                        .bind(post.created_on)
                        .bind(thread_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage_err)?;
                }
                id
            }
            None => {
                let board_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM boards WHERE id = ?")
                    .bind(post.board_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage_err)?;
                if board_exists.is_none() {
                    return Err(DomainError::not_found("board", post.board_id));
                }

                // The top post's id becomes the thread id.
                let id = insert_post_row(&mut tx, &post, None).await?;
                sqlx::query("INSERT INTO threads (id, board_id, last_bump, created_on) VALUES (?, ?, ?, ?)")
                    .bind(id)
                    .bind(post.board_id)
                    .bind(post.created_on)
                    .bind(post.created_on)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_err)?;
                sqlx::query("UPDATE posts SET thread_id = ? WHERE id = ?")
                    .bind(id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_err)?;
                id
            }
        };

        let upload = match upload {
            Some(upload) => Some(insert_upload(&mut tx, post_id, upload).await?),
            None => None,
        };
        let inserted = fetch_post(&mut tx, post_id).await?;
        let thread = fetch_thread(&mut tx, inserted.thread_id).await?;

        tx.commit().await.map_err(storage_err)?;
        Ok(InsertedPost { post: inserted, thread, upload })
    }

    async fn attach_file(&self, post_id: i64, upload: Upload) -> Result<Upload> {
        if upload.is_attached() {
            return Err(DomainError::AlreadyAttached);
        }
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        fetch_post(&mut tx, post_id).await?;
        let attached = insert_upload(&mut tx, post_id, upload).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(attached)
    }

    async fn post_by_id(&self, id: i64) -> Result<Post> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;
        fetch_post(&mut conn, id).await
    }

    async fn update_post(&self, id: i64, edit: PostEdit) -> Result<Post> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query("UPDATE posts SET message_raw = ?, message = ?, last_modified = ? WHERE id = ?")
            .bind(&edit.message_raw)
            .bind(&edit.message)
            .bind(edit.modified_on)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("post", id));
        }
        let post = fetch_post(&mut tx, id).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(post)
    }

    async fn set_banned_message(&self, id: i64, message: &str) -> Result<Post> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query("UPDATE posts SET banned_message = ? WHERE id = ?")
            .bind(message)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("post", id));
        }
        let post = fetch_post(&mut tx, id).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<DeletedPost> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let post = fetch_post(&mut tx, id).await?;
        let thread = fetch_thread(&mut tx, post.thread_id).await?;

        let deleted = if post.is_top_post {
            let removed_post_ids: Vec<i64> =
                sqlx::query_scalar("SELECT id FROM posts WHERE thread_id = ? ORDER BY id")
                    .bind(thread.id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(storage_err)?;
            let removed_uploads = uploads_of_thread(&mut tx, thread.id, 0).await?;
            // Replies, uploads and reports follow through ON DELETE CASCADE.
            sqlx::query("DELETE FROM threads WHERE id = ?")
                .bind(thread.id)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            DeletedPost {
                post,
                board_id: thread.board_id,
                thread_removed: true,
                removed_post_ids,
                removed_uploads,
            }
        } else {
            let removed_uploads = uploads_of_post(&mut tx, id).await?;
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            DeletedPost {
                post,
                board_id: thread.board_id,
                thread_removed: false,
                removed_post_ids: vec![id],
                removed_uploads,
            }
        };

        tx.commit().await.map_err(storage_err)?;
        Ok(deleted)
    }

    async fn delete_post_uploads(&self, id: i64) -> Result<Vec<Upload>> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        fetch_post(&mut tx, id).await?;
        let removed = uploads_of_post(&mut tx, id).await?;
        sqlx::query("DELETE FROM uploads WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(removed)
    }

    async fn thread_by_id(&self, id: i64) -> Result<Thread> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;
        fetch_thread(&mut conn, id).await
    }

    async fn set_thread_attribute(&self, id: i64, attribute: ThreadAttribute, value: bool) -> Result<Thread> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query(&format!("UPDATE threads SET {} = ? WHERE id = ?", attribute.column()))
            .bind(value)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("thread", id));
        }
        let thread = fetch_thread(&mut tx, id).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(thread)
    }

    async fn last_thread_by_ip(&self, ip: &str) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar(
            "SELECT t.created_on FROM threads t JOIN posts p ON p.id = t.id \
             WHERE p.ip = ? ORDER BY t.id DESC LIMIT 1",
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)
    }

    async fn last_post_by_ip(&self, ip: &str) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar("SELECT created_on FROM posts WHERE ip = ? ORDER BY id DESC LIMIT 1")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)
    }

    async fn board_threads(&self, board_id: i64) -> Result<Vec<ThreadOverview>> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;

        let thread_rows = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS}, \
             (SELECT COUNT(*) FROM posts r WHERE r.thread_id = t.id AND r.is_top_post = 0) AS reply_count, \
             (SELECT COUNT(*) FROM uploads u JOIN posts r ON r.id = u.post_id \
                WHERE r.thread_id = t.id AND r.is_top_post = 0) AS image_count \
             FROM threads t WHERE t.board_id = ? \
             ORDER BY t.stickied DESC, t.last_bump DESC, t.id DESC"
        ))
        .bind(board_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;

        let top_rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN threads t ON t.id = p.thread_id \
             WHERE t.board_id = ? AND p.is_top_post = 1"
        ))
        .bind(board_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;

        let upload_rows = sqlx::query(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads u JOIN posts p ON p.id = u.post_id \
             JOIN threads t ON t.id = p.thread_id \
             WHERE t.board_id = ? AND p.is_top_post = 1 ORDER BY u.post_id, u.file_order"
        ))
        .bind(board_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;

        let top_posts = rows::all(&top_rows, rows::post).map_err(storage_err)?;
        let uploads = rows::all(&upload_rows, rows::upload).map_err(storage_err)?;
        let mut tops: HashMap<i64, PostWithUploads> = with_uploads(top_posts, uploads)
            .into_iter()
            .map(|p| (p.post.id, p))
            .collect();

        let mut overviews = Vec::with_capacity(thread_rows.len());
        for row in &thread_rows {
            let thread = rows::thread(row).map_err(storage_err)?;
            let Some(top_post) = tops.remove(&thread.id) else {
                tracing::warn!(thread_id = thread.id, "thread has no top post, skipping");
                continue;
            };
            overviews.push(ThreadOverview {
                reply_count: row.try_get("reply_count").map_err(storage_err)?,
                image_count: row.try_get("image_count").map_err(storage_err)?,
                thread,
                top_post,
            });
        }
        Ok(overviews)
    }

    async fn thread_posts(&self, thread_id: i64) -> Result<Vec<PostWithUploads>> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;
        fetch_thread(&mut conn, thread_id).await?;

        let found = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = ? ORDER BY p.id"
        ))
        .bind(thread_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;
        let posts = rows::all(&found, rows::post).map_err(storage_err)?;
        let uploads = uploads_of_thread(&mut conn, thread_id, 0).await?;
        Ok(with_uploads(posts, uploads))
    }

    async fn latest_replies(&self, thread_id: i64, limit: usize) -> Result<Vec<PostWithUploads>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;

        let found = sqlx::query(&format!(
            "SELECT * FROM (SELECT {POST_COLUMNS} FROM posts p \
               WHERE p.thread_id = ? AND p.is_top_post = 0 ORDER BY p.id DESC LIMIT ?) \
             ORDER BY id"
        ))
        .bind(thread_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;
        let posts = rows::all(&found, rows::post).map_err(storage_err)?;

        let Some(oldest) = posts.first().map(|p| p.id) else {
            return Ok(Vec::new());
        };
        let uploads = uploads_of_thread(&mut conn, thread_id, oldest).await?;
        Ok(with_uploads(posts, uploads))
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<RecentPost>> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;

        let found = sqlx::query(&format!(
            "SELECT {POST_COLUMNS}, b.dir AS board_dir FROM posts p \
             JOIN threads t ON t.id = p.thread_id JOIN boards b ON b.id = t.board_id \
             ORDER BY p.id DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_err)?;

        let mut recent = Vec::with_capacity(found.len());
        for row in &found {
            let post = rows::post(row).map_err(storage_err)?;
            let board_dir: String = row.try_get("board_dir").map_err(storage_err)?;
            let thumbnail = uploads_of_post(&mut conn, post.id).await?.into_iter().next();
            recent.push(RecentPost { board_dir, post, thumbnail });
        }
        Ok(recent)
    }
}
