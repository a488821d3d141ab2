use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Appeal, DomainError, IpBan, ModerationStore, NewIpBan, NewPatternBan, NewWordFilter, PatternBan,
    PatternTarget, Report, Result, WordFilter,
};
use sqlx::SqliteConnection;

use super::rows;
use super::{storage_err, SqliteStore};

const IP_BAN_COLUMNS: &str = "id, board_id, staff_id, ip, is_active, created_on, expires_at, \
     appeal_at, permanent, can_appeal, message, staff_note, deactivated_by";
const PATTERN_COLUMNS: &str = "id, board_id, staff_id, pattern, is_regex, is_active, staff_note, created_on";
const APPEAL_COLUMNS: &str = "id, ban_id, message, created_on, approved_by, approved_on";
const REPORT_COLUMNS: &str =
    "id, post_id, ip, reason, created_on, handled_by_staff_id, is_cleared, blocks_further";
const WORD_FILTER_COLUMNS: &str = "id, board_id, staff_id, search, is_regex, change_to, is_active, staff_note";

async fn fetch_ip_ban(conn: &mut SqliteConnection, id: i64) -> Result<IpBan> {
    let row = sqlx::query(&format!("SELECT {IP_BAN_COLUMNS} FROM ip_bans WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| DomainError::not_found("ban", id))?;
    rows::ip_ban(&row).map_err(storage_err)
}

async fn fetch_appeal(conn: &mut SqliteConnection, id: i64) -> Result<Appeal> {
    let row = sqlx::query(&format!("SELECT {APPEAL_COLUMNS} FROM ip_ban_appeals WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| DomainError::not_found("appeal", id))?;
    rows::appeal(&row).map_err(storage_err)
}

#[async_trait]
impl ModerationStore for SqliteStore {
    async fn create_ip_ban(&self, ban: NewIpBan, staff_id: i64, created_on: DateTime<Utc>) -> Result<IpBan> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query(
            "INSERT INTO ip_bans (board_id, staff_id, ip, is_active, created_on, expires_at, appeal_at, \
             permanent, can_appeal, message, staff_note) VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ban.board_id)
        .bind(staff_id)
        .bind(&ban.ip)
        .bind(created_on)
        .bind(ban.expires_at)
        .bind(ban.appeal_at)
        .bind(ban.permanent)
        .bind(ban.can_appeal)
        .bind(&ban.message)
        .bind(&ban.staff_note)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        let created = fetch_ip_ban(&mut tx, result.last_insert_rowid()).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(created)
    }

    async fn ip_ban_by_id(&self, id: i64) -> Result<IpBan> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;
        fetch_ip_ban(&mut conn, id).await
    }

    async fn active_ip_bans(&self, board_id: i64) -> Result<Vec<IpBan>> {
        let found = sqlx::query(&format!(
            "SELECT {IP_BAN_COLUMNS} FROM ip_bans \
             WHERE is_active = 1 AND (board_id IS NULL OR board_id = ?) ORDER BY id"
        ))
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows::all(&found, rows::ip_ban).map_err(storage_err)
    }

    async fn list_ip_bans(&self, board_id: Option<i64>, limit: i64) -> Result<Vec<IpBan>> {
        let found = match board_id {
            Some(board_id) => sqlx::query(&format!(
                "SELECT {IP_BAN_COLUMNS} FROM ip_bans WHERE board_id = ? ORDER BY id DESC LIMIT ?"
            ))
            .bind(board_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(&format!("SELECT {IP_BAN_COLUMNS} FROM ip_bans ORDER BY id DESC LIMIT ?"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(storage_err)?;
        rows::all(&found, rows::ip_ban).map_err(storage_err)
    }

    async fn deactivate_ip_ban(&self, id: i64, staff_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        fetch_ip_ban(&mut tx, id).await?;
        let result = sqlx::query("UPDATE ip_bans SET is_active = 0, deactivated_by = ? WHERE id = ? AND is_active = 1")
            .bind(staff_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_pattern_ban(&self, ban: NewPatternBan, staff_id: i64, created_on: DateTime<Utc>) -> Result<PatternBan> {
        let table = ban.target.table();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (board_id, staff_id, pattern, is_regex, is_active, staff_note, created_on) \
             VALUES (?, ?, ?, ?, 1, ?, ?)"
        ))
        .bind(ban.board_id)
        .bind(staff_id)
        .bind(&ban.pattern)
        .bind(ban.is_regex)
        .bind(&ban.staff_note)
        .bind(created_on)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        let row = sqlx::query(&format!("SELECT {PATTERN_COLUMNS} FROM {table} WHERE id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        let created = rows::pattern_ban(&row).map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(created)
    }

    async fn active_pattern_bans(&self, target: PatternTarget, board_id: i64) -> Result<Vec<PatternBan>> {
        let found = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM {} \
             WHERE is_active = 1 AND (board_id IS NULL OR board_id = ?) ORDER BY id",
            target.table()
        ))
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows::all(&found, rows::pattern_ban).map_err(storage_err)
    }

    async fn deactivate_pattern_ban(&self, target: PatternTarget, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET is_active = 0 WHERE id = ? AND is_active = 1",
            target.table()
        ))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_appeal(&self, ban_id: i64, message: &str, created_on: DateTime<Utc>) -> Result<Appeal> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        fetch_ip_ban(&mut tx, ban_id).await?;
        let result = sqlx::query("INSERT INTO ip_ban_appeals (ban_id, message, created_on) VALUES (?, ?, ?)")
            .bind(ban_id)
            .bind(message)
            .bind(created_on)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        let appeal = fetch_appeal(&mut tx, result.last_insert_rowid()).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(appeal)
    }

    async fn appeal_by_id(&self, id: i64) -> Result<Appeal> {
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;
        fetch_appeal(&mut conn, id).await
    }

    async fn list_appeals(&self, ban_id: Option<i64>, limit: i64) -> Result<Vec<Appeal>> {
        let found = match ban_id {
            Some(ban_id) => sqlx::query(&format!(
                "SELECT {APPEAL_COLUMNS} FROM ip_ban_appeals WHERE ban_id = ? ORDER BY id DESC LIMIT ?"
            ))
            .bind(ban_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(&format!(
                "SELECT {APPEAL_COLUMNS} FROM ip_ban_appeals ORDER BY id DESC LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(storage_err)?;
        rows::all(&found, rows::appeal).map_err(storage_err)
    }

    async fn approve_appeal(&self, id: i64, staff_id: i64, approved_on: DateTime<Utc>) -> Result<Appeal> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let appeal = fetch_appeal(&mut tx, id).await?;
        let updated = sqlx::query(
            "UPDATE ip_ban_appeals SET approved_by = ?, approved_on = ? WHERE id = ? AND approved_by IS NULL",
        )
        .bind(staff_id)
        .bind(approved_on)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        // a concurrent approval got there first
        if updated.rows_affected() == 0 {
            return Err(DomainError::Conflict(format!("appeal {id} is already approved")));
        }
        sqlx::query("UPDATE ip_bans SET is_active = 0, deactivated_by = ? WHERE id = ?")
            .bind(staff_id)
            .bind(appeal.ban_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        let approved = fetch_appeal(&mut tx, id).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(approved)
    }

    async fn create_report(&self, post_id: i64, ip: &str, reason: &str, created_on: DateTime<Utc>) -> Result<Report> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let post_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?;
        if post_exists.is_none() {
            return Err(DomainError::not_found("post", post_id));
        }
        let result = sqlx::query("INSERT INTO reports (post_id, ip, reason, created_on) VALUES (?, ?, ?, ?)")
            .bind(post_id)
            .bind(ip)
            .bind(reason)
            .bind(created_on)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        let row = sqlx::query(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        let report = rows::report(&row).map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(report)
    }

    async fn report_by_id(&self, id: i64) -> Result<Report> {
        let row = sqlx::query(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| DomainError::not_found("report", id))?;
        rows::report(&row).map_err(storage_err)
    }

    async fn reports_blocked(&self, post_id: i64) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reports WHERE post_id = ? AND blocks_further = 1)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)
    }

    async fn open_reports(&self) -> Result<Vec<Report>> {
        let found = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE is_cleared = 0 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows::all(&found, rows::report).map_err(storage_err)
    }

    async fn clear_report(&self, id: i64, staff_id: i64, block: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reports SET is_cleared = 1, handled_by_staff_id = ?, blocks_further = ? \
             WHERE id = ? AND is_cleared = 0",
        )
        .bind(staff_id)
        .bind(block)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_word_filter(&self, filter: NewWordFilter, staff_id: i64) -> Result<WordFilter> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = sqlx::query(
            "INSERT INTO word_filters (board_id, staff_id, search, is_regex, change_to, is_active, staff_note) \
             VALUES (?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(filter.board_id)
        .bind(staff_id)
        .bind(&filter.search)
        .bind(filter.is_regex)
        .bind(&filter.change_to)
        .bind(&filter.staff_note)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        let row = sqlx::query(&format!("SELECT {WORD_FILTER_COLUMNS} FROM word_filters WHERE id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        let created = rows::word_filter(&row).map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(created)
    }

    async fn active_word_filters(&self, board_id: i64) -> Result<Vec<WordFilter>> {
        let found = sqlx::query(&format!(
            "SELECT {WORD_FILTER_COLUMNS} FROM word_filters \
             WHERE is_active = 1 AND (board_id IS NULL OR board_id = ?) ORDER BY id"
        ))
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows::all(&found, rows::word_filter).map_err(storage_err)
    }
}
