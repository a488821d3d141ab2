//! Ban, appeal and report state changes.
//!
//! Bans go active → inactive when staff deactivates them or an appeal is
//! approved; expiry is computed at read time. Appeals go pending → approved,
//! never back. Reports go open → cleared, optionally blocking further reports.

use std::sync::Arc;

use domains::{
    Appeal, Clock, ContentStore, DomainError, IpBan, ModerationStore, NewIpBan, NewPatternBan,
    NewWordFilter, PatternBan, PatternTarget, Report, Result, Staff, WordFilter,
};
use tracing::info;

use super::filters::validate_pattern;
use super::ip::is_valid_ban_target;
use crate::publication::registry::{actions, ActionRegistry};

const MAX_APPEAL_LENGTH: usize = 2048;
const MAX_REPORT_REASON_LENGTH: usize = 255;

fn pattern_action(target: PatternTarget) -> &'static str {
    match target {
        PatternTarget::Name => actions::NAME_BANS,
        PatternTarget::Filename => actions::FILENAME_BANS,
        PatternTarget::Checksum => actions::CHECKSUM_BANS,
    }
}

pub struct BanLifecycle {
    moderation: Arc<dyn ModerationStore>,
    clock: Arc<dyn Clock>,
    registry: Arc<ActionRegistry>,
}

impl BanLifecycle {
    pub fn new(moderation: Arc<dyn ModerationStore>, clock: Arc<dyn Clock>, registry: Arc<ActionRegistry>) -> Self {
        Self { moderation, clock, registry }
    }

    pub async fn issue_ip_ban(&self, staff: &Staff, ban: NewIpBan) -> Result<IpBan> {
        self.registry.get(actions::BANS, staff.rank)?;
        if !is_valid_ban_target(&ban.ip) {
            return Err(DomainError::validation(format!("'{}' is not an address or range", ban.ip)));
        }
        let now = self.clock.now();
        if !ban.permanent && ban.expires_at <= now {
            return Err(DomainError::validation("Ban expiry must be in the future"));
        }
        if ban.message.trim().is_empty() {
            return Err(DomainError::validation("Ban reason is required"));
        }

        let created = self.moderation.create_ip_ban(ban, staff.id, now).await?;
        info!(
            ban_id = created.id,
            ip = %created.ip,
            board_id = ?created.board_id,
            staff = %staff.username,
            "ip ban issued"
        );
        Ok(created)
    }

    pub async fn deactivate_ip_ban(&self, staff: &Staff, ban_id: i64) -> Result<()> {
        self.registry.get(actions::BANS, staff.rank)?;
        let ban = self.moderation.ip_ban_by_id(ban_id).await?;
        if !self.moderation.deactivate_ip_ban(ban.id, staff.id).await? {
            return Err(DomainError::Conflict(format!("ban {} is already inactive", ban.id)));
        }
        info!(ban_id, staff = %staff.username, "ip ban deactivated");
        Ok(())
    }

    /// Bans listed for staff review, newest first.
    pub async fn list_ip_bans(&self, staff: &Staff, board_id: Option<i64>, limit: i64) -> Result<Vec<IpBan>> {
        self.registry.get(actions::BANS, staff.rank)?;
        self.moderation.list_ip_bans(board_id, limit).await
    }

    pub async fn issue_pattern_ban(&self, staff: &Staff, ban: NewPatternBan) -> Result<PatternBan> {
        self.registry.get(pattern_action(ban.target), staff.rank)?;
        if ban.target == PatternTarget::Checksum && ban.is_regex {
            return Err(DomainError::validation("Checksum bans cannot be regular expressions"));
        }
        validate_pattern(&ban.pattern, ban.is_regex)?;
        let target = ban.target;
        let created = self
            .moderation
            .create_pattern_ban(ban, staff.id, self.clock.now())
            .await?;
        info!(ban_id = created.id, %target, staff = %staff.username, "pattern ban issued");
        Ok(created)
    }

    pub async fn deactivate_pattern_ban(&self, staff: &Staff, target: PatternTarget, id: i64) -> Result<()> {
        self.registry.get(pattern_action(target), staff.rank)?;
        if !self.moderation.deactivate_pattern_ban(target, id).await? {
            return Err(DomainError::not_found("active pattern ban", id));
        }
        Ok(())
    }

    pub async fn add_word_filter(&self, staff: &Staff, filter: NewWordFilter) -> Result<WordFilter> {
        self.registry.get(actions::WORD_FILTERS, staff.rank)?;
        validate_pattern(&filter.search, filter.is_regex)?;
        self.moderation.create_word_filter(filter, staff.id).await
    }

    /// Visitor-facing: asks for `ban_id` to be lifted.
    pub async fn submit_appeal(&self, ban_id: i64, message: &str) -> Result<Appeal> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("Appeal message is required"));
        }
        if message.chars().count() > MAX_APPEAL_LENGTH {
            return Err(DomainError::validation("Appeal message is too long"));
        }

        let ban = self.moderation.ip_ban_by_id(ban_id).await?;
        let now = self.clock.now();
        if !ban.in_force(now) {
            return Err(DomainError::Conflict("That ban is no longer in force".into()));
        }
        if !ban.can_appeal {
            return Err(DomainError::validation("That ban cannot be appealed"));
        }
        if now < ban.appeal_at {
            return Err(DomainError::validation(format!(
                "You may appeal this ban after {}",
                ban.appeal_at.format("%Y-%m-%d %H:%M UTC")
            )));
        }
        if self
            .moderation
            .list_appeals(Some(ban_id), 1)
            .await?
            .iter()
            .any(|a| !a.is_approved())
        {
            return Err(DomainError::Conflict("An appeal for this ban is already pending".into()));
        }

        self.moderation.create_appeal(ban_id, message, now).await
    }

    pub async fn list_appeals(&self, staff: &Staff, ban_id: Option<i64>, limit: i64) -> Result<Vec<Appeal>> {
        self.registry.get(actions::APPEALS, staff.rank)?;
        self.moderation.list_appeals(ban_id, limit).await
    }

    /// Approving an appeal deactivates its ban. Approval cannot be undone.
    pub async fn approve_appeal(&self, staff: &Staff, appeal_id: i64) -> Result<Appeal> {
        self.registry.get(actions::APPEALS, staff.rank)?;
        let appeal = self.moderation.appeal_by_id(appeal_id).await?;
        if appeal.is_approved() {
            return Err(DomainError::Conflict(format!("appeal {appeal_id} is already approved")));
        }
        let ban = self.moderation.ip_ban_by_id(appeal.ban_id).await?;
        if !ban.is_active {
            return Err(DomainError::Conflict(format!("ban {} is already inactive", ban.id)));
        }

        let approved = self
            .moderation
            .approve_appeal(appeal_id, staff.id, self.clock.now())
            .await?;
        info!(appeal_id, ban_id = ban.id, staff = %staff.username, "appeal approved");
        Ok(approved)
    }
}

pub struct ReportLifecycle {
    content: Arc<dyn ContentStore>,
    moderation: Arc<dyn ModerationStore>,
    clock: Arc<dyn Clock>,
    registry: Arc<ActionRegistry>,
}

impl ReportLifecycle {
    pub fn new(
        content: Arc<dyn ContentStore>,
        moderation: Arc<dyn ModerationStore>,
        clock: Arc<dyn Clock>,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        Self { content, moderation, clock, registry }
    }

    pub async fn file_report(&self, post_id: i64, ip: &str, reason: &str) -> Result<Report> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("A reason is required"));
        }
        if reason.chars().count() > MAX_REPORT_REASON_LENGTH {
            return Err(DomainError::validation("Report reason is too long"));
        }
        let post = self.content.post_by_id(post_id).await?;
        if self.moderation.reports_blocked(post.id).await? {
            return Err(DomainError::Conflict("This post cannot be reported".into()));
        }
        self.moderation
            .create_report(post.id, ip, reason, self.clock.now())
            .await
    }

    pub async fn open_reports(&self, staff: &Staff) -> Result<Vec<Report>> {
        self.registry.get(actions::REPORTS, staff.rank)?;
        self.moderation.open_reports().await
    }

    /// Clears an open report. `block` also refuses future reports on the post
    /// and is reserved to admins.
    pub async fn clear_report(&self, staff: &Staff, report_id: i64, block: bool) -> Result<()> {
        self.registry.get(actions::REPORTS, staff.rank)?;
        if block {
            self.registry.get(actions::BLOCK_REPORTS, staff.rank)?;
        }
        if !self.moderation.clear_report(report_id, staff.id, block).await? {
            return Err(DomainError::not_found("open report", report_id));
        }
        info!(report_id, block, staff = %staff.username, "report cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use domains::{MockContentStore, MockModerationStore, Post, StaffRank};
    use mockall::predicate::eq;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn staff(rank: StaffRank) -> Staff {
        Staff { id: 7, username: "mod".into(), rank }
    }

    fn ban(is_active: bool, can_appeal: bool, appeal_at: DateTime<Utc>) -> IpBan {
        IpBan {
            id: 1,
            board_id: None,
            staff_id: 7,
            ip: "198.51.100.4".into(),
            is_active,
            created_on: now() - Duration::days(2),
            expires_at: now() + Duration::days(5),
            appeal_at,
            permanent: false,
            can_appeal,
            message: "spam".into(),
            staff_note: String::new(),
            deactivated_by: None,
        }
    }

    fn appeal(approved: bool) -> Appeal {
        Appeal {
            id: 4,
            ban_id: 1,
            message: "sorry".into(),
            created_on: now(),
            approved_by: approved.then_some(7),
            approved_on: approved.then_some(now()),
        }
    }

    fn bans(store: MockModerationStore) -> BanLifecycle {
        BanLifecycle::new(
            Arc::new(store),
            Arc::new(FixedClock(now())),
            Arc::new(ActionRegistry::with_defaults()),
        )
    }

    fn new_ban(ip: &str) -> NewIpBan {
        NewIpBan {
            board_id: None,
            ip: ip.into(),
            expires_at: now() + Duration::days(1),
            appeal_at: now(),
            permanent: false,
            can_appeal: true,
            message: "spam".into(),
            staff_note: String::new(),
        }
    }

    #[tokio::test]
    async fn janitors_cannot_ban() {
        let err = bans(MockModerationStore::new())
            .issue_ip_ban(&staff(StaffRank::Janitor), new_ban("198.51.100.4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn janitors_cannot_list_bans() {
        let mut store = MockModerationStore::new();
        store.expect_list_ip_bans().never();
        let err = bans(store)
            .list_ip_bans(&staff(StaffRank::Janitor), None, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn word_filters_are_for_admins() {
        let err = bans(MockModerationStore::new())
            .add_word_filter(
                &staff(StaffRank::Moderator),
                NewWordFilter {
                    board_id: None,
                    search: "darn".into(),
                    is_regex: false,
                    change_to: "gosh".into(),
                    staff_note: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn ban_target_must_be_an_address() {
        let err = bans(MockModerationStore::new())
            .issue_ip_ban(&staff(StaffRank::Moderator), new_ban("everyone"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn range_ban_is_stored_with_issuer() {
        let mut store = MockModerationStore::new();
        store
            .expect_create_ip_ban()
            .withf(|ban, staff_id, _| ban.ip == "203.0.113.0/24" && *staff_id == 7)
            .times(1)
            .returning(|ban, staff_id, created_on| {
                Ok(IpBan {
                    id: 11,
                    board_id: ban.board_id,
                    staff_id,
                    ip: ban.ip,
                    is_active: true,
                    created_on,
                    expires_at: ban.expires_at,
                    appeal_at: ban.appeal_at,
                    permanent: ban.permanent,
                    can_appeal: ban.can_appeal,
                    message: ban.message,
                    staff_note: ban.staff_note,
                    deactivated_by: None,
                })
            });
        let created = bans(store)
            .issue_ip_ban(&staff(StaffRank::Admin), new_ban("203.0.113.0/24"))
            .await
            .unwrap();
        assert_eq!(created.id, 11);
    }

    #[tokio::test]
    async fn appeal_before_appeal_time_is_refused() {
        let mut store = MockModerationStore::new();
        store
            .expect_ip_ban_by_id()
            .returning(|_| Ok(ban(true, true, now() + Duration::hours(1))));
        let err = bans(store).submit_appeal(1, "please").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn unappealable_ban_refuses_appeal() {
        let mut store = MockModerationStore::new();
        store.expect_ip_ban_by_id().returning(|_| Ok(ban(true, false, now())));
        assert!(bans(store).submit_appeal(1, "please").await.is_err());
    }

    #[tokio::test]
    async fn appeal_is_recorded() {
        let mut store = MockModerationStore::new();
        store.expect_ip_ban_by_id().returning(|_| Ok(ban(true, true, now())));
        store.expect_list_appeals().returning(|_, _| Ok(vec![]));
        store
            .expect_create_appeal()
            .with(eq(1), eq("please unban"), eq(now()))
            .times(1)
            .returning(|_, _, _| Ok(appeal(false)));
        let created = bans(store).submit_appeal(1, "  please unban ").await.unwrap();
        assert!(!created.is_approved());
    }

    #[tokio::test]
    async fn approval_is_one_way() {
        let mut store = MockModerationStore::new();
        store.expect_appeal_by_id().returning(|_| Ok(appeal(true)));
        store.expect_approve_appeal().never();
        let err = bans(store)
            .approve_appeal(&staff(StaffRank::Moderator), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn approval_of_inactive_ban_is_rejected() {
        let mut store = MockModerationStore::new();
        store.expect_appeal_by_id().returning(|_| Ok(appeal(false)));
        store.expect_ip_ban_by_id().returning(|_| Ok(ban(false, true, now())));
        store.expect_approve_appeal().never();
        assert!(bans(store)
            .approve_appeal(&staff(StaffRank::Moderator), 4)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn approval_goes_through_store() {
        let mut store = MockModerationStore::new();
        store.expect_appeal_by_id().returning(|_| Ok(appeal(false)));
        store.expect_ip_ban_by_id().returning(|_| Ok(ban(true, true, now())));
        store
            .expect_approve_appeal()
            .with(eq(4), eq(7), eq(now()))
            .times(1)
            .returning(|_, _, _| Ok(appeal(true)));
        let approved = bans(store)
            .approve_appeal(&staff(StaffRank::Moderator), 4)
            .await
            .unwrap();
        assert!(approved.is_approved());
    }

    #[tokio::test]
    async fn checksum_ban_must_be_literal() {
        let err = bans(MockModerationStore::new())
            .issue_pattern_ban(
                &staff(StaffRank::Admin),
                NewPatternBan {
                    target: PatternTarget::Checksum,
                    board_id: None,
                    pattern: "^abc".into(),
                    is_regex: true,
                    staff_note: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    fn post(id: i64) -> Post {
        Post {
            id,
            thread_id: id,
            parent_id: None,
            is_top_post: true,
            ip: "192.0.2.1".into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            email: String::new(),
            subject: String::new(),
            message_raw: "hi".into(),
            message: "hi".into(),
            password: String::new(),
            created_on: now(),
            last_modified: now(),
            banned_message: None,
        }
    }

    fn reports(content: MockContentStore, store: MockModerationStore) -> ReportLifecycle {
        ReportLifecycle::new(
            Arc::new(content),
            Arc::new(store),
            Arc::new(FixedClock(now())),
            Arc::new(ActionRegistry::with_defaults()),
        )
    }

    #[tokio::test]
    async fn blocked_post_refuses_reports() {
        let mut content = MockContentStore::new();
        content.expect_post_by_id().returning(|id| Ok(post(id)));
        let mut store = MockModerationStore::new();
        store.expect_reports_blocked().with(eq(5)).returning(|_| Ok(true));
        store.expect_create_report().never();
        let err = reports(content, store)
            .file_report(5, "192.0.2.9", "off topic")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_admins_block_reports() {
        let mut store = MockModerationStore::new();
        store.expect_clear_report().never();
        let err = reports(MockContentStore::new(), store)
            .clear_report(&staff(StaffRank::Moderator), 3, true)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn clearing_missing_report_is_not_found() {
        let mut store = MockModerationStore::new();
        store.expect_clear_report().returning(|_, _, _| Ok(false));
        let err = reports(MockContentStore::new(), store)
            .clear_report(&staff(StaffRank::Janitor), 3, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(..)));
    }
}
