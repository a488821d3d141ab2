//! # ModerationGate
//!
//! Decides whether a candidate post may be published. Checks run in a fixed
//! order and the first rejection wins. The gate reads state but never writes it.

use std::net::IpAddr;
use std::sync::Arc;

use domains::{
    Board, Clock, ContentStore, GateDecision, ModerationStore, PatternTarget, Result, SiteSettings,
    SpamChecker, SpamSubmission, SpamVerdict, Verdict,
};
use tracing::{debug, warn};

use super::filters::PatternCache;
use super::ip::ip_matches;

/// The upload part of a candidate, as far as bans are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub original_filename: String,
    pub checksum: String,
}

/// A post as submitted, before it has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub board: Board,
    /// `None` when the candidate starts a new thread.
    pub thread_id: Option<i64>,
    pub ip: String,
    pub name: String,
    pub tripcode: String,
    pub email: String,
    pub message: String,
    pub referer: Option<String>,
    pub user_agent: String,
    pub upload: Option<UploadCandidate>,
}

pub struct ModerationGate {
    content: Arc<dyn ContentStore>,
    moderation: Arc<dyn ModerationStore>,
    spam: Arc<dyn SpamChecker>,
    clock: Arc<dyn Clock>,
    settings: Arc<SiteSettings>,
    patterns: PatternCache,
}

impl ModerationGate {
    pub fn new(
        content: Arc<dyn ContentStore>,
        moderation: Arc<dyn ModerationStore>,
        spam: Arc<dyn SpamChecker>,
        clock: Arc<dyn Clock>,
        settings: Arc<SiteSettings>,
    ) -> Self {
        Self {
            content,
            moderation,
            spam,
            clock,
            settings,
            patterns: PatternCache::new(),
        }
    }

    /// Compiled ban and filter patterns, shared with edits.
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Runs every check against `candidate`. On acceptance the candidate's
    /// message has had the board's word filters applied.
    ///
    /// Errors are reserved for lookups that failed; rejections are decisions.
    pub async fn evaluate(&self, candidate: &mut Candidate) -> Result<GateDecision> {
        let decision = self.run_checks(candidate).await?;
        if !decision.is_accepted() {
            warn!(
                ip = %candidate.ip,
                board = %candidate.board.dir,
                thread_id = ?candidate.thread_id,
                verdict = %decision.verdict,
                "rejected post"
            );
        }
        Ok(decision)
    }

    async fn run_checks(&self, candidate: &mut Candidate) -> Result<GateDecision> {
        if candidate.ip.parse::<IpAddr>().is_err() {
            return Ok(GateDecision::reject(Verdict::RejectInvalid, "Invalid submission"));
        }

        // 1. non-browser submissions
        if self.settings.check_referer
            && !valid_referer(candidate.referer.as_deref(), &self.settings.site_host)
        {
            debug!(referer = ?candidate.referer, "bad referer");
            return Ok(GateDecision::reject(Verdict::RejectSpam, "Your post looks like spam"));
        }

        // 2. spam service
        let verdict = self
            .spam
            .check(&SpamSubmission {
                ip: candidate.ip.clone(),
                user_agent: candidate.user_agent.clone(),
                referer: candidate.referer.clone().unwrap_or_default(),
                name: candidate.name.clone(),
                email: candidate.email.clone(),
                message: candidate.message.clone(),
            })
            .await;
        match verdict {
            SpamVerdict::Spam | SpamVerdict::Discard => {
                return Ok(GateDecision::reject(Verdict::RejectSpam, "Your post looks like spam"));
            }
            SpamVerdict::Unavailable => {
                warn!(ip = %candidate.ip, "spam check unavailable, continuing degraded");
            }
            SpamVerdict::Ham => {}
        }

        // 3. cooldown
        let policy = self.settings.policy_for(&candidate.board.dir);
        let (last, cooldown) = match candidate.thread_id {
            None => (self.content.last_thread_by_ip(&candidate.ip).await?, policy.new_thread_cooldown),
            Some(_) => (self.content.last_post_by_ip(&candidate.ip).await?, policy.reply_cooldown),
        };
        if let Some(last) = last {
            let elapsed = (self.clock.now() - last).to_std().unwrap_or_default();
            if elapsed < cooldown {
                debug!(elapsed_ms = elapsed.as_millis() as u64, "cooldown not elapsed");
                return Ok(GateDecision::reject(
                    Verdict::RejectRateLimited,
                    "Please wait before making a new post",
                ));
            }
        }

        // 4. IP bans
        let now = self.clock.now();
        let bans = self.moderation.active_ip_bans(candidate.board.id).await?;
        if let Some(ban) = bans.iter().find(|ban| {
            ban.in_force(now) && ban.applies_to_board(candidate.board.id) && ip_matches(&ban.ip, &candidate.ip)
        }) {
            return Ok(GateDecision::banned(ban));
        }

        // 5. name, filename and checksum bans
        let name_bans = self
            .moderation
            .active_pattern_bans(PatternTarget::Name, candidate.board.id)
            .await?;
        if self.patterns.find_match(&name_bans, &candidate.name).is_some() {
            return Ok(GateDecision::reject(Verdict::RejectBanned, "That name is banned"));
        }
        if let Some(upload) = &candidate.upload {
            let filename_bans = self
                .moderation
                .active_pattern_bans(PatternTarget::Filename, candidate.board.id)
                .await?;
            if self.patterns.find_match(&filename_bans, &upload.original_filename).is_some() {
                return Ok(GateDecision::reject(Verdict::RejectBanned, "That filename is banned"));
            }
            let checksum_bans = self
                .moderation
                .active_pattern_bans(PatternTarget::Checksum, candidate.board.id)
                .await?;
            if self.patterns.find_match(&checksum_bans, &upload.checksum).is_some() {
                return Ok(GateDecision::reject(Verdict::RejectBanned, "That file is banned"));
            }
        }

        // 6. word filters
        let filters = self.moderation.active_word_filters(candidate.board.id).await?;
        candidate.message = self.patterns.apply_word_filters(&candidate.message, &filters);

        Ok(GateDecision::accept())
    }
}

/// True when the Referer names this site. Submissions without one are rejected.
pub fn valid_referer(referer: Option<&str>, site_host: &str) -> bool {
    let Some(referer) = referer else {
        return false;
    };
    let Some(rest) = referer
        .strip_prefix("https://")
        .or_else(|| referer.strip_prefix("http://"))
    else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once(':').map_or(authority, |(host, _)| host);
    authority.eq_ignore_ascii_case(site_host) || host.eq_ignore_ascii_case(site_host)
}
