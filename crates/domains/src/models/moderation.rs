use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Staff privilege levels, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRank {
    Janitor = 1,
    Moderator = 2,
    Admin = 3,
}

/// An authenticated staff member acting on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: i64,
    pub username: String,
    pub rank: StaffRank,
}

/// Represents a moderation action against an IP address or range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpBan {
    pub id: i64,
    /// `None` bans from every board.
    pub board_id: Option<i64>,
    pub staff_id: i64,
    /// Single address or CIDR range (e.g. "203.0.113.0/24").
    pub ip: String,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Appeals are accepted from this moment on.
    pub appeal_at: DateTime<Utc>,
    pub permanent: bool,
    pub can_appeal: bool,
    /// Reason shown to the banned visitor.
    pub message: String,
    pub staff_note: String,
    pub deactivated_by: Option<i64>,
}

impl IpBan {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.permanent && self.expires_at <= now
    }

    /// A ban is in force while active and not past its expiry.
    pub fn in_force(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn applies_to_board(&self, board_id: i64) -> bool {
        self.board_id.map_or(true, |id| id == board_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIpBan {
    pub board_id: Option<i64>,
    pub ip: String,
    pub expires_at: DateTime<Utc>,
    pub appeal_at: DateTime<Utc>,
    pub permanent: bool,
    pub can_appeal: bool,
    pub message: String,
    pub staff_note: String,
}

/// What a banned visitor is told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanNotice {
    pub ban_id: i64,
    pub board_id: Option<i64>,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub can_appeal: bool,
}

impl From<&IpBan> for BanNotice {
    fn from(ban: &IpBan) -> Self {
        Self {
            ban_id: ban.id,
            board_id: ban.board_id,
            reason: ban.message.clone(),
            expires_at: (!ban.permanent).then_some(ban.expires_at),
            can_appeal: ban.can_appeal,
        }
    }
}

/// A literal or regex pattern matched against something a poster submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBan {
    pub id: i64,
    pub board_id: Option<i64>,
    pub staff_id: i64,
    pub pattern: String,
    pub is_regex: bool,
    pub is_active: bool,
    pub staff_note: String,
    pub created_on: DateTime<Utc>,
}

/// Which submitted value a `PatternBan` is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternTarget {
    Name,
    Filename,
    /// Checksum bans are always literal.
    Checksum,
}

impl PatternTarget {
    pub fn table(self) -> &'static str {
        match self {
            PatternTarget::Name => "name_bans",
            PatternTarget::Filename => "filename_bans",
            PatternTarget::Checksum => "checksum_bans",
        }
    }
}

impl fmt::Display for PatternTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTarget::Name => f.write_str("name"),
            PatternTarget::Filename => f.write_str("filename"),
            PatternTarget::Checksum => f.write_str("checksum"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatternBan {
    pub target: PatternTarget,
    pub board_id: Option<i64>,
    pub pattern: String,
    pub is_regex: bool,
    pub staff_note: String,
}

/// A visitor's request to lift an IP ban.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: i64,
    pub ban_id: i64,
    pub message: String,
    pub created_on: DateTime<Utc>,
    pub approved_by: Option<i64>,
    pub approved_on: Option<DateTime<Utc>>,
}

impl Appeal {
    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }
}

/// A visitor's complaint about a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub post_id: i64,
    pub ip: String,
    pub reason: String,
    pub created_on: DateTime<Utc>,
    pub handled_by_staff_id: Option<i64>,
    pub is_cleared: bool,
    /// Set when staff cleared the report and blocked further reports on the post.
    pub blocks_further: bool,
}

/// A configured text substitution applied to post bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFilter {
    pub id: i64,
    /// `None` applies to every board.
    pub board_id: Option<i64>,
    pub staff_id: i64,
    pub search: String,
    pub is_regex: bool,
    pub change_to: String,
    pub is_active: bool,
    pub staff_note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWordFilter {
    pub board_id: Option<i64>,
    pub search: String,
    pub is_regex: bool,
    pub change_to: String,
    pub staff_note: String,
}

/// Outcome category of the moderation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    RejectSpam,
    RejectBanned,
    RejectRateLimited,
    RejectInvalid,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accept => "accept",
            Verdict::RejectSpam => "spam",
            Verdict::RejectBanned => "banned",
            Verdict::RejectRateLimited => "rate_limited",
            Verdict::RejectInvalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Verdict plus the reason shown to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub reason: String,
    pub ban: Option<BanNotice>,
}

impl GateDecision {
    pub fn accept() -> Self {
        Self { verdict: Verdict::Accept, reason: String::new(), ban: None }
    }

    pub fn reject(verdict: Verdict, reason: impl Into<String>) -> Self {
        Self { verdict, reason: reason.into(), ban: None }
    }

    pub fn banned(ban: &IpBan) -> Self {
        Self {
            verdict: Verdict::RejectBanned,
            reason: "You are banned from posting".into(),
            ban: Some(BanNotice::from(ban)),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

/// Answer of the external spam-check capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamVerdict {
    Ham,
    Spam,
    Discard,
    /// The service could not be reached; treated as ham.
    Unavailable,
}

/// Submission metadata handed to the spam checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamSubmission {
    pub ip: String,
    pub user_agent: String,
    pub referer: String,
    pub name: String,
    pub email: String,
    pub message: String,
}
