//! Staff actions known to the site, built once at startup and handed to the
//! pipeline. Nothing here is global; tests build their own registry.

use domains::{DomainError, Result, StaffRank};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffAction {
    pub id: &'static str,
    pub title: &'static str,
    pub required_rank: StaffRank,
    /// Whether the action can answer with JSON as well as HTML.
    pub supports_json: bool,
}

impl StaffAction {
    pub const fn new(id: &'static str, title: &'static str, required_rank: StaffRank, supports_json: bool) -> Self {
        Self { id, title, required_rank, supports_json }
    }
}

pub mod actions {
    pub const EDIT_POST: &str = "editpost";
    pub const DELETE_POSTS: &str = "deleteposts";
    pub const THREAD_ATTRIBUTES: &str = "threadattrs";
    pub const BANS: &str = "bans";
    pub const APPEALS: &str = "appeals";
    pub const REPORTS: &str = "reports";
    pub const BLOCK_REPORTS: &str = "blockreports";
    pub const FILENAME_BANS: &str = "filenamebans";
    pub const NAME_BANS: &str = "namebans";
    pub const CHECKSUM_BANS: &str = "checksumbans";
    pub const WORD_FILTERS: &str = "wordfilters";
    pub const REBUILD_BOARDS: &str = "rebuildboards";
    pub const REBUILD_FRONT: &str = "rebuildfront";
    pub const BOARDS: &str = "boards";
}

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<StaffAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The actions the pipeline and lifecycle services check against.
    pub fn with_defaults() -> Self {
        use actions::*;
        use StaffRank::*;

        let mut registry = Self::new();
        for action in [
            StaffAction::new(REPORTS, "Reports", Janitor, true),
            StaffAction::new(DELETE_POSTS, "Delete posts", Janitor, true),
            StaffAction::new(EDIT_POST, "Edit post", Moderator, false),
            StaffAction::new(THREAD_ATTRIBUTES, "Thread attributes", Moderator, true),
            StaffAction::new(BANS, "Bans", Moderator, true),
            StaffAction::new(BLOCK_REPORTS, "Block reports", Admin, true),
            StaffAction::new(APPEALS, "Ban appeals", Moderator, true),
            StaffAction::new(FILENAME_BANS, "Filename bans", Moderator, true),
            StaffAction::new(NAME_BANS, "Name bans", Moderator, true),
            StaffAction::new(CHECKSUM_BANS, "File checksum bans", Moderator, true),
            StaffAction::new(WORD_FILTERS, "Word filters", Admin, false),
            StaffAction::new(REBUILD_FRONT, "Rebuild front page", Admin, true),
            StaffAction::new(REBUILD_BOARDS, "Rebuild boards", Admin, true),
            StaffAction::new(BOARDS, "Boards", Admin, false),
        ] {
            registry
                .register(action)
                .expect("default action ids are distinct");
        }
        registry
    }

    pub fn register(&mut self, action: StaffAction) -> Result<()> {
        if self.actions.iter().any(|a| a.id == action.id) {
            return Err(DomainError::Conflict(format!("staff action '{}' already registered", action.id)));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Looks up `id` and checks that `rank` may perform it.
    pub fn get(&self, id: &str, rank: StaffRank) -> Result<&StaffAction> {
        let action = self
            .actions
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| DomainError::not_found("staff action", id))?;
        if rank < action.required_rank {
            return Err(DomainError::Unauthorized(format!(
                "'{}' requires {:?} rank",
                action.title, action.required_rank
            )));
        }
        Ok(action)
    }

    /// Actions `rank` may perform, in registration order. `json_only` keeps
    /// those that can answer with JSON.
    pub fn available(&self, rank: StaffRank, json_only: bool) -> Vec<&StaffAction> {
        self.actions
            .iter()
            .filter(|a| rank >= a.required_rank && (!json_only || a.supports_json))
            .collect()
    }
}
