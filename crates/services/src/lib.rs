//! # services
//!
//! The publication core of boardsmith: the moderation gate, ban and report
//! lifecycles, pagination, page building and the pipeline tying them together.
//! Everything here talks to the outside world through the ports in `domains`.

pub mod building;
pub mod moderation;
pub mod paginator;
pub mod posting;
pub mod publication;

pub use building::{PageBuilder, RebuildSummary};
pub use moderation::{BanLifecycle, Candidate, ModerationGate, ReportLifecycle};
pub use paginator::{paginate, sort_for_listing, Page};
pub use publication::{
    ActionRegistry, BanRequest, Credential, DeletionReceipt, PostReceipt, Ports, PublicationPipeline, Submission,
};
