pub mod filters;
pub mod gate;
pub mod ip;
pub mod lifecycle;

pub use gate::{Candidate, ModerationGate, UploadCandidate};
pub use lifecycle::{BanLifecycle, ReportLifecycle};
