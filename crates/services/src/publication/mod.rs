pub mod locks;
pub mod pipeline;
pub mod registry;
pub mod requests;

pub use locks::SubmissionLocks;
pub use pipeline::{Ports, PublicationPipeline};
pub use registry::{actions, ActionRegistry, StaffAction};
pub use requests::{BanRequest, Credential, DeletionReceipt, PostReceipt, Submission};
