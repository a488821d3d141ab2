//! # Domain Models
//!
//! These structs represent the core entities of boardsmith.
//! Identifiers are database-assigned integers; `0` means "not yet persisted".

pub mod board;
pub mod moderation;
pub mod pages;
pub mod post;
pub mod settings;

pub use board::*;
pub use moderation::*;
pub use pages::*;
pub use post::*;
pub use settings::*;
