//! # domains
//!
//! The central domain models and capability ports for boardsmith.
//! Nothing in here performs I/O; adapters implement the ports in `ports`.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
