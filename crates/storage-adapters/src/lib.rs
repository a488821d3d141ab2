//! # storage-adapters
//!
//! Infrastructure behind the domain ports: SQLite persistence, the local
//! document root, upload storage with thumbnailing, and spam checks.

pub mod fs;
#[cfg(feature = "media-local")]
pub mod media;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;
pub mod spam;

pub use fs::LocalSiteFilesystem;
#[cfg(feature = "media-local")]
pub use media::{stored_filename, LocalMediaStore};
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
#[cfg(feature = "spam-dnsbl")]
pub use spam::DnsblSpamChecker;
pub use spam::{CombinedSpamCheck, NoSpamCheck};
