//! Helpers that shape a submission into a storable post.

pub mod format;
pub mod names;
pub mod password;
pub mod uploads;

pub use format::{format_message, referenced_posts};
pub use names::{parse_email, parse_name, EmailCommand, ParsedName};
pub use password::{hash_password, hash_password_blocking, verify_password, verify_password_blocking};
