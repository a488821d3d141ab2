//! Upload checks that run before anything touches the disk.

use domains::{BoardPolicy, DomainError, Result};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the raw file, matched against checksum bans.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Lower-case extension, if the name has one.
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Rejects files the board does not accept and returns the extension.
pub fn validate_upload(original_filename: &str, size: usize, policy: &BoardPolicy) -> Result<String> {
    if size == 0 {
        return Err(DomainError::validation("Uploaded file is empty"));
    }
    let ext = extension(original_filename)
        .ok_or_else(|| DomainError::validation("Uploaded file has no extension"))?;
    if !policy.allows_extension(&ext) {
        return Err(DomainError::validation(format!("Files of type .{ext} are not allowed")));
    }
    Ok(ext)
}

/// Strips any directory part a browser may have sent.
pub fn clean_original_filename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or_default().trim().to_string()
}
