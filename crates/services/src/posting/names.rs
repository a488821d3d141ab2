//! Name and email field parsing: tripcodes, `sage` and `noko`.

#[cfg(feature = "auth-tripcode")]
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
#[cfg(feature = "auth-tripcode")]
use hmac::{Hmac, Mac};
#[cfg(feature = "auth-tripcode")]
use sha2::Sha256;

#[cfg(feature = "auth-tripcode")]
const TRIPCODE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedName {
    pub name: String,
    pub tripcode: String,
}

/// Splits `name#secret` into the display name and a tripcode derived from
/// `secret` and the site secret.
#[cfg(feature = "auth-tripcode")]
pub fn parse_name(raw: &str, site_secret: &str) -> ParsedName {
    let raw = raw.trim();
    match raw.split_once('#') {
        Some((name, secret)) => ParsedName {
            name: name.trim().to_string(),
            tripcode: tripcode(secret, site_secret),
        },
        None => ParsedName {
            name: raw.to_string(),
            tripcode: String::new(),
        },
    }
}

/// Tripcodes are disabled; the field is kept as typed.
#[cfg(not(feature = "auth-tripcode"))]
pub fn parse_name(raw: &str, _site_secret: &str) -> ParsedName {
    ParsedName {
        name: raw.trim().to_string(),
        tripcode: String::new(),
    }
}

#[cfg(feature = "auth-tripcode")]
fn tripcode(secret: &str, site_secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(site_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(secret.as_bytes());
    let encoded = STANDARD_NO_PAD.encode(mac.finalize().into_bytes());
    format!("!{}", &encoded[..TRIPCODE_LEN])
}

/// Instructions a poster can give through the email field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCommand {
    /// Reply without bumping the thread.
    Sage,
    /// Send the poster to the thread instead of the board index.
    Noko,
}

impl EmailCommand {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sage" => Some(EmailCommand::Sage),
            "noko" => Some(EmailCommand::Noko),
            _ => None,
        }
    }
}

/// Accepts `sage`, `noko`, or `address#command`; anything else is an address.
pub fn parse_email(raw: &str) -> (String, Option<EmailCommand>) {
    let raw = raw.trim();
    if let Some(command) = EmailCommand::parse(raw) {
        return (String::new(), Some(command));
    }
    if let Some((address, command)) = raw.split_once('#') {
        if let Some(command) = EmailCommand::parse(command) {
            return (address.to_string(), Some(command));
        }
    }
    (raw.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_is_kept() {
        let parsed = parse_name("  Anonymous ", "s3cret");
        assert_eq!(parsed.name, "Anonymous");
        assert!(parsed.tripcode.is_empty());
    }

    #[cfg(feature = "auth-tripcode")]
    #[test]
    fn tripcode_is_stable_and_secret_dependent() {
        let a = parse_name("mod#hunter2", "site");
        let b = parse_name("other#hunter2", "site");
        let c = parse_name("mod#hunter2", "elsewhere");
        assert_eq!(a.name, "mod");
        assert!(a.tripcode.starts_with('!'));
        assert_eq!(a.tripcode.len(), TRIPCODE_LEN + 1);
        assert_eq!(a.tripcode, b.tripcode);
        assert_ne!(a.tripcode, c.tripcode);
    }

    #[cfg(feature = "auth-tripcode")]
    #[test]
    fn bare_secret_gives_nameless_tripcode() {
        let parsed = parse_name("#hunter2", "site");
        assert!(parsed.name.is_empty());
        assert!(!parsed.tripcode.is_empty());
    }

    #[test]
    fn email_commands() {
        assert_eq!(parse_email("sage"), (String::new(), Some(EmailCommand::Sage)));
        assert_eq!(parse_email("NOKO"), (String::new(), Some(EmailCommand::Noko)));
        assert_eq!(
            parse_email("me@example.org#noko"),
            ("me@example.org".into(), Some(EmailCommand::Noko))
        );
        assert_eq!(parse_email("sagefan@example.org"), ("sagefan@example.org".into(), None));
    }
}
