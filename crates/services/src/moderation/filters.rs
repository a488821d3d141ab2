//! Word filters and pattern-ban matching.

use dashmap::DashMap;
use domains::{DomainError, PatternBan, Result, WordFilter};
use regex::{NoExpand, Regex};
use tracing::warn;

/// Rejects patterns flagged as regex that do not compile.
pub fn validate_pattern(pattern: &str, is_regex: bool) -> Result<()> {
    if pattern.is_empty() {
        return Err(DomainError::validation("pattern must not be empty"));
    }
    if is_regex {
        Regex::new(pattern)
            .map_err(|e| DomainError::validation(format!("invalid regular expression: {e}")))?;
    }
    Ok(())
}

/// Compiled regexes for bans and word filters, keyed by pattern source.
/// Patterns that fail to compile are remembered too, so each one is warned
/// about once.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<String, Option<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn regex(&self, pattern: &str) -> Option<Regex> {
        if let Some(found) = self.compiled.get(pattern) {
            return found.clone();
        }
        let compiled = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(%pattern, error = %err, "ignoring invalid regex");
                None
            }
        };
        self.compiled.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Literal bans match the whole value; regex bans match anywhere in it.
    pub fn matches(&self, ban: &PatternBan, value: &str) -> bool {
        if !ban.is_regex {
            return ban.pattern == value;
        }
        self.regex(&ban.pattern).is_some_and(|re| re.is_match(value))
    }

    /// First active ban in `bans` matching `value`.
    pub fn find_match<'a>(&self, bans: &'a [PatternBan], value: &str) -> Option<&'a PatternBan> {
        bans.iter().filter(|ban| ban.is_active).find(|ban| self.matches(ban, value))
    }

    /// Applies every active filter to `message`, in order.
    pub fn apply_word_filters(&self, message: &str, filters: &[WordFilter]) -> String {
        let mut filtered = message.to_string();
        for filter in filters.iter().filter(|f| f.is_active) {
            if filter.is_regex {
                if let Some(re) = self.regex(&filter.search) {
                    filtered = re.replace_all(&filtered, NoExpand(&filter.change_to)).into_owned();
                }
            } else if !filter.search.is_empty() {
                filtered = filtered.replace(&filter.search, &filter.change_to);
            }
        }
        filtered
    }
}
