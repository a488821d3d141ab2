//! Spam-check adapters.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{SpamChecker, SpamSubmission, SpamVerdict};

/// Accepts everything. Used when no spam service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpamCheck;

#[async_trait]
impl SpamChecker for NoSpamCheck {
    async fn check(&self, _submission: &SpamSubmission) -> SpamVerdict {
        SpamVerdict::Ham
    }
}

/// Asks every checker in turn. The first spam verdict wins; otherwise an
/// outage of any checker makes the answer `Unavailable`.
#[derive(Clone, Default)]
pub struct CombinedSpamCheck {
    checkers: Vec<Arc<dyn SpamChecker>>,
}

impl CombinedSpamCheck {
    pub fn new(checkers: Vec<Arc<dyn SpamChecker>>) -> Self {
        Self { checkers }
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

#[async_trait]
impl SpamChecker for CombinedSpamCheck {
    async fn check(&self, submission: &SpamSubmission) -> SpamVerdict {
        let mut verdict = SpamVerdict::Ham;
        for checker in &self.checkers {
            match checker.check(submission).await {
                SpamVerdict::Ham => {}
                SpamVerdict::Unavailable => verdict = SpamVerdict::Unavailable,
                rejected => return rejected,
            }
        }
        verdict
    }
}

#[cfg(feature = "spam-dnsbl")]
pub use dnsbl::DnsblSpamChecker;

#[cfg(feature = "spam-dnsbl")]
mod dnsbl {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::*;

    /// Looks the poster's IPv4 address up in a DNS block list
    /// (Spamhaus ZEN by default). A listed address is spam; a lookup that
    /// times out is reported as unavailable.
    #[derive(Debug, Clone)]
    pub struct DnsblSpamChecker {
        zone: String,
        timeout: Duration,
    }

    impl Default for DnsblSpamChecker {
        fn default() -> Self {
            Self::new("zen.spamhaus.org", Duration::from_secs(2))
        }
    }

    impl DnsblSpamChecker {
        pub fn new(zone: impl Into<String>, timeout: Duration) -> Self {
            Self {
                zone: zone.into(),
                timeout,
            }
        }

        pub(crate) fn query_name(&self, ip: Ipv4Addr) -> String {
            let [a, b, c, d] = ip.octets();
            format!("{d}.{c}.{b}.{a}.{}", self.zone)
        }
    }

    #[async_trait]
    impl SpamChecker for DnsblSpamChecker {
        async fn check(&self, submission: &SpamSubmission) -> SpamVerdict {
            let Ok(IpAddr::V4(ip)) = submission.ip.parse::<IpAddr>() else {
                return SpamVerdict::Ham;
            };
            let name = self.query_name(ip);
            match tokio::time::timeout(self.timeout, tokio::net::lookup_host((name.as_str(), 0))).await {
                Ok(Ok(mut addrs)) if addrs.next().is_some() => {
                    tracing::info!(%ip, zone = %self.zone, "address is block listed");
                    SpamVerdict::Spam
                }
                // NXDOMAIN: not listed
                Ok(_) => SpamVerdict::Ham,
                Err(_) => SpamVerdict::Unavailable,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn octets_are_reversed_under_the_zone() {
            let checker = DnsblSpamChecker::default();
            assert_eq!(
                checker.query_name(Ipv4Addr::new(192, 0, 2, 99)),
                "99.2.0.192.zen.spamhaus.org"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SpamVerdict);

    #[async_trait]
    impl SpamChecker for Fixed {
        async fn check(&self, _submission: &SpamSubmission) -> SpamVerdict {
            self.0
        }
    }

    fn submission() -> SpamSubmission {
        SpamSubmission {
            ip: "192.0.2.1".into(),
            user_agent: String::new(),
            referer: String::new(),
            name: String::new(),
            email: String::new(),
            message: "buy now".into(),
        }
    }

    #[tokio::test]
    async fn no_spam_check_accepts_everything() {
        assert_eq!(NoSpamCheck.check(&submission()).await, SpamVerdict::Ham);
    }

    #[tokio::test]
    async fn combined_check_prefers_spam_over_outages() {
        let down: Arc<dyn SpamChecker> = Arc::new(Fixed(SpamVerdict::Unavailable));
        let listed: Arc<dyn SpamChecker> = Arc::new(Fixed(SpamVerdict::Spam));
        let clean: Arc<dyn SpamChecker> = Arc::new(Fixed(SpamVerdict::Ham));

        let all = CombinedSpamCheck::new(vec![down.clone(), listed, clean.clone()]);
        assert_eq!(all.check(&submission()).await, SpamVerdict::Spam);

        let degraded = CombinedSpamCheck::new(vec![clean.clone(), down]);
        assert_eq!(degraded.check(&submission()).await, SpamVerdict::Unavailable);

        assert_eq!(CombinedSpamCheck::default().check(&submission()).await, SpamVerdict::Ham);
    }
}
