//! Matching submitter addresses against ban entries.

use std::net::IpAddr;

/// True when `ip` equals `pattern` or falls inside the CIDR range `pattern`.
/// Unparseable values only match by exact string equality.
pub fn ip_matches(pattern: &str, ip: &str) -> bool {
    let pattern = pattern.trim();
    if pattern == ip {
        return true;
    }
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return false;
    };
    match pattern.split_once('/') {
        Some((network, prefix)) => {
            let (Ok(network), Ok(prefix)) = (network.parse::<IpAddr>(), prefix.parse::<u32>()) else {
                return false;
            };
            in_range(network, prefix, addr)
        }
        None => pattern.parse::<IpAddr>().is_ok_and(|single| single == addr),
    }
}

fn in_range(network: IpAddr, prefix: u32, addr: IpAddr) -> bool {
    match (network, addr) {
        (IpAddr::V4(net), IpAddr::V4(addr)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(net) & mask == u32::from(addr) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(net) & mask == u128::from(addr) & mask
        }
        _ => false,
    }
}

/// Whether the string is an address or CIDR range a ban can hold.
pub fn is_valid_ban_target(pattern: &str) -> bool {
    match pattern.split_once('/') {
        Some((network, prefix)) => match (network.parse::<IpAddr>(), prefix.parse::<u32>()) {
            (Ok(IpAddr::V4(_)), Ok(p)) => p <= 32,
            (Ok(IpAddr::V6(_)), Ok(p)) => p <= 128,
            _ => false,
        },
        None => pattern.parse::<IpAddr>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_address() {
        assert!(ip_matches("192.0.2.7", "192.0.2.7"));
        assert!(!ip_matches("192.0.2.7", "192.0.2.8"));
    }

    #[test]
    fn ipv4_range() {
        assert!(ip_matches("203.0.113.0/24", "203.0.113.200"));
        assert!(!ip_matches("203.0.113.0/24", "203.0.114.1"));
        assert!(ip_matches("0.0.0.0/0", "198.51.100.1"));
    }

    #[test]
    fn ipv6_range() {
        assert!(ip_matches("2001:db8::/32", "2001:db8:1::5"));
        assert!(!ip_matches("2001:db8::/32", "2001:db9::1"));
    }

    #[test]
    fn family_mismatch_never_matches() {
        assert!(!ip_matches("192.0.2.0/24", "2001:db8::1"));
    }

    #[test]
    fn validates_ban_targets() {
        assert!(is_valid_ban_target("192.0.2.1"));
        assert!(is_valid_ban_target("192.0.2.0/24"));
        assert!(!is_valid_ban_target("192.0.2.0/33"));
        assert!(!is_valid_ban_target("not an ip"));
    }
}
