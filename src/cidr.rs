//! IPv4 CIDR block parsing and containment.

use ipnet::{IpNet, Ipv4Net};
use std::net::IpAddr;

use crate::error::AuditError;

/// Parse a CIDR block, normalising away host bits.
///
/// A bare address is treated as a /32. IPv6 input is rejected with
/// [`AuditError::NotIpv4`] so callers can tell it apart from garbage.
pub fn parse_block(s: &str) -> Result<Ipv4Net, AuditError> {
    let trimmed = s.trim();
    let net: IpNet = if trimmed.contains('/') {
        trimmed
            .parse()
            .map_err(|_| AuditError::InvalidPrefix(trimmed.to_string()))?
    } else {
        trimmed
            .parse::<IpAddr>()
            .map(IpNet::from)
            .map_err(|_| AuditError::InvalidPrefix(trimmed.to_string()))?
    };

    match net {
        IpNet::V4(v4) => Ok(v4.trunc()),
        IpNet::V6(_) => Err(AuditError::NotIpv4(trimmed.to_string())),
    }
}

/// Check if `outer` covers `inner`.
///
/// True when `inner` is at least as specific as `outer` and its network,
/// masked to `outer`'s length, equals `outer`'s network. A block covers itself.
pub fn covers(outer: &Ipv4Net, inner: &Ipv4Net) -> bool {
    inner.prefix_len() >= outer.prefix_len()
        && mask(u32::from(inner.network()), outer.prefix_len()) == u32::from(outer.network())
}

/// Keep the leading `len` bits of `addr`.
pub fn mask(addr: u32, len: u8) -> u32 {
    match len {
        0 => 0,
        l if l >= 32 => addr,
        l => addr & (u32::MAX << (32 - l)),
    }
}

/// The bit of `addr` at `depth`, counting from the most significant bit.
pub(crate) fn bit_at(addr: u32, depth: u8) -> usize {
    ((addr >> (31 - depth)) & 1) as usize
}

/// Number of addresses in a block.
pub fn address_count(block: &Ipv4Net) -> u64 {
    1u64 << (32 - block.prefix_len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_block_cidr() {
        let block = parse_block("44.0.0.0/10").unwrap();
        assert_eq!(block, net("44.0.0.0/10"));
    }

    #[test]
    fn test_parse_block_bare_address() {
        let block = parse_block("44.1.2.3").unwrap();
        assert_eq!(block.prefix_len(), 32);
    }

    #[test]
    fn test_parse_block_normalises_host_bits() {
        let block = parse_block("44.1.2.3/24").unwrap();
        assert_eq!(block, net("44.1.2.0/24"));
    }

    #[test]
    fn test_parse_block_whitespace() {
        assert!(parse_block("  44.1.2.0/24\n").is_ok());
    }

    #[test]
    fn test_parse_block_rejects_ipv6() {
        let err = parse_block("2001:db8::/32").unwrap_err();
        assert!(matches!(err, AuditError::NotIpv4(_)));
    }

    #[test]
    fn test_parse_block_invalid() {
        for bad in ["", "44.0.0.0/33", "not-a-prefix", "44.0.0/8", "256.0.0.0/8"] {
            let err = parse_block(bad).unwrap_err();
            assert!(matches!(err, AuditError::InvalidPrefix(_)), "{}", bad);
        }
    }

    #[test]
    fn test_covers() {
        assert!(covers(&net("44.0.0.0/10"), &net("44.0.1.0/24")));
        assert!(covers(&net("44.0.0.0/10"), &net("44.0.0.0/10")));
        assert!(!covers(&net("44.0.1.0/24"), &net("44.0.0.0/10")));
        assert!(!covers(&net("44.64.0.0/10"), &net("44.0.1.0/24")));
        assert!(covers(&net("0.0.0.0/0"), &net("44.0.1.0/24")));
    }

    #[test]
    fn test_mask() {
        let addr = u32::from(std::net::Ipv4Addr::new(44, 130, 7, 9));
        assert_eq!(mask(addr, 0), 0);
        assert_eq!(mask(addr, 32), addr);
        assert_eq!(mask(addr, 8), u32::from(std::net::Ipv4Addr::new(44, 0, 0, 0)));
    }

    #[test]
    fn test_address_count() {
        assert_eq!(address_count(&net("44.0.0.0/8")), 16_777_216);
        assert_eq!(address_count(&net("0.0.0.0/0")), 1u64 << 32);
        assert_eq!(address_count(&net("44.1.2.3/32")), 1);
    }
}
