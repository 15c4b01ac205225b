//! Address ranges for network-matching directives.

use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
    #[error("invalid network prefix: {0}")]
    InvalidPrefix(String),
}

/// A network range: base address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    /// Build a range from an address literal and an optional textual
    /// prefix length. An absent prefix is a host route (/32 or /128,
    /// inferred from the address family).
    pub fn new(addr: &str, prefix: Option<&str>) -> Result<Network, NetworkError> {
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| NetworkError::InvalidAddress(addr.to_string()))?;
        Self::from_ip(addr, prefix)
    }

    /// Build a range around an already-parsed address.
    pub fn from_ip(addr: IpAddr, prefix: Option<&str>) -> Result<Network, NetworkError> {
        let width: u8 = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            None => width,
            Some(p) => {
                let len: u8 = p
                    .parse()
                    .map_err(|_| NetworkError::InvalidPrefix(p.to_string()))?;
                if len > width {
                    return Err(NetworkError::InvalidPrefix(p.to_string()));
                }
                len
            }
        };
        Ok(Network { addr, prefix })
    }

    /// Whether `ip` falls inside this range. Always false across address
    /// families.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = !0u32 << (32 - self.prefix);
                (u32::from(ip) & mask) == (u32::from(net) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = !0u128 << (128 - self.prefix);
                (u128::from(ip) & mask) == (u128::from(net) & mask)
            }
            _ => false,
        }
    }
}

/// True iff `ip` falls inside at least one of `networks`. An empty slice
/// matches nothing.
pub fn any_contains(networks: &[Network], ip: IpAddr) -> bool {
    networks.iter().any(|n| n.contains(ip))
}
