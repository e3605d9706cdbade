use std::net::{IpAddr, SocketAddr};

use super::ResolutionError;

const DNS_PORT: u16 = 53;

/// One mail exchanger of a domain. Lower `priority` is preferred.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchanger {
    pub priority: u16,
    pub host: String,
}

impl Exchanger {
    pub fn new(priority: u16, host: impl Into<String>) -> Self {
        Self {
            priority,
            host: host.into(),
        }
    }

    /// Orders a caller-supplied list the same way a DNS answer is ordered.
    /// Equal priorities keep their encounter order.
    pub fn ordered(mut exchangers: Vec<Exchanger>) -> Result<Vec<Exchanger>, ResolutionError> {
        if exchangers.is_empty() {
            return Err(ResolutionError::NoMxRecords);
        }
        exchangers.sort_by_key(|exchanger| exchanger.priority);
        Ok(exchangers)
    }
}

/// Name servers used for MX lookups.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DnsServers {
    /// Whatever the host resolver configuration says.
    #[default]
    System,
    /// Explicit servers, `ip`, `ip:port` or `[ipv6]:port`.
    Custom(Vec<String>),
}

impl DnsServers {
    /// Parses the custom server list. Any malformed entry rejects the whole list.
    pub fn socket_addrs(&self) -> Result<Option<Vec<SocketAddr>>, ResolutionError> {
        let entries = match self {
            Self::System => return Ok(None),
            Self::Custom(entries) => entries,
        };
        if entries.is_empty() {
            return Err(ResolutionError::invalid_dns(None));
        }
        entries
            .iter()
            .map(|entry| {
                parse_server(entry).ok_or_else(|| ResolutionError::invalid_dns(Some(entry)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn parse_server(entry: &str) -> Option<SocketAddr> {
    let trimmed = entry.trim();
    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Some(addr);
    }
    trimmed
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
}
