use crate::error::{Error, Result};
use std::fmt;
use std::net::IpAddr;

/// Address family requested for the trace target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum IpFamily {
    /// Prefer IPv4, fall back to IPv6.
    #[default]
    Any,
    /// IPv4 only.
    Ipv4,
    /// IPv6 only.
    Ipv6,
}

impl IpFamily {
    fn accepts(&self, addr: &IpAddr) -> bool {
        match self {
            IpFamily::Any => true,
            IpFamily::Ipv4 => addr.is_ipv4(),
            IpFamily::Ipv6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::Any => write!(f, "any"),
            IpFamily::Ipv4 => write!(f, "IPv4"),
            IpFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Picks the address to trace from a lookup result.
///
/// A specific family never falls back to the other one.
pub fn select_address(addrs: &[IpAddr], family: IpFamily) -> Option<IpAddr> {
    match family {
        IpFamily::Any => addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied(),
        _ => addrs.iter().find(|addr| family.accepts(addr)).copied(),
    }
}

/// Resolves a host name or address literal to exactly one address of the requested family.
pub async fn resolve_target(target: &str, family: IpFamily) -> Result<IpAddr> {
    let host = target.trim().trim_start_matches('[').trim_end_matches(']');
    if let Ok(addr) = host.parse::<IpAddr>() {
        return select_address(&[addr], family).ok_or_else(|| Error::Resolution {
            target: target.to_string(),
            reason: format!("{} is not an {} address", addr, family),
        });
    }
    let name = host.to_string();
    let addrs = tokio::task::spawn_blocking(move || dns_lookup::lookup_host(&name))
        .await
        .map_err(|e| Error::Resolution {
            target: target.to_string(),
            reason: e.to_string(),
        })?
        .map_err(|e| Error::Resolution {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
    tracing::debug!(host = target, count = addrs.len(), "Resolved target addresses");
    select_address(&addrs, family).ok_or_else(|| Error::Resolution {
        target: target.to_string(),
        reason: format!("no {} address found", family),
    })
}
