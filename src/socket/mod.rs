pub mod icmp;
pub mod udp;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// IP address family of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketFamily {
    Ipv4,
    Ipv6,
}

impl SocketFamily {
    pub fn from_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => SocketFamily::Ipv4,
            IpAddr::V6(_) => SocketFamily::Ipv6,
        }
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, SocketFamily::Ipv4)
    }

    pub fn to_domain(&self) -> socket2::Domain {
        match self {
            SocketFamily::Ipv4 => socket2::Domain::IPV4,
            SocketFamily::Ipv6 => socket2::Domain::IPV6,
        }
    }

    pub fn icmp_protocol(&self) -> socket2::Protocol {
        match self {
            SocketFamily::Ipv4 => socket2::Protocol::ICMPV4,
            SocketFamily::Ipv6 => socket2::Protocol::ICMPV6,
        }
    }

    /// Name of the raw ICMP socket of this family, used in error messages.
    pub fn raw_icmp_name(&self) -> &'static str {
        match self {
            SocketFamily::Ipv4 => "raw ICMPv4",
            SocketFamily::Ipv6 => "raw ICMPv6",
        }
    }

    /// The wildcard address of this family with an ephemeral port.
    pub fn unspecified(&self) -> SocketAddr {
        match self {
            SocketFamily::Ipv4 => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketFamily::Ipv6 => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }
}

/// Sets the IPv4 TTL or IPv6 unicast hop limit of a socket.
pub(crate) fn set_hop_limit(
    socket: &tokio::net::UdpSocket,
    family: SocketFamily,
    ttl: u8,
) -> std::io::Result<()> {
    let sock_ref = socket2::SockRef::from(socket);
    match family {
        SocketFamily::Ipv4 => sock_ref.set_ttl(u32::from(ttl)),
        SocketFamily::Ipv6 => sock_ref.set_unicast_hops_v6(u32::from(ttl)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_ip() {
        assert_eq!(
            SocketFamily::from_ip(&IpAddr::V4(Ipv4Addr::LOCALHOST)),
            SocketFamily::Ipv4
        );
        assert_eq!(
            SocketFamily::from_ip(&IpAddr::V6(Ipv6Addr::LOCALHOST)),
            SocketFamily::Ipv6
        );
        assert!(SocketFamily::Ipv6.unspecified().is_ipv6());
    }
}
