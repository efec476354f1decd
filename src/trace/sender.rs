use crate::config::udp_port_span;
use crate::error::{Error, Result};
use crate::packet;
use crate::probe::ProbeKey;
use crate::socket::icmp::AsyncIcmpSocket;
use crate::socket::udp::AsyncUdpSocket;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Builds and transmits single probes at a requested TTL / hop limit.
#[async_trait]
pub trait ProbeSender: Send {
    /// The matching key of the probe carrying `sequence`.
    fn probe_key(&self, sequence: u16) -> ProbeKey;

    /// Transmits one probe. Returns once the send call has completed.
    async fn send(&mut self, ttl: u8, key: ProbeKey) -> Result<()>;
}

/// Maps the UDP destination ports onto `[base, u16::MAX]`.
pub(crate) fn udp_dst_port(base_port: u16, sequence: u16) -> u16 {
    let offset = u32::from(sequence) % udp_port_span(base_port);
    // base + offset <= u16::MAX by construction of the span
    u16::try_from(u32::from(base_port) + offset).unwrap_or(u16::MAX)
}

enum Mode {
    Icmp {
        socket: Arc<AsyncIcmpSocket>,
        identifier: u16,
    },
    Udp {
        socket: AsyncUdpSocket,
        src_port: u16,
        base_port: u16,
    },
}

/// Probe sender backed by real sockets.
///
/// In ICMP mode the raw socket is shared with the listener task; in UDP mode probes leave
/// from a datagram socket bound to an ephemeral port.
pub struct SocketSender {
    mode: Mode,
    target: IpAddr,
    source: Option<IpAddr>,
    packet_size: usize,
}

impl SocketSender {
    pub fn icmp(
        socket: Arc<AsyncIcmpSocket>,
        target: IpAddr,
        identifier: u16,
        packet_size: u16,
    ) -> Self {
        Self {
            mode: Mode::Icmp { socket, identifier },
            target,
            source: None,
            packet_size: usize::from(packet_size),
        }
    }

    pub fn udp(
        socket: AsyncUdpSocket,
        target: IpAddr,
        base_port: u16,
        packet_size: u16,
    ) -> Result<Self> {
        let src_port = socket.local_port()?;
        Ok(Self {
            mode: Mode::Udp {
                socket,
                src_port,
                base_port,
            },
            target,
            source: None,
            packet_size: usize::from(packet_size),
        })
    }

    /// Local address used for the ICMPv6 pseudo-header checksum.
    pub fn with_source(mut self, source: Option<IpAddr>) -> Self {
        self.source = source;
        self
    }

    fn echo_packet(&self, identifier: u16, sequence: u16, ttl: u8) -> Vec<u8> {
        match (self.source, self.target) {
            (_, IpAddr::V4(_)) => {
                packet::build_icmpv4_echo_packet(identifier, sequence, ttl, self.packet_size)
            }
            (Some(IpAddr::V6(src)), IpAddr::V6(dst)) => packet::build_icmpv6_echo_packet(
                identifier,
                sequence,
                ttl,
                self.packet_size,
                Some((src, dst)),
            ),
            (_, IpAddr::V6(_)) => {
                packet::build_icmpv6_echo_packet(identifier, sequence, ttl, self.packet_size, None)
            }
        }
    }

    fn send_error(addr: SocketAddr, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Error::Permission {
                socket: "probe",
                source: err,
            }
        } else {
            Error::Transmit { addr, source: err }
        }
    }
}

#[async_trait]
impl ProbeSender for SocketSender {
    fn probe_key(&self, sequence: u16) -> ProbeKey {
        match &self.mode {
            Mode::Icmp { identifier, .. } => ProbeKey::Echo {
                identifier: *identifier,
                sequence,
            },
            Mode::Udp {
                src_port,
                base_port,
                ..
            } => ProbeKey::Udp {
                src_port: *src_port,
                dst_port: udp_dst_port(*base_port, sequence),
            },
        }
    }

    async fn send(&mut self, ttl: u8, key: ProbeKey) -> Result<()> {
        match (&self.mode, key) {
            (Mode::Icmp { socket, .. }, ProbeKey::Echo { identifier, sequence }) => {
                let addr = SocketAddr::new(self.target, 0);
                let buf = self.echo_packet(identifier, sequence, ttl);
                socket
                    .set_ttl(ttl)
                    .map_err(|e| Self::send_error(addr, e))?;
                socket
                    .send_to(&buf, addr)
                    .await
                    .map_err(|e| Self::send_error(addr, e))?;
            }
            (Mode::Udp { socket, base_port, .. }, ProbeKey::Udp { dst_port, .. }) => {
                let addr = SocketAddr::new(self.target, dst_port);
                // the payload carries the port offset so captures can be read back
                let sequence = dst_port.wrapping_sub(*base_port);
                let buf = packet::build_udp_payload(ttl, sequence, self.packet_size);
                socket
                    .set_ttl(ttl)
                    .map_err(|e| Self::send_error(addr, e))?;
                socket
                    .send_to(&buf, addr)
                    .await
                    .map_err(|e| Self::send_error(addr, e))?;
            }
            (_, key) => {
                return Err(Error::BadConfig(format!(
                    "probe key {:?} does not match the sender protocol",
                    key
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_ports_stay_in_range() {
        assert_eq!(udp_dst_port(33434, 0), 33434);
        assert_eq!(udp_dst_port(33434, 7), 33441);
        assert_eq!(udp_dst_port(65535, 9), 65535);
        assert_eq!(udp_dst_port(65530, 6), 65530);
        assert_eq!(udp_dst_port(65530, 5), 65535);
    }

    #[test]
    fn test_udp_ports_unique_for_accepted_config() {
        let cfg = crate::TraceConfig::new("h")
            .with_protocol(crate::Protocol::Udp)
            .with_udp_base_port(65416);
        assert!(cfg.validate().is_ok());
        let max_probes = u16::from(cfg.max_hops) * (u16::from(cfg.max_retries) + 1);
        let ports: std::collections::HashSet<u16> = (0..max_probes)
            .map(|sequence| udp_dst_port(cfg.udp_base_port, sequence))
            .collect();
        assert_eq!(ports.len(), usize::from(max_probes));
    }

    #[test]
    fn test_permission_denied_on_send() {
        let addr: SocketAddr = "192.0.2.1:0".parse().unwrap();
        let err = SocketSender::send_error(
            addr,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, Error::Permission { .. }));
        let err = SocketSender::send_error(
            addr,
            io::Error::new(io::ErrorKind::Other, "network unreachable"),
        );
        assert!(err.is_per_probe());
    }
}
