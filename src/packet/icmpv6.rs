use super::{ICMP_HEADER_LEN, IPV6_HEADER_LEN};
use crate::probe::{ProbeKey, ProbeResponse, ResponseKind};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv6::Ipv6Packet;
use std::net::{IpAddr, Ipv6Addr};
use tokio::time::Instant;

/// Builds an ICMPv6 Echo-Request of `packet_size` bytes.
///
/// The checksum covers the IPv6 pseudo-header, so it is only filled in when the source and
/// destination are known. Raw ICMPv6 sockets recompute it in the kernel either way.
pub fn build_icmpv6_echo_packet(
    identifier: u16,
    sequence: u16,
    ttl: u8,
    packet_size: usize,
    addrs: Option<(Ipv6Addr, Ipv6Addr)>,
) -> Vec<u8> {
    let mut buf = vec![0u8; packet_size.max(ICMP_HEADER_LEN)];
    buf[4..6].copy_from_slice(&identifier.to_be_bytes());
    buf[6..8].copy_from_slice(&sequence.to_be_bytes());
    super::fill_payload(&mut buf[ICMP_HEADER_LEN..], ttl, sequence);
    if let Some(mut icmp) = MutableIcmpv6Packet::new(&mut buf) {
        icmp.set_icmpv6_type(Icmpv6Types::EchoRequest);
        icmp.set_icmpv6_code(Icmpv6Code::new(0));
        if let Some((src, dst)) = addrs {
            let checksum = pnet_packet::icmpv6::checksum(&icmp.to_immutable(), &src, &dst);
            icmp.set_checksum(checksum);
        }
    }
    buf
}

/// Decodes a message read from a raw ICMPv6 socket, which carries no IP header.
pub(super) fn parse(buf: &[u8], source: IpAddr, received_at: Instant) -> Option<ProbeResponse> {
    if buf.len() < ICMP_HEADER_LEN {
        return None;
    }
    let icmp = Icmpv6Packet::new(buf)?;
    let (kind, key) = match icmp.get_icmpv6_type() {
        Icmpv6Types::EchoReply => (ResponseKind::EchoReply, echo_key(buf)),
        Icmpv6Types::TimeExceeded => (
            ResponseKind::TimeExceeded,
            quoted_key(&buf[ICMP_HEADER_LEN..])?,
        ),
        Icmpv6Types::DestinationUnreachable => (
            ResponseKind::DestinationUnreachable {
                code: icmp.get_icmpv6_code().0,
            },
            quoted_key(&buf[ICMP_HEADER_LEN..])?,
        ),
        _ => return None,
    };
    Some(ProbeResponse {
        source,
        kind,
        key,
        received_at,
        reply_ttl: None,
    })
}

/// Identifier and sequence of an echo message of at least [`ICMP_HEADER_LEN`] bytes.
fn echo_key(echo: &[u8]) -> ProbeKey {
    ProbeKey::Echo {
        identifier: u16::from_be_bytes([echo[4], echo[5]]),
        sequence: u16::from_be_bytes([echo[6], echo[7]]),
    }
}

/// Reads the probe key from the original packet quoted in an ICMPv6 error.
fn quoted_key(original: &[u8]) -> Option<ProbeKey> {
    let ip = Ipv6Packet::new(original)?;
    let inner = original.get(IPV6_HEADER_LEN..)?;
    match ip.get_next_header() {
        IpNextHeaderProtocols::Icmpv6 => {
            let echo = Icmpv6Packet::new(inner)?;
            if echo.get_icmpv6_type() != Icmpv6Types::EchoRequest || inner.len() < ICMP_HEADER_LEN
            {
                return None;
            }
            Some(echo_key(inner))
        }
        IpNextHeaderProtocols::Udp => super::udp::quoted_key(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x10);
    const ROUTER: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x1);
    const TARGET: Ipv6Addr = Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888);

    fn ipv6_header(next_header: u8, payload_len: u16) -> Vec<u8> {
        let mut header = vec![0x60, 0, 0, 0];
        header.extend_from_slice(&payload_len.to_be_bytes());
        header.extend_from_slice(&[next_header, 1]);
        header.extend_from_slice(&LOCAL.octets());
        header.extend_from_slice(&TARGET.octets());
        header
    }

    #[test]
    fn test_build_echo_request() {
        let packet = build_icmpv6_echo_packet(0x0102, 9, 4, 64, Some((LOCAL, TARGET)));
        assert_eq!(packet.len(), 64);
        assert_eq!(packet[0], 128);
        assert_eq!(echo_key(&packet), ProbeKey::Echo { identifier: 0x0102, sequence: 9 });
        let icmp = Icmpv6Packet::new(&packet).unwrap();
        assert_eq!(
            icmp.get_checksum(),
            pnet_packet::icmpv6::checksum(&icmp, &LOCAL, &TARGET)
        );

        let unchecked = build_icmpv6_echo_packet(0x0102, 9, 4, 64, None);
        assert_eq!(&unchecked[2..4], &[0, 0]);
    }

    #[test]
    fn test_parse_time_exceeded_echo() {
        let request = build_icmpv6_echo_packet(0x0102, 9, 4, 64, None);
        let mut message = vec![3, 0, 0, 0, 0, 0, 0, 0];
        message.extend_from_slice(&ipv6_header(58, 64));
        message.extend_from_slice(&request[..8]);
        let response = parse(&message, IpAddr::V6(ROUTER), Instant::now()).unwrap();
        assert_eq!(response.kind, ResponseKind::TimeExceeded);
        assert_eq!(response.source, IpAddr::V6(ROUTER));
        assert_eq!(response.key, ProbeKey::Echo { identifier: 0x0102, sequence: 9 });
        assert_eq!(response.reply_ttl, None);
    }

    #[test]
    fn test_parse_port_unreachable_udp() {
        let mut message = vec![1, 4, 0, 0, 0, 0, 0, 0];
        message.extend_from_slice(&ipv6_header(17, 64));
        message.extend_from_slice(&[0xd4, 0x31, 0x82, 0x9b, 0x00, 0x40, 0x00, 0x00]);
        let response = parse(&message, IpAddr::V6(TARGET), Instant::now()).unwrap();
        assert!(response.kind.is_port_unreachable(false));
        assert_eq!(response.key, ProbeKey::Udp { src_port: 54321, dst_port: 33435 });
    }

    #[test]
    fn test_parse_echo_reply() {
        let mut reply = build_icmpv6_echo_packet(0x0102, 9, 4, 16, None);
        reply[0] = 129;
        let response = parse(&reply, IpAddr::V6(Ipv6Addr::LOCALHOST), Instant::now()).unwrap();
        assert_eq!(response.kind, ResponseKind::EchoReply);
        assert_eq!(response.key, ProbeKey::Echo { identifier: 0x0102, sequence: 9 });
    }

    #[test]
    fn test_discard_unrelated() {
        let request = build_icmpv6_echo_packet(1, 1, 1, 16, None);
        assert!(parse(&request, IpAddr::V6(LOCAL), Instant::now()).is_none());

        // neighbour solicitation
        let mut ns = vec![135, 0, 0, 0, 0, 0, 0, 0];
        ns.extend_from_slice(&TARGET.octets());
        assert!(parse(&ns, IpAddr::V6(ROUTER), Instant::now()).is_none());

        let mut truncated = vec![3, 0, 0, 0, 0, 0, 0, 0];
        truncated.extend_from_slice(&ipv6_header(58, 64)[..30]);
        assert!(parse(&truncated, IpAddr::V6(ROUTER), Instant::now()).is_none());
    }
}
