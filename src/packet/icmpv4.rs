use super::{ICMP_HEADER_LEN, IPV4_MIN_HEADER_LEN};
use crate::probe::{ProbeKey, ProbeResponse, ResponseKind};
use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use std::net::IpAddr;
use tokio::time::Instant;

/// Builds an ICMP Echo-Request of `packet_size` bytes with a valid checksum.
pub fn build_icmpv4_echo_packet(
    identifier: u16,
    sequence: u16,
    ttl: u8,
    packet_size: usize,
) -> Vec<u8> {
    let mut buf = vec![0u8; packet_size.max(ICMP_HEADER_LEN)];
    super::fill_payload(&mut buf[ICMP_HEADER_LEN..], ttl, sequence);
    if let Some(mut echo) = MutableEchoRequestPacket::new(&mut buf) {
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode::new(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
    }
    let checksum = IcmpPacket::new(&buf).map(|icmp| pnet_packet::icmp::checksum(&icmp));
    if let Some(checksum) = checksum {
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
    }
    buf
}

/// Decodes a datagram read from a raw ICMPv4 socket, IP header included.
pub(super) fn parse(buf: &[u8], received_at: Instant) -> Option<ProbeResponse> {
    let ip = Ipv4Packet::new(buf)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let header_len = usize::from(ip.get_header_length()) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return None;
    }
    let icmp_bytes = buf.get(header_len..)?;
    let icmp = IcmpPacket::new(icmp_bytes)?;
    let (kind, key) = match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let reply = EchoReplyPacket::new(icmp_bytes)?;
            let key = ProbeKey::Echo {
                identifier: reply.get_identifier(),
                sequence: reply.get_sequence_number(),
            };
            (ResponseKind::EchoReply, key)
        }
        IcmpTypes::TimeExceeded => (
            ResponseKind::TimeExceeded,
            quoted_key(icmp_bytes.get(ICMP_HEADER_LEN..)?)?,
        ),
        IcmpTypes::DestinationUnreachable => (
            ResponseKind::DestinationUnreachable {
                code: icmp.get_icmp_code().0,
            },
            quoted_key(icmp_bytes.get(ICMP_HEADER_LEN..)?)?,
        ),
        _ => return None,
    };
    Some(ProbeResponse {
        source: IpAddr::V4(ip.get_source()),
        kind,
        key,
        received_at,
        reply_ttl: Some(ip.get_ttl()),
    })
}

/// Reads the probe key from the original datagram quoted in an ICMP error.
fn quoted_key(original: &[u8]) -> Option<ProbeKey> {
    let ip = Ipv4Packet::new(original)?;
    let header_len = usize::from(ip.get_header_length()) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return None;
    }
    let inner = original.get(header_len..)?;
    match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Icmp => {
            let echo = EchoRequestPacket::new(inner)?;
            if echo.get_icmp_type() != IcmpTypes::EchoRequest {
                return None;
            }
            Some(ProbeKey::Echo {
                identifier: echo.get_identifier(),
                sequence: echo.get_sequence_number(),
            })
        }
        IpNextHeaderProtocols::Udp => super::udp::quoted_key(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const TARGET: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

    fn ipv4_header(proto: u8, ttl: u8, src: Ipv4Addr, dst: Ipv4Addr, total: usize) -> Vec<u8> {
        let mut header = vec![0x45, 0, 0, 0, 0, 0, 0, 0, ttl, proto, 0, 0];
        header[2..4].copy_from_slice(&(total as u16).to_be_bytes());
        header.extend_from_slice(&src.octets());
        header.extend_from_slice(&dst.octets());
        header
    }

    fn icmp_error(icmp_type: u8, code: u8, quoted: &[u8]) -> Vec<u8> {
        let mut icmp = vec![icmp_type, code, 0, 0, 0, 0, 0, 0];
        icmp.extend_from_slice(quoted);
        let mut packet = ipv4_header(1, 250, ROUTER, LOCAL, 20 + icmp.len());
        packet.extend_from_slice(&icmp);
        packet
    }

    fn quoted_echo(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut quoted = ipv4_header(1, 1, LOCAL, TARGET, 84);
        quoted.extend_from_slice(&build_icmpv4_echo_packet(identifier, sequence, 1, 64)[..8]);
        quoted
    }

    #[test]
    fn test_build_echo_request() {
        let packet = build_icmpv4_echo_packet(0xabcd, 7, 3, 64);
        assert_eq!(packet.len(), 64);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), 0xabcd);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 7);
        assert_eq!(packet[8], 3);
        let icmp = IcmpPacket::new(&packet).unwrap();
        let stored = u16::from_be_bytes([packet[2], packet[3]]);
        assert_eq!(stored, pnet_packet::icmp::checksum(&icmp));
        assert_ne!(stored, 0);
    }

    #[test]
    fn test_parse_time_exceeded_echo() {
        let packet = icmp_error(11, 0, &quoted_echo(0xabcd, 7));
        let response = parse(&packet, Instant::now()).unwrap();
        assert_eq!(response.source, IpAddr::V4(ROUTER));
        assert_eq!(response.kind, ResponseKind::TimeExceeded);
        assert_eq!(
            response.key,
            ProbeKey::Echo {
                identifier: 0xabcd,
                sequence: 7,
            }
        );
        assert_eq!(response.reply_ttl, Some(250));
    }

    #[test]
    fn test_parse_port_unreachable_udp() {
        let mut quoted = ipv4_header(17, 1, LOCAL, TARGET, 64);
        quoted.extend_from_slice(&[0xd4, 0x31, 0x82, 0x9b, 0x00, 0x2c, 0x00, 0x00]);
        let mut packet = icmp_error(3, 3, &quoted);
        packet[12..16].copy_from_slice(&TARGET.octets());
        let response = parse(&packet, Instant::now()).unwrap();
        assert_eq!(response.source, IpAddr::V4(TARGET));
        assert!(response.kind.is_port_unreachable(true));
        assert_eq!(
            response.key,
            ProbeKey::Udp {
                src_port: 54321,
                dst_port: 33435,
            }
        );
    }

    #[test]
    fn test_parse_echo_reply() {
        let mut reply = build_icmpv4_echo_packet(0x1234, 42, 5, 32);
        reply[0] = 0;
        let mut packet = ipv4_header(1, 60, TARGET, LOCAL, 20 + reply.len());
        packet.extend_from_slice(&reply);
        let response = parse(&packet, Instant::now()).unwrap();
        assert_eq!(response.kind, ResponseKind::EchoReply);
        assert_eq!(
            response.key,
            ProbeKey::Echo {
                identifier: 0x1234,
                sequence: 42,
            }
        );
    }

    #[test]
    fn test_discard_unrelated() {
        // our own echo request looped back
        let request = build_icmpv4_echo_packet(1, 1, 1, 32);
        let mut packet = ipv4_header(1, 64, LOCAL, LOCAL, 20 + request.len());
        packet.extend_from_slice(&request);
        assert!(parse(&packet, Instant::now()).is_none());

        // truncated quote
        let packet = icmp_error(11, 0, &quoted_echo(1, 1)[..24]);
        assert!(parse(&packet, Instant::now()).is_none());

        // not ICMP at all
        let packet = ipv4_header(6, 64, ROUTER, LOCAL, 20);
        assert!(parse(&packet, Instant::now()).is_none());

        assert!(parse(&[0x45, 0x00], Instant::now()).is_none());
    }
}
