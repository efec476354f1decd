//! Probe encoding and ICMP response decoding.
//!
//! Outbound probes are an ICMP(v6) Echo-Request or a bare UDP payload; the kernel adds the
//! IP header and applies the TTL / hop limit set on the socket. Inbound messages are decoded
//! down to the [`ProbeKey`] of the probe that triggered them, reading the quoted original
//! datagram of Time-Exceeded and Destination-Unreachable errors.

mod icmpv4;
mod icmpv6;
mod udp;

pub use icmpv4::build_icmpv4_echo_packet;
pub use icmpv6::build_icmpv6_echo_packet;
pub use udp::build_udp_payload;

use crate::probe::ProbeResponse;
use crate::socket::SocketFamily;
use std::net::IpAddr;
use tokio::time::Instant;

/// Length of an ICMP / ICMPv6 echo or error header.
pub const ICMP_HEADER_LEN: usize = 8;
/// Length of a UDP header.
pub const UDP_HEADER_LEN: usize = 8;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
const PAYLOAD_FILL: u8 = 0x40;

/// Decodes one message read from a raw ICMP socket.
///
/// Returns `None` for anything that is not a reply to a traceroute probe.
pub fn parse_response(
    family: SocketFamily,
    buf: &[u8],
    from: IpAddr,
    received_at: Instant,
) -> Option<ProbeResponse> {
    match family {
        SocketFamily::Ipv4 => icmpv4::parse(buf, received_at),
        SocketFamily::Ipv6 => icmpv6::parse(buf, from, received_at),
    }
}

/// Writes the TTL and sequence at the head of the payload and pads the rest.
fn fill_payload(payload: &mut [u8], ttl: u8, sequence: u16) {
    let seq = sequence.to_be_bytes();
    let head = [ttl, seq[0], seq[1]];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = head.get(i).copied().unwrap_or(PAYLOAD_FILL);
    }
}
