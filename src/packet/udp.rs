use super::UDP_HEADER_LEN;
use crate::probe::ProbeKey;
use pnet_packet::udp::UdpPacket;

/// Builds the payload of a UDP probe so that the datagram is `packet_size` bytes long.
pub fn build_udp_payload(ttl: u8, sequence: u16, packet_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; packet_size.saturating_sub(UDP_HEADER_LEN)];
    super::fill_payload(&mut buf, ttl, sequence);
    buf
}

/// Reads the ports of a quoted UDP header.
pub(super) fn quoted_key(inner: &[u8]) -> Option<ProbeKey> {
    let udp = UdpPacket::new(inner)?;
    Some(ProbeKey::Udp {
        src_port: udp.get_source(),
        dst_port: udp.get_destination(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_size_excludes_header() {
        assert_eq!(build_udp_payload(1, 1, 64).len(), 56);
        assert_eq!(build_udp_payload(1, 1, 4).len(), 0);
    }

    #[test]
    fn test_quoted_key() {
        let header = [0xd4, 0x31, 0x82, 0x9b, 0x00, 0x40, 0x00, 0x00];
        assert_eq!(
            quoted_key(&header),
            Some(ProbeKey::Udp {
                src_port: 54321,
                dst_port: 33435,
            })
        );
        assert_eq!(quoted_key(&header[..4]), None);
    }
}
