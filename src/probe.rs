use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Key correlating an inbound ICMP message with the probe that caused it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeKey {
    /// ICMP mode: echo identifier (fixed per trace) and sequence (unique per probe).
    Echo { identifier: u16, sequence: u16 },
    /// UDP mode: source port (fixed per trace) and destination port (unique per probe).
    Udp { src_port: u16, dst_port: u16 },
}

/// One outbound probe attempt.
#[derive(Clone, Debug)]
pub struct Probe {
    pub ttl: u8,
    /// 1-based attempt number within its hop.
    pub attempt: u8,
    pub key: ProbeKey,
    /// Taken right after the transmit call returned.
    pub sent_at: Instant,
}

/// How a responder answered a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// TTL / hop limit expired in transit.
    TimeExceeded,
    /// Echo-Reply to an ICMP probe.
    EchoReply,
    /// Destination-Unreachable with the ICMP / ICMPv6 code.
    DestinationUnreachable { code: u8 },
}

impl ResponseKind {
    /// Port-Unreachable, the usual answer of a UDP target.
    pub fn is_port_unreachable(&self, v4: bool) -> bool {
        match self {
            ResponseKind::DestinationUnreachable { code } => {
                if v4 {
                    *code == 3
                } else {
                    *code == 4
                }
            }
            _ => false,
        }
    }
}

/// One inbound ICMP message decoded into a probe key.
#[derive(Clone, Debug)]
pub struct ProbeResponse {
    pub source: IpAddr,
    pub kind: ResponseKind,
    pub key: ProbeKey,
    pub received_at: Instant,
    /// TTL of the received IPv4 packet. Not available for IPv6.
    pub reply_ttl: Option<u8>,
}

/// A response matched with its outstanding probe.
#[derive(Clone, Debug)]
pub struct MatchedResponse {
    pub probe: Probe,
    pub response: ProbeResponse,
}

impl MatchedResponse {
    pub fn rtt(&self) -> Duration {
        self.response
            .received_at
            .saturating_duration_since(self.probe.sent_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_port_unreachable_codes() {
        let v4 = ResponseKind::DestinationUnreachable { code: 3 };
        let v6 = ResponseKind::DestinationUnreachable { code: 4 };
        assert!(v4.is_port_unreachable(true));
        assert!(!v4.is_port_unreachable(false));
        assert!(v6.is_port_unreachable(false));
        assert!(!ResponseKind::TimeExceeded.is_port_unreachable(true));
    }

    #[test]
    fn test_rtt_never_negative() {
        let now = Instant::now();
        let key = ProbeKey::Echo {
            identifier: 1,
            sequence: 1,
        };
        let matched = MatchedResponse {
            probe: Probe {
                ttl: 1,
                attempt: 1,
                key,
                sent_at: now + Duration::from_millis(5),
            },
            response: ProbeResponse {
                source: IpAddr::V4(Ipv4Addr::LOCALHOST),
                kind: ResponseKind::EchoReply,
                key,
                received_at: now,
                reply_ttl: None,
            },
        };
        assert_eq!(matched.rtt(), Duration::ZERO);
    }
}
