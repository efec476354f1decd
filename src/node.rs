use crate::probe::ResponseKind;
use std::net::IpAddr;
use std::time::Duration;

/// Hop role in traceroute results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    /// Transit router (non-final hop)
    Relay,
    /// Final destination
    Destination,
    /// No reply before every attempt ran out
    Silent,
}

/// Probe result for a single hop.
///
/// Produced once per TTL and never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct HopResult {
    /// Hop number, equal to the TTL / hop limit probed
    pub hop: u8,
    /// Responding address, `None` when the hop stayed silent
    pub ip_addr: Option<IpAddr>,
    /// Reverse resolved host name
    pub hostname: Option<String>,
    /// Round-trip time of the winning attempt
    pub rtt: Option<Duration>,
    /// Attempts transmitted for this hop, failed sends included
    pub attempts_used: u8,
    pub is_timeout: bool,
    pub is_destination: bool,
    /// Earlier hop that answered from the same address
    pub loop_of: Option<u8>,
    /// How the hop answered
    pub kind: Option<ResponseKind>,
    /// TTL of the received IPv4 reply
    pub reply_ttl: Option<u8>,
}

impl HopResult {
    /// A hop for which no attempt received a reply.
    pub fn silent(hop: u8, attempts_used: u8) -> Self {
        Self {
            hop,
            ip_addr: None,
            hostname: None,
            rtt: None,
            attempts_used,
            is_timeout: true,
            is_destination: false,
            loop_of: None,
            kind: None,
            reply_ttl: None,
        }
    }

    pub fn node_type(&self) -> NodeType {
        if self.is_destination {
            NodeType::Destination
        } else if self.ip_addr.is_some() {
            NodeType::Relay
        } else {
            NodeType::Silent
        }
    }

    pub fn is_loop(&self) -> bool {
        self.loop_of.is_some()
    }

    /// Round-trip time in milliseconds.
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt.map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Estimated hops on the return path, from the TTL left in the reply.
    pub fn return_hops(&self) -> Option<u8> {
        self.reply_ttl
            .map(|ttl| guess_initial_ttl(ttl).saturating_sub(ttl))
    }
}

/// One element of the trace sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct HopEvent {
    pub hop: HopResult,
    /// Fraction of `max_hops` probed so far, in `[0, 1]`
    pub progress: f64,
    pub is_destination: bool,
}

pub(crate) fn guess_initial_ttl(ttl: u8) -> u8 {
    if ttl <= 64 {
        64
    } else if ttl <= 128 {
        128
    } else {
        255
    }
}
