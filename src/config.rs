use crate::dns::IpFamily;
use crate::error::{Error, Result};
use crate::protocol::Protocol;
use std::time::Duration;

/// Default maximum number of hops probed.
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Default per-round response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default ICMP message / UDP datagram size, header included.
pub const DEFAULT_PACKET_SIZE: u16 = 64;
/// Default UDP base destination port.
pub const DEFAULT_UDP_BASE_PORT: u16 = 33434;
/// Default number of retries after the first attempt of a hop.
pub const DEFAULT_MAX_RETRIES: u8 = 3;
/// Default number of attempts sent back-to-back per round.
pub const DEFAULT_FAN_OUT: u8 = 1;
/// Default extra wait added to each retry round.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Default bound on a single reverse DNS lookup.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(1);

/// Smallest probe: an 8-byte header and 8 bytes of payload.
pub const MIN_PACKET_SIZE: u16 = 16;
/// Largest probe that fits a 1500-byte MTU behind an IPv6 header.
pub const MAX_PACKET_SIZE: u16 = 1452;
/// Upper bound on `max_retries`.
pub const MAX_RETRIES_LIMIT: u8 = 16;
/// Upper bound on `timeout`, `retry_backoff` and `dns_timeout`.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Number of distinct UDP destination ports in `[base, u16::MAX]`.
pub(crate) fn udp_port_span(base_port: u16) -> u32 {
    u32::from(u16::MAX) - u32::from(base_port) + 1
}

/// Configuration of a single trace.
#[derive(Clone, Debug)]
pub struct TraceConfig {
    /// Host name or IP address literal to trace.
    pub target: String,
    /// Highest TTL / hop limit probed.
    pub max_hops: u8,
    /// How long each round of attempts waits for a reply.
    pub timeout: Duration,
    /// ICMP message / UDP datagram size in bytes, header included.
    pub packet_size: u16,
    pub protocol: Protocol,
    /// Reverse resolve responding hops.
    pub resolve_dns: bool,
    /// Attempts made after the first one before a hop is reported as timed out.
    pub max_retries: u8,
    /// Log the full probe conversation at debug level.
    pub debug_mode: bool,
    /// Require an IPv6 target. Otherwise IPv4 is preferred with fallback to IPv6.
    pub ipv6: bool,
    /// UDP destination ports start here.
    pub udp_base_port: u16,
    /// Attempts sent back-to-back in each round.
    pub fan_out: u8,
    /// Extra wait added per retry round.
    pub retry_backoff: Duration,
    /// Bound on each reverse DNS lookup.
    pub dns_timeout: Duration,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            max_hops: DEFAULT_MAX_HOPS,
            timeout: DEFAULT_TIMEOUT,
            packet_size: DEFAULT_PACKET_SIZE,
            protocol: Protocol::default(),
            resolve_dns: true,
            max_retries: DEFAULT_MAX_RETRIES,
            debug_mode: false,
            ipv6: false,
            udp_base_port: DEFAULT_UDP_BASE_PORT,
            fan_out: DEFAULT_FAN_OUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }
}

impl TraceConfig {
    /// Creates a configuration with default settings for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_packet_size(mut self, packet_size: u16) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_resolve_dns(mut self, resolve_dns: bool) -> Self {
        self.resolve_dns = resolve_dns;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    pub fn with_udp_base_port(mut self, port: u16) -> Self {
        self.udp_base_port = port;
        self
    }

    pub fn with_fan_out(mut self, fan_out: u8) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// The address family requested for the target.
    pub fn family(&self) -> IpFamily {
        if self.ipv6 {
            IpFamily::Ipv6
        } else {
            IpFamily::Any
        }
    }

    /// Checks every option before any I/O is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::BadConfig(String::from("target must not be empty")));
        }
        if self.max_hops == 0 {
            return Err(Error::BadConfig(String::from(
                "max_hops must be between 1 and 255",
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::BadConfig(String::from("timeout must be positive")));
        }
        for (name, wait) in [
            ("timeout", self.timeout),
            ("retry_backoff", self.retry_backoff),
            ("dns_timeout", self.dns_timeout),
        ] {
            if wait > MAX_WAIT {
                return Err(Error::BadConfig(format!(
                    "{} {:?} exceeds {:?}",
                    name, wait, MAX_WAIT
                )));
            }
        }
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&self.packet_size) {
            return Err(Error::BadConfig(format!(
                "packet_size {} outside {}..={}",
                self.packet_size, MIN_PACKET_SIZE, MAX_PACKET_SIZE
            )));
        }
        if self.fan_out == 0 {
            return Err(Error::BadConfig(String::from("fan_out must be at least 1")));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(Error::BadConfig(format!(
                "max_retries {} exceeds {}",
                self.max_retries, MAX_RETRIES_LIMIT
            )));
        }
        if self.udp_base_port == 0 {
            return Err(Error::BadConfig(String::from(
                "udp_base_port must be non-zero",
            )));
        }
        // every probe of a trace needs its own destination port
        let max_probes = u32::from(self.max_hops) * (u32::from(self.max_retries) + 1);
        if self.protocol == Protocol::Udp && udp_port_span(self.udp_base_port) < max_probes {
            return Err(Error::BadConfig(format!(
                "udp_base_port {} leaves fewer than {} ports",
                self.udp_base_port, max_probes
            )));
        }
        Ok(())
    }
}
