use std::fmt;
use std::str::FromStr;

/// Supported probe protocols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// ICMP (or ICMPv6) Echo-Request probes.
    #[default]
    Icmp,
    /// UDP datagrams to closed high ports.
    Udp,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Icmp => "icmp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(Protocol::Icmp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unsupported protocol: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_protocol() {
        assert_eq!("icmp".parse::<Protocol>().unwrap(), Protocol::Icmp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("tcp".parse::<Protocol>().is_err());
    }
}
