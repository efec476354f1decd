use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A tracer result.
pub type Result<T> = std::result::Result<T, Error>;

/// A tracer error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not resolve target {target}: {reason}")]
    Resolution { target: String, reason: String },
    #[error(
        "permission denied creating {socket} socket: {source}; raw sockets require elevated \
         privileges (run as root/administrator or grant CAP_NET_RAW)"
    )]
    Permission {
        socket: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to transmit probe to {addr}: {source}")]
    Transmit {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if this error only affects a single probe attempt.
    ///
    /// Per-probe errors are absorbed into the hop state and never abort a trace.
    pub fn is_per_probe(&self) -> bool {
        matches!(self, Self::Transmit { .. })
    }

    /// Maps a socket creation error, promoting permission failures.
    pub(crate) fn from_socket(socket: &'static str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied || is_eperm(&err) {
            Self::Permission { socket, source: err }
        } else {
            Self::Io(err)
        }
    }
}

/// `EPERM` is not always reported as `PermissionDenied` by std.
fn is_eperm(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(1)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_probe_errors() {
        let transmit = Error::Transmit {
            addr: "192.0.2.1:33434".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::Other, "network unreachable"),
        };
        assert!(transmit.is_per_probe());
        assert!(!Error::BadConfig(String::from("max_hops")).is_per_probe());
        let resolution = Error::Resolution {
            target: String::from("nowhere.invalid"),
            reason: String::from("no address"),
        };
        assert!(!resolution.is_per_probe());
    }

    #[test]
    fn test_permission_mapping() {
        let err = Error::from_socket(
            "raw ICMPv4",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, Error::Permission { socket: "raw ICMPv4", .. }));
        assert!(err.to_string().contains("elevated privileges"));

        let err = Error::from_socket("UDP", io::Error::new(io::ErrorKind::AddrInUse, "in use"));
        assert!(matches!(err, Error::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_eperm_is_permission() {
        let err = Error::from_socket("raw ICMPv6", io::Error::from_raw_os_error(1));
        assert!(matches!(err, Error::Permission { .. }));
    }
}
