//! Discover whether raw ICMP sockets can be opened.
//!
//! Tracing needs a raw ICMP socket of the target's family to read Time-Exceeded and
//! Destination-Unreachable messages:
//!
//! - On Linux this requires root or `CAP_NET_RAW`
//! - On other Unix platforms this requires root
//! - On Windows this requires an elevated process
//!
//! The check opens a socket once and closes it, so a missing capability is reported as
//! [`Error::Permission`] before any probe is sent instead of surfacing later as a raw OS
//! error.

use crate::error::{Error, Result};
use crate::socket::icmp::open_raw;
use crate::socket::SocketFamily;

/// Fails with [`Error::Permission`] if a raw ICMP socket of `family` cannot be created.
pub fn check_raw_icmp(family: SocketFamily) -> Result<()> {
    open_raw(family)
        .map(drop)
        .map_err(|e| Error::from_socket(family.raw_icmp_name(), e))
}

/// Returns true if raw ICMP sockets of `family` are available.
pub fn has_raw_icmp(family: SocketFamily) -> bool {
    check_raw_icmp(family).is_ok()
}
