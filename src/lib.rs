//! Dual-stack ICMP/UDP traceroute.
//!
//! A trace sends probes with increasing TTL / hop limit towards a target and matches the
//! ICMP Time-Exceeded, Echo-Reply and Destination-Unreachable messages they trigger. Hops
//! are produced lazily, one TTL at a time, in strictly increasing order.
//!
//! ```no_run
//! # async fn run() -> tracewalk::Result<()> {
//! use tracewalk::{Protocol, TraceConfig, Tracer};
//!
//! let config = TraceConfig::new("dns.google").with_protocol(Protocol::Udp);
//! let tracer = Tracer::new(config)?;
//! let mut trace = tracer.trace();
//! while let Some(event) = trace.next().await {
//!     let event = event?;
//!     println!("{:>2} {:?} {:?}", event.hop.hop, event.hop.ip_addr, event.hop.rtt_ms());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Raw ICMP sockets are required to read replies, which usually needs root or
//! `CAP_NET_RAW`; see [`privilege`].

pub mod config;
pub mod dns;
pub mod error;
pub mod mtr;
pub mod node;
pub mod packet;
pub mod privilege;
pub mod probe;
pub mod protocol;
pub mod socket;
pub mod trace;

pub use config::TraceConfig;
pub use dns::{HostnameResolver, IpFamily};
pub use error::{Error, Result};
pub use mtr::{HopStats, Mtr, MtrReport};
pub use node::{HopEvent, HopResult, NodeType};
pub use probe::{ProbeKey, ResponseKind};
pub use protocol::Protocol;
pub use trace::{BlockingTrace, Trace, Tracer};
