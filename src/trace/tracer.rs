use super::collector::{spawn_listener, ResponseCollector, RESPONSE_QUEUE_SIZE};
use super::engine::{ProbeSession, TraceEngine};
use super::sender::SocketSender;
use crate::config::TraceConfig;
use crate::dns::{resolve_target, HostnameResolver};
use crate::error::Result;
use crate::node::{HopEvent, HopResult};
use crate::privilege;
use crate::protocol::Protocol;
use crate::socket::icmp::{AsyncIcmpSocket, IcmpConfig};
use crate::socket::udp::{AsyncUdpSocket, UdpConfig};
use crate::socket::SocketFamily;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Entry point for tracing routes to one target.
///
/// A `Tracer` can start any number of independent traces; they share one reverse DNS cache.
#[derive(Clone, Debug)]
pub struct Tracer {
    config: TraceConfig,
    resolver: HostnameResolver,
}

impl Tracer {
    /// Creates a tracer after validating `config`.
    pub fn new(config: TraceConfig) -> Result<Tracer> {
        config.validate()?;
        let resolver = HostnameResolver::new(config.dns_timeout);
        Ok(Tracer { config, resolver })
    }
    /// Replaces the reverse DNS resolver, e.g. to share a cache with another tracer.
    pub fn with_resolver(mut self, resolver: HostnameResolver) -> Tracer {
        self.resolver = resolver;
        self
    }
    /// Returns the trace configuration.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }
    /// Returns the shared reverse DNS resolver.
    pub fn resolver(&self) -> &HostnameResolver {
        &self.resolver
    }
    /// Checks that raw ICMP sockets can be opened for the configured family.
    ///
    /// Without `ipv6` the IPv4 socket is checked, since IPv4 targets are preferred.
    pub fn check_privileges(&self) -> Result<()> {
        let family = if self.config.ipv6 {
            SocketFamily::Ipv6
        } else {
            SocketFamily::Ipv4
        };
        privilege::check_raw_icmp(family)
    }
    /// Starts a lazy trace. Nothing is resolved or sent until the first hop is requested.
    pub fn trace(&self) -> Trace {
        Trace {
            stage: Stage::Pending {
                config: self.config.clone(),
                resolver: self.resolver.clone(),
            },
        }
    }
    /// Starts a trace driven by its own runtime, for callers without one.
    pub fn trace_blocking(&self) -> Result<BlockingTrace> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BlockingTrace {
            trace: self.trace(),
            runtime,
        })
    }
    /// Runs a whole trace and collects its hops.
    pub async fn run(&self) -> Result<Vec<HopResult>> {
        let mut trace = self.trace();
        let mut hops = Vec::new();
        while let Some(event) = trace.next().await {
            hops.push(event?.hop);
        }
        Ok(hops)
    }
}

enum Stage {
    Pending {
        config: TraceConfig,
        resolver: HostnameResolver,
    },
    Running(Box<TraceEngine<SocketSender>>),
    Finished,
}

/// A lazy, finite, non-restartable sequence of hop events.
///
/// Setup failures (resolution, permission) are yielded once as an error, after which the
/// sequence ends. Dropping the trace stops the listener and closes its sockets.
pub struct Trace {
    stage: Stage,
}

impl Trace {
    /// Returns the next hop, probing it first.
    ///
    /// Cancel-safe once the trace has started: a call dropped mid-hop is retried at the same
    /// hop. A call dropped during setup restarts setup.
    pub async fn next(&mut self) -> Option<Result<HopEvent>> {
        if let Stage::Pending { config, resolver } = &self.stage {
            match start(config, resolver.clone()).await {
                Ok(engine) => self.stage = Stage::Running(Box::new(engine)),
                Err(e) => {
                    self.stage = Stage::Finished;
                    return Some(Err(e));
                }
            }
        }
        let event = match &mut self.stage {
            Stage::Running(engine) => engine.next_hop().await,
            _ => return None,
        };
        if event.is_none() {
            self.stage = Stage::Finished;
        }
        event.map(Ok)
    }
    /// Returns true once the sequence has ended.
    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }
    /// Returns the session of a started trace.
    pub fn session(&self) -> Option<&ProbeSession> {
        match &self.stage {
            Stage::Running(engine) => Some(engine.session()),
            _ => None,
        }
    }
}

/// Blocking iterator over the hops of a trace.
pub struct BlockingTrace {
    // declared first so the sockets close before the runtime shuts down
    trace: Trace,
    runtime: tokio::runtime::Runtime,
}

impl Iterator for BlockingTrace {
    type Item = Result<HopEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.trace.next())
    }
}

async fn start(
    config: &TraceConfig,
    resolver: HostnameResolver,
) -> Result<TraceEngine<SocketSender>> {
    let target = resolve_target(&config.target, config.family()).await?;
    let family = SocketFamily::from_ip(&target);
    let source = source_address(target);
    let session = ProbeSession::new(config, target, source);
    info!(
        host = %config.target,
        dest = %target,
        protocol = %config.protocol,
        max_hops = config.max_hops,
        "Starting trace"
    );
    if config.debug_mode {
        debug!(session = ?session, "Trace session");
    }

    let icmp = Arc::new(AsyncIcmpSocket::from_config(&IcmpConfig::new(family))?);
    let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_SIZE);
    let listener = spawn_listener(Arc::clone(&icmp), tx, config.debug_mode);
    let collector = ResponseCollector::new(rx)
        .with_listener(listener)
        .with_debug_mode(config.debug_mode);

    let sender = match config.protocol {
        Protocol::Icmp => SocketSender::icmp(icmp, target, rand::random(), config.packet_size),
        Protocol::Udp => {
            let socket = AsyncUdpSocket::from_config(&UdpConfig::new(family))?;
            SocketSender::udp(socket, target, config.udp_base_port, config.packet_size)?
        }
    }
    .with_source(source);

    let resolver = config.resolve_dns.then_some(resolver);
    Ok(TraceEngine::new(session, sender, collector, resolver))
}

/// Local address of the default interface for the target's family.
fn source_address(target: IpAddr) -> Option<IpAddr> {
    if target.is_loopback() {
        return Some(target);
    }
    let interface = match default_net::get_default_interface() {
        Ok(interface) => interface,
        Err(e) => {
            debug!(error = %e, "Default interface not found");
            return None;
        }
    };
    match target {
        IpAddr::V4(_) => interface.ipv4.first().map(|net| IpAddr::V4(net.addr)),
        IpAddr::V6(_) => interface
            .ipv6
            .iter()
            .map(|net| net.addr)
            .find(|addr| (addr.segments()[0] & 0xffc0) != 0xfe80)
            .map(IpAddr::V6),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_new_rejects_bad_config() {
        let err = Tracer::new(TraceConfig::new("192.0.2.1").with_max_hops(0)).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn test_loopback_source_is_target() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(source_address(v6), Some(v6));
        let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(source_address(v4), Some(v4));
    }

    #[tokio::test]
    async fn test_resolution_failure_ends_sequence() {
        let tracer = Tracer::new(TraceConfig::new("192.0.2.1").with_ipv6(true)).unwrap();
        let mut trace = tracer.trace();
        assert!(!trace.is_finished());
        let err = trace.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(trace.is_finished());
        assert!(trace.next().await.is_none());
    }

    #[test]
    fn test_blocking_resolution_failure() {
        let tracer = Tracer::new(TraceConfig::new("192.0.2.1").with_ipv6(true)).unwrap();
        let mut trace = tracer.trace_blocking().unwrap();
        assert!(matches!(trace.next(), Some(Err(Error::Resolution { .. }))));
        assert!(trace.next().is_none());
    }
}
