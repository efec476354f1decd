use super::collector::ResponseCollector;
use super::loops::LoopDetector;
use super::retry::{RetryController, RetryPolicy, Round};
use super::sender::ProbeSender;
use crate::config::TraceConfig;
use crate::dns::HostnameResolver;
use crate::node::{HopEvent, HopResult};
use crate::probe::{MatchedResponse, Probe};
use crate::protocol::Protocol;
use crate::socket::SocketFamily;
use std::net::IpAddr;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Immutable settings of one trace, fixed once the target is resolved.
#[derive(Clone, Debug)]
pub struct ProbeSession {
    pub target: IpAddr,
    pub family: SocketFamily,
    pub protocol: Protocol,
    pub max_hops: u8,
    pub packet_size: u16,
    pub resolve_dns: bool,
    pub debug_mode: bool,
    /// Local address probes leave from, when known.
    pub source: Option<IpAddr>,
    pub retry: RetryPolicy,
}

impl ProbeSession {
    pub fn new(config: &TraceConfig, target: IpAddr, source: Option<IpAddr>) -> Self {
        Self {
            target,
            family: SocketFamily::from_ip(&target),
            protocol: config.protocol,
            max_hops: config.max_hops,
            packet_size: config.packet_size,
            resolve_dns: config.resolve_dns,
            debug_mode: config.debug_mode,
            source,
            retry: RetryPolicy {
                timeout: config.timeout,
                max_retries: config.max_retries,
                fan_out: config.fan_out,
                backoff: config.retry_backoff,
            },
        }
    }
}

/// Mutable progress of a running trace.
#[derive(Clone, Debug, Default)]
pub struct TraceState {
    /// Last TTL probed, 0 before the first hop.
    pub current_ttl: u8,
    /// Responding addresses in hop order.
    pub path: Vec<(u8, IpAddr)>,
    pub destination_reached: bool,
    /// Attempts made across all hops, failed sends included.
    pub total_attempts: u32,
}

/// Drives the TTL sweep one hop at a time.
pub struct TraceEngine<S> {
    session: ProbeSession,
    sender: S,
    collector: ResponseCollector,
    resolver: Option<HostnameResolver>,
    loops: LoopDetector,
    state: TraceState,
    sequence: u16,
}

impl<S: ProbeSender> TraceEngine<S> {
    pub fn new(
        session: ProbeSession,
        sender: S,
        collector: ResponseCollector,
        resolver: Option<HostnameResolver>,
    ) -> Self {
        Self {
            session,
            sender,
            collector,
            resolver,
            loops: LoopDetector::new(),
            state: TraceState::default(),
            sequence: 0,
        }
    }

    pub fn session(&self) -> &ProbeSession {
        &self.session
    }

    pub fn state(&self) -> &TraceState {
        &self.state
    }

    /// True once the destination answered or `max_hops` was probed.
    pub fn is_finished(&self) -> bool {
        self.state.destination_reached || self.state.current_ttl >= self.session.max_hops
    }

    /// Probes the next TTL and returns its result, or `None` when the sweep is over.
    ///
    /// Cancel-safe: dropping the future mid-hop leaves `current_ttl` untouched, so the next
    /// call probes the same TTL again with fresh keys.
    pub async fn next_hop(&mut self) -> Option<HopEvent> {
        if self.is_finished() {
            return None;
        }
        let ttl = self.state.current_ttl + 1;

        let (matched, attempts_used) = self.probe_hop(ttl).await;

        let hop = match matched {
            Some(matched) => self.answered_hop(ttl, attempts_used, matched).await,
            None => {
                debug!(ttl, attempts = attempts_used, "Hop timed out");
                HopResult::silent(ttl, attempts_used)
            }
        };
        self.state.current_ttl = ttl;
        self.state.total_attempts += u32::from(attempts_used);

        let is_destination = hop.is_destination;
        if is_destination {
            self.state.destination_reached = true;
        }
        if is_destination || ttl >= self.session.max_hops {
            info!(
                dest = %self.session.target,
                hops = ttl,
                reached = is_destination,
                attempts = self.state.total_attempts,
                "Trace finished"
            );
        }
        let progress = (f64::from(ttl) / f64::from(self.session.max_hops)).clamp(0.0, 1.0);
        Some(HopEvent {
            hop,
            progress,
            is_destination,
        })
    }

    /// Runs the retry state machine for `ttl` until it is answered or exhausted.
    async fn probe_hop(&mut self, ttl: u8) -> (Option<MatchedResponse>, u8) {
        // probes of an abandoned call are stale
        self.collector.retire_all();
        let mut retry = RetryController::new(self.session.retry);
        let mut round = retry.begin(Instant::now());
        let matched = loop {
            self.send_round(ttl, &round).await;
            if let Some(matched) = self.collector.next_match(round.deadline).await {
                retry.answered();
                break Some(matched);
            }
            match retry.expired(Instant::now()) {
                Some(next) => {
                    debug!(ttl, attempt = next.first_attempt, "Retrying hop");
                    round = next;
                }
                None => break None,
            }
        };
        // first response wins, replies to the other attempts are stale from here on
        self.collector.retire_all();
        (matched, retry.attempts_used())
    }

    async fn send_round(&mut self, ttl: u8, round: &Round) {
        for attempt in round.first_attempt..round.first_attempt + round.attempts {
            let key = self.sender.probe_key(self.sequence);
            self.sequence = self.sequence.wrapping_add(1);
            match self.sender.send(ttl, key).await {
                Ok(()) => {
                    let probe = Probe {
                        ttl,
                        attempt,
                        key,
                        sent_at: Instant::now(),
                    };
                    debug!(ttl, attempt, key = ?key, "Probe sent");
                    self.collector.register(probe);
                }
                Err(e) if e.is_per_probe() => {
                    debug!(ttl, attempt, error = %e, "Probe transmit failed");
                }
                Err(e) => {
                    warn!(ttl, attempt, error = %e, "Probe transmit failed");
                }
            }
        }
    }

    async fn answered_hop(
        &mut self,
        ttl: u8,
        attempts_used: u8,
        matched: MatchedResponse,
    ) -> HopResult {
        let rtt = matched.rtt();
        let response = matched.response;
        let addr = response.source;
        let hostname = match (&self.resolver, self.session.resolve_dns) {
            (Some(resolver), true) => resolver.resolve(addr).await,
            _ => None,
        };
        let loop_of = self.loops.observe(ttl, addr);
        self.state.path.push((ttl, addr));
        if let Some(earlier) = loop_of {
            info!(ttl, ip = %addr, earlier, "Routing loop detected");
        }
        debug!(
            ttl,
            ip = %addr,
            rtt_ms = rtt.as_secs_f64() * 1000.0,
            kind = ?response.kind,
            attempt = matched.probe.attempt,
            "Hop answered"
        );
        HopResult {
            hop: ttl,
            ip_addr: Some(addr),
            hostname,
            rtt: Some(rtt),
            attempts_used,
            is_timeout: false,
            is_destination: addr == self.session.target,
            loop_of,
            kind: Some(response.kind),
            reply_ttl: response.reply_ttl,
        }
    }
}
