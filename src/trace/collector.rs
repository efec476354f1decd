use crate::packet;
use crate::probe::{MatchedResponse, Probe, ProbeKey, ProbeResponse};
use crate::socket::icmp::AsyncIcmpSocket;
use crate::socket::SocketFamily;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Capacity of the queue between the listener task and the collector.
pub const RESPONSE_QUEUE_SIZE: usize = 256;

/// Receive buffer size, larger than any ICMP error we decode.
const RECV_BUF_SIZE: usize = 2048;

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub struct AbortOnDrop(JoinHandle<()>);

impl AbortOnDrop {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Raw ICMP messages as read by the listener task.
#[async_trait]
pub trait IcmpReader: Send + Sync {
    fn family(&self) -> SocketFamily;

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl IcmpReader for AsyncIcmpSocket {
    fn family(&self) -> SocketFamily {
        AsyncIcmpSocket::family(self)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        AsyncIcmpSocket::recv_from(self, buf).await
    }
}

/// Spawns the task reading `socket` and forwarding decoded responses to `tx`.
///
/// Failed reads are skipped. The task ends when the collector side of the queue is dropped.
pub fn spawn_listener<R>(
    socket: Arc<R>,
    tx: mpsc::Sender<ProbeResponse>,
    debug_mode: bool,
) -> AbortOnDrop
where
    R: IcmpReader + 'static,
{
    AbortOnDrop::new(tokio::spawn(async move {
        let family = socket.family();
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(read) => read,
                Err(_) if tx.is_closed() => return,
                Err(e) => {
                    debug!(error = %e, "ICMP receive failed, skipping");
                    tokio::task::yield_now().await;
                    continue;
                }
            };
            let received_at = Instant::now();
            match packet::parse_response(family, &buf[..len], from.ip(), received_at) {
                Some(response) => {
                    if tx.send(response).await.is_err() {
                        return;
                    }
                }
                None if debug_mode => debug!(from = %from.ip(), len, "Discarding unrelated ICMP"),
                None => trace!(from = %from.ip(), len, "Discarding unrelated ICMP"),
            }
        }
    }))
}

/// Matches inbound responses against the probes outstanding for the current hop.
#[derive(Debug)]
pub struct ResponseCollector {
    rx: mpsc::Receiver<ProbeResponse>,
    outstanding: HashMap<ProbeKey, Probe>,
    _listener: Option<AbortOnDrop>,
    debug_mode: bool,
}

impl ResponseCollector {
    pub fn new(rx: mpsc::Receiver<ProbeResponse>) -> Self {
        Self {
            rx,
            outstanding: HashMap::new(),
            _listener: None,
            debug_mode: false,
        }
    }

    /// Ties the listener task's lifetime to this collector.
    pub fn with_listener(mut self, listener: AbortOnDrop) -> Self {
        self._listener = Some(listener);
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Starts tracking a transmitted probe.
    pub fn register(&mut self, probe: Probe) {
        self.outstanding.insert(probe.key, probe);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Retires every outstanding probe; later replies to them are discarded.
    pub fn retire_all(&mut self) {
        self.outstanding.clear();
    }

    /// Waits until a response matches an outstanding probe or `deadline` passes.
    pub async fn next_match(&mut self, deadline: Instant) -> Option<MatchedResponse> {
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(response)) => {
                    if let Some(probe) = self.outstanding.remove(&response.key) {
                        return Some(MatchedResponse { probe, response });
                    }
                    self.discard(&response);
                }
                Ok(None) => {
                    // listener gone, nothing more can arrive before the deadline
                    tokio::time::sleep_until(deadline).await;
                    return None;
                }
                Err(_) => return None,
            }
        }
    }

    fn discard(&self, response: &ProbeResponse) {
        if self.debug_mode {
            debug!(source = %response.source, key = ?response.key, "Discarding stale or foreign response");
        } else {
            trace!(source = %response.source, key = ?response.key, "Discarding stale or foreign response");
        }
    }
}
