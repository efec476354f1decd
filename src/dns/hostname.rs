use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Alias for a shared cache of reverse lookup results.
///
/// `None` records a definitive lookup failure.
type Cache = Arc<RwLock<HashMap<IpAddr, Option<String>>>>;

/// Blocking reverse lookup function.
pub type LookupFn = fn(&IpAddr) -> io::Result<String>;

/// A cheaply cloneable, caching, best-effort reverse DNS resolver.
///
/// Clones share one cache, so a resolver may be handed to several traces.
#[derive(Clone)]
pub struct HostnameResolver {
    cache: Cache,
    timeout: Duration,
    lookup: LookupFn,
}

impl HostnameResolver {
    /// Creates a resolver backed by the system resolver.
    pub fn new(timeout: Duration) -> Self {
        Self::with_lookup(timeout, dns_lookup::lookup_addr)
    }

    /// Creates a resolver backed by a custom lookup function.
    pub fn with_lookup(timeout: Duration, lookup: LookupFn) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            timeout,
            lookup,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the cached entry for `addr`, if any lookup has completed for it.
    pub fn cached(&self, addr: &IpAddr) -> Option<Option<String>> {
        self.cache.read().get(addr).cloned()
    }

    /// Drops every cached entry.
    pub fn flush(&self) {
        self.cache.write().clear();
    }

    /// Reverse resolves `addr`, giving up after the configured timeout.
    ///
    /// Failures and timeouts yield `None`; timeouts are not cached.
    pub async fn resolve(&self, addr: IpAddr) -> Option<String> {
        if let Some(entry) = self.cached(&addr) {
            return entry;
        }
        let lookup = self.lookup;
        let task = tokio::task::spawn_blocking(move || lookup(&addr));
        let hostname = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(name))) if name != addr.to_string() => Some(name),
            Ok(Ok(Ok(_))) => None,
            Ok(Ok(Err(e))) => {
                tracing::trace!(addr = %addr, error = %e, "Reverse lookup failed");
                None
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %addr, error = %e, "Reverse lookup task failed");
                return None;
            }
            Err(_) => {
                tracing::debug!(addr = %addr, "Reverse lookup timed out");
                return None;
            }
        };
        self.cache.write().insert(addr, hostname.clone());
        hostname
    }
}

impl std::fmt::Debug for HostnameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostnameResolver")
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ROUTER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    fn named(addr: &IpAddr) -> io::Result<String> {
        Ok(format!("host-{}.example", addr))
    }

    fn numeric(addr: &IpAddr) -> io::Result<String> {
        Ok(addr.to_string())
    }

    fn failing(_: &IpAddr) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no PTR record"))
    }

    fn slow(addr: &IpAddr) -> io::Result<String> {
        std::thread::sleep(Duration::from_millis(500));
        named(addr)
    }

    #[tokio::test]
    async fn test_resolve_and_cache() {
        let resolver = HostnameResolver::with_lookup(Duration::from_secs(1), named);
        assert_eq!(
            resolver.resolve(ROUTER).await.as_deref(),
            Some("host-192.0.2.1.example")
        );
        let shared = resolver.clone();
        assert_eq!(
            shared.cached(&ROUTER),
            Some(Some(String::from("host-192.0.2.1.example")))
        );
        resolver.flush();
        assert_eq!(shared.cached(&ROUTER), None);
    }

    #[tokio::test]
    async fn test_numeric_and_failed_lookups_are_none() {
        let resolver = HostnameResolver::with_lookup(Duration::from_secs(1), numeric);
        assert_eq!(resolver.resolve(ROUTER).await, None);
        assert_eq!(resolver.cached(&ROUTER), Some(None));

        let resolver = HostnameResolver::with_lookup(Duration::from_secs(1), failing);
        assert_eq!(resolver.resolve(ROUTER).await, None);
        assert_eq!(resolver.cached(&ROUTER), Some(None));
    }

    #[tokio::test]
    async fn test_timeout_is_not_cached() {
        let resolver = HostnameResolver::with_lookup(Duration::from_millis(10), slow);
        assert_eq!(resolver.resolve(ROUTER).await, None);
        assert_eq!(resolver.cached(&ROUTER), None);
    }
}
