use crate::node::HopResult;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

/// Aggregated statistics of one hop across MTR cycles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HopStats {
    pub hop: u8,
    /// Last address seen answering this hop.
    pub ip_addr: Option<IpAddr>,
    /// Last host name seen for this hop.
    pub hostname: Option<String>,
    /// Cycles in which this hop was probed.
    pub sent: u32,
    /// Cycles in which this hop answered.
    pub received: u32,
    best: Option<Duration>,
    worst: Option<Duration>,
    mean: f64,
    m2: f64,
}

impl HopStats {
    pub fn new(hop: u8) -> Self {
        Self {
            hop,
            ..Self::default()
        }
    }

    /// Folds one cycle's result for this hop into the statistics.
    pub fn update(&mut self, result: &HopResult) {
        self.sent += 1;
        if result.ip_addr.is_some() {
            self.ip_addr = result.ip_addr;
        }
        if result.hostname.is_some() {
            self.hostname.clone_from(&result.hostname);
        }
        if let Some(rtt) = result.rtt {
            self.received += 1;
            self.best = Some(self.best.map_or(rtt, |best| best.min(rtt)));
            self.worst = Some(self.worst.map_or(rtt, |worst| worst.max(rtt)));
            let ms = rtt.as_secs_f64() * 1000_f64;
            let delta = ms - self.mean;
            self.mean += delta / f64::from(self.received);
            self.m2 += delta * (ms - self.mean);
        }
    }

    /// The % of cycles without an answer.
    pub fn loss_pct(&self) -> f64 {
        if self.sent > 0 {
            f64::from(self.sent - self.received) / f64::from(self.sent) * 100_f64
        } else {
            0_f64
        }
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.best.map(|best| best.as_secs_f64() * 1000_f64)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.worst.map(|worst| worst.as_secs_f64() * 1000_f64)
    }

    /// The average round-trip time, 0 without samples.
    pub fn avg_ms(&self) -> f64 {
        self.mean
    }

    /// The sample standard deviation, 0 with fewer than two samples.
    pub fn stddev_ms(&self) -> f64 {
        if self.received > 1 {
            (self.m2 / f64::from(self.received - 1)).sqrt()
        } else {
            0_f64
        }
    }
}

/// Per-hop statistics keyed by hop number.
#[derive(Clone, Debug, Default)]
pub struct HopStatsTable {
    hops: BTreeMap<u8, HopStats>,
}

impl HopStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &HopResult) {
        self.hops
            .entry(result.hop)
            .or_insert_with(|| HopStats::new(result.hop))
            .update(result);
    }

    pub fn get(&self, hop: u8) -> Option<&HopStats> {
        self.hops.get(&hop)
    }

    /// Snapshot of every hop seen so far, in hop order.
    pub fn snapshot(&self) -> Vec<HopStats> {
        self.hops.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ROUTER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    fn answered(hop: u8, ms: u64) -> HopResult {
        HopResult {
            ip_addr: Some(ROUTER),
            rtt: Some(Duration::from_millis(ms)),
            is_timeout: false,
            ..HopResult::silent(hop, 1)
        }
    }

    #[test]
    fn test_stats_over_cycles() {
        let mut table = HopStatsTable::new();
        table.record(&answered(1, 10));
        table.record(&HopResult::silent(1, 4));
        table.record(&answered(1, 20));
        table.record(&answered(1, 30));
        let stats = table.get(1).unwrap();
        assert_eq!(stats.sent, 4);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.ip_addr, Some(ROUTER));
        assert!((stats.loss_pct() - 25.0).abs() < 1e-9);
        assert_eq!(stats.min_ms(), Some(10.0));
        assert_eq!(stats.max_ms(), Some(30.0));
        assert!((stats.avg_ms() - 20.0).abs() < 1e-9);
        assert!((stats.stddev_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_has_no_deviation() {
        let mut stats = HopStats::new(2);
        stats.update(&answered(2, 15));
        assert_eq!(stats.stddev_ms(), 0.0);
        assert!((stats.avg_ms() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_silent_hop_is_full_loss() {
        let mut table = HopStatsTable::new();
        table.record(&HopResult::silent(3, 4));
        table.record(&HopResult::silent(3, 4));
        let stats = table.get(3).unwrap();
        assert_eq!(stats.loss_pct(), 100.0);
        assert_eq!(stats.min_ms(), None);
        assert_eq!(stats.avg_ms(), 0.0);
        assert_eq!(stats.ip_addr, None);
    }

    #[test]
    fn test_snapshot_in_hop_order() {
        let mut table = HopStatsTable::new();
        table.record(&answered(3, 1));
        table.record(&answered(1, 1));
        table.record(&answered(2, 1));
        let hops: Vec<u8> = table.snapshot().iter().map(|s| s.hop).collect();
        assert_eq!(hops, vec![1, 2, 3]);
    }
}
