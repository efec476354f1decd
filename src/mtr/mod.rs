//! Repeated traces with per-hop loss and latency statistics.

mod stats;
pub use stats::*;

use crate::config::TraceConfig;
use crate::error::{Error, Result};
use crate::trace::Tracer;
use tracing::{debug, info};

/// Default number of MTR cycles.
pub const DEFAULT_CYCLES: u32 = 10;

/// State of an MTR run after a completed cycle.
#[derive(Clone, Debug)]
pub struct MtrReport {
    /// Cycles completed, 1-based.
    pub cycle: u32,
    pub total_cycles: u32,
    /// `cycle / total_cycles`
    pub progress: f64,
    pub hops: Vec<HopStats>,
}

/// Runs consecutive traces to one target and aggregates them per hop.
#[derive(Clone, Debug)]
pub struct Mtr {
    tracer: Tracer,
    cycles: u32,
}

impl Mtr {
    pub fn new(config: TraceConfig, cycles: u32) -> Result<Mtr> {
        Mtr::from_tracer(Tracer::new(config)?, cycles)
    }

    /// Reuses `tracer`, and with it its reverse DNS cache.
    pub fn from_tracer(tracer: Tracer, cycles: u32) -> Result<Mtr> {
        if cycles == 0 {
            return Err(Error::BadConfig(String::from("cycles must be at least 1")));
        }
        Ok(Mtr { tracer, cycles })
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Runs every cycle, handing a report to `on_cycle` after each one.
    ///
    /// Returns the report of the last cycle. A fatal trace error aborts the run.
    pub async fn run<F>(&self, mut on_cycle: F) -> Result<MtrReport>
    where
        F: FnMut(&MtrReport),
    {
        let mut table = HopStatsTable::new();
        let mut report = MtrReport {
            cycle: 0,
            total_cycles: self.cycles,
            progress: 0.0,
            hops: Vec::new(),
        };
        info!(host = %self.tracer.config().target, cycles = self.cycles, "Starting MTR");
        for cycle in 1..=self.cycles {
            let mut trace = self.tracer.trace();
            while let Some(event) = trace.next().await {
                table.record(&event?.hop);
            }
            report = MtrReport {
                cycle,
                total_cycles: self.cycles,
                progress: f64::from(cycle) / f64::from(self.cycles),
                hops: table.snapshot(),
            };
            debug!(cycle, hops = table.len(), "MTR cycle complete");
            on_cycle(&report);
        }
        Ok(report)
    }

    /// Blocking variant of [`Mtr::run`] for callers without a runtime.
    pub fn run_blocking<F>(&self, on_cycle: F) -> Result<MtrReport>
    where
        F: FnMut(&MtrReport),
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(on_cycle))
    }
}
