use std::env;
use tracewalk::mtr::{Mtr, MtrReport};
use tracewalk::TraceConfig;

fn print_report(report: &MtrReport) {
    println!("Cycle {}/{}", report.cycle, report.total_cycles);
    println!(
        "{:>3} {:<40} {:>6} {:>5} {:>8} {:>8} {:>8} {:>8}",
        "Hop", "Host", "Loss%", "Snt", "Avg", "Best", "Wrst", "StDev"
    );
    for hop in &report.hops {
        let host = match (&hop.hostname, hop.ip_addr) {
            (Some(name), _) => name.clone(),
            (None, Some(ip)) => ip.to_string(),
            (None, None) => String::from("???"),
        };
        println!(
            "{:>3} {:<40} {:>6.1} {:>5} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
            hop.hop,
            host,
            hop.loss_pct(),
            hop.sent,
            hop.avg_ms(),
            hop.min_ms().unwrap_or(0.0),
            hop.max_ms().unwrap_or(0.0),
            hop.stddev_ms()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let target = env::args().nth(1).unwrap_or_else(|| String::from("1.1.1.1"));
    let config = TraceConfig::new(target).with_max_retries(0);
    let mtr = Mtr::new(config, 5)?;
    let report = mtr.run(print_report).await?;
    println!("Done after {} cycles", report.cycle);
    Ok(())
}
