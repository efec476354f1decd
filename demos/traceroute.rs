use clap::Parser;
use std::time::Duration;
use tracewalk::{NodeType, Protocol, TraceConfig, Tracer};

/// Trace the route to a host.
#[derive(Parser, Debug)]
#[command(name = "traceroute")]
#[command(about = "Dual-stack ICMP/UDP traceroute")]
struct Args {
    /// Target host name or IP address.
    target: String,

    /// Probe protocol (icmp, udp).
    #[arg(short, long, default_value = "icmp")]
    protocol: Protocol,

    /// Maximum number of hops.
    #[arg(short = 'm', long, default_value_t = 30)]
    max_hops: u8,

    /// Per-round timeout in milliseconds.
    #[arg(short = 'w', long, default_value_t = 3000)]
    timeout_ms: u64,

    /// Retries per hop after the first attempt.
    #[arg(short = 'r', long, default_value_t = 3)]
    retries: u8,

    /// Probe size in bytes, header included.
    #[arg(short = 's', long, default_value_t = 64)]
    packet_size: u16,

    /// Attempts sent back-to-back per round.
    #[arg(long, default_value_t = 1)]
    fan_out: u8,

    /// Do not reverse resolve hop addresses.
    #[arg(short = 'n', long)]
    numeric: bool,

    /// Trace over IPv6 only.
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Log the probe conversation.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "tracewalk=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = TraceConfig::new(args.target)
        .with_protocol(args.protocol)
        .with_max_hops(args.max_hops)
        .with_timeout(Duration::from_millis(args.timeout_ms))
        .with_max_retries(args.retries)
        .with_packet_size(args.packet_size)
        .with_fan_out(args.fan_out)
        .with_resolve_dns(!args.numeric)
        .with_ipv6(args.ipv6)
        .with_debug_mode(args.debug);
    let tracer = Tracer::new(config)?;

    let mut trace = tracer.trace();
    while let Some(event) = trace.next().await {
        let hop = event?.hop;
        let addr = match (hop.ip_addr, &hop.hostname) {
            (Some(ip), Some(name)) => format!("{} ({})", name, ip),
            (Some(ip), None) => ip.to_string(),
            (None, _) => String::from("*"),
        };
        let rtt = hop
            .rtt_ms()
            .map(|ms| format!("{:.3} ms", ms))
            .unwrap_or_default();
        let note = match (hop.node_type(), hop.loop_of) {
            (_, Some(earlier)) => format!("  [loop of hop {}]", earlier),
            (NodeType::Destination, None) => String::from("  [destination]"),
            _ => String::new(),
        };
        println!("{:>2}  {}  {}{}", hop.hop, addr, rtt, note);
    }
    Ok(())
}
