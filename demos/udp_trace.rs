use tracewalk::{Protocol, TraceConfig, Tracer};

fn main() -> anyhow::Result<()> {
    // UDP traceroute to dns.google (8.8.8.8), driven without an async runtime
    let config = TraceConfig::new("8.8.8.8")
        .with_protocol(Protocol::Udp)
        .with_max_retries(1);
    // IPv6 UDP traceroute to dns.google (2001:4860:4860::8888)
    //let config = TraceConfig::new("2001:4860:4860::8888").with_protocol(Protocol::Udp).with_ipv6(true);
    let tracer = Tracer::new(config)?;
    for event in tracer.trace_blocking()? {
        let event = event?;
        println!("{:?}", event.hop);
        if event.hop.is_loop() {
            println!("Routing loop, stopping");
            break;
        }
    }
    Ok(())
}
