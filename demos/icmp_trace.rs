use tracewalk::{Protocol, TraceConfig, Tracer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ICMP traceroute to cloudflare's one.one.one.one (1.1.1.1)
    let config = TraceConfig::new("1.1.1.1").with_protocol(Protocol::Icmp);
    // ICMPv6 traceroute to cloudflare's one.one.one.one (2606:4700:4700::1111)
    //let config = TraceConfig::new("2606:4700:4700::1111").with_ipv6(true);
    let tracer = Tracer::new(config)?;
    tracer.check_privileges()?;

    let mut trace = tracer.trace();
    println!("Progress:");
    while let Some(event) = trace.next().await {
        let event = event?;
        let hop = &event.hop;
        match hop.ip_addr {
            Some(ip_addr) => println!(
                "{:>2} {} {} {:?} ({:.0}%)",
                hop.hop,
                ip_addr,
                hop.hostname.as_deref().unwrap_or("-"),
                hop.rtt,
                event.progress * 100.0
            ),
            None => println!("{:>2} * ({:.0}%)", hop.hop, event.progress * 100.0),
        }
    }
    Ok(())
}
