mod address;
mod hostname;

pub use address::{resolve_target, select_address, IpFamily};
pub use hostname::HostnameResolver;
