use std::collections::HashMap;
use std::net::IpAddr;

/// Flags hops answering from an address already seen at an earlier hop.
#[derive(Debug, Default)]
pub struct LoopDetector {
    first_seen: HashMap<IpAddr, u8>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `addr` at `hop` and returns the earliest earlier hop with the same address.
    ///
    /// The first occurrence of an address is never flagged.
    pub fn observe(&mut self, hop: u8, addr: IpAddr) -> Option<u8> {
        match self.first_seen.get(&addr) {
            Some(&earlier) if earlier < hop => Some(earlier),
            Some(_) => None,
            None => {
                self.first_seen.insert(addr, hop);
                None
            }
        }
    }
}
