use super::SocketFamily;
use crate::error::{Error, Result};
use socket2::{Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct IcmpConfig {
    pub family: SocketFamily,
    /// Initial TTL / hop limit, changed per probe afterwards.
    pub ttl: Option<u8>,
}

impl IcmpConfig {
    pub fn new(family: SocketFamily) -> Self {
        Self {
            family,
            ttl: None,
        }
    }
}

/// A raw ICMP socket driven by tokio.
///
/// IPv4 reads include the IP header; IPv6 reads start at the ICMPv6 header.
#[derive(Debug)]
pub struct AsyncIcmpSocket {
    inner: UdpSocket,
    family: SocketFamily,
}

impl AsyncIcmpSocket {
    /// Opens the raw socket. Must be called from within a tokio runtime.
    pub fn from_config(config: &IcmpConfig) -> Result<Self> {
        let socket = open_raw(config.family)
            .map_err(|e| Error::from_socket(config.family.raw_icmp_name(), e))?;
        socket.set_nonblocking(true)?;
        let std_socket: StdUdpSocket = socket.into();
        let inner = UdpSocket::from_std(std_socket)?;
        if let Some(ttl) = config.ttl {
            super::set_hop_limit(&inner, config.family, ttl)?;
        }
        Ok(Self {
            inner,
            family: config.family,
        })
    }

    pub fn family(&self) -> SocketFamily {
        self.family
    }

    pub fn set_ttl(&self, ttl: u8) -> io::Result<()> {
        super::set_hop_limit(&self.inner, self.family, ttl)
    }

    pub async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, target).await
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

pub(crate) fn open_raw(family: SocketFamily) -> io::Result<Socket> {
    Socket::new(family.to_domain(), Type::RAW, Some(family.icmp_protocol()))
}
