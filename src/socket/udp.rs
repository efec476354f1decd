use super::SocketFamily;
use crate::error::{Error, Result};
use socket2::{Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub family: SocketFamily,
    pub bind_addr: Option<SocketAddr>,
    pub ttl: Option<u8>,
}

impl UdpConfig {
    pub fn new(family: SocketFamily) -> Self {
        Self {
            family,
            bind_addr: None,
            ttl: None,
        }
    }
}

/// Datagram socket used to emit UDP probes.
#[derive(Debug)]
pub struct AsyncUdpSocket {
    inner: UdpSocket,
    family: SocketFamily,
}

impl AsyncUdpSocket {
    /// Opens and binds the socket. Must be called from within a tokio runtime.
    pub fn from_config(config: &UdpConfig) -> Result<Self> {
        let socket = Socket::new(config.family.to_domain(), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::from_socket("UDP", e))?;
        socket.set_nonblocking(true)?;
        let bind_addr = config.bind_addr.unwrap_or_else(|| config.family.unspecified());
        socket.bind(&bind_addr.into())?;
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

    /// The ephemeral source port probes leave from.
    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.inner.local_addr()?.port())
    }

    pub fn set_ttl(&self, ttl: u8) -> io::Result<()> {
        super::set_hop_limit(&self.inner, self.family, ttl)
    }

    pub async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let socket = AsyncUdpSocket::from_config(&UdpConfig::new(SocketFamily::Ipv4)).unwrap();
        assert_ne!(socket.local_port().unwrap(), 0);
        socket.set_ttl(3).unwrap();
    }
}
