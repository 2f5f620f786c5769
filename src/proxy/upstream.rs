use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Byte stream to an origin server.
pub trait UpstreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> UpstreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type UpstreamStream = Box<dyn UpstreamIo>;

/// Opens the single upstream connection an exchange needs. Failures are not retried.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self, host: &str, port: &str) -> io::Result<UpstreamStream>;
}

/// Connects over TCP, resolving `host` with the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl UpstreamConnector for TcpConnector {
    async fn connect(&self, host: &str, port: &str) -> io::Result<UpstreamStream> {
        let port_number = parse_port(port)?;
        let stream = TcpStream::connect((host, port_number)).await?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(host, port, error = %err, "failed to set TCP_NODELAY on upstream stream");
        }
        debug!(host, port, "connected to upstream");
        Ok(Box::new(stream))
    }
}

fn parse_port(port: &str) -> io::Result<u16> {
    port.parse::<u16>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid upstream port '{port}'"),
        )
    })
}
