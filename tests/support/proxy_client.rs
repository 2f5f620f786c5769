use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub struct ProxyClient {
    stream: TcpStream,
}

impl ProxyClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
        })
    }

    pub async fn send(&mut self, request: impl AsRef<[u8]>) -> Result<()> {
        self.stream.write_all(request.as_ref()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until the proxy closes the connection.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        timeout(
            StdDuration::from_secs(10),
            self.stream.read_to_end(&mut buf),
        )
        .await??;
        Ok(buf)
    }

    /// Half-close the request side so the proxy sees EOF.
    pub async fn finish_request(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Send one complete request on a fresh connection and collect the whole response.
    pub async fn exchange(addr: SocketAddr, request: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let mut client = Self::connect(addr).await?;
        client.send(request).await?;
        client.read_response().await
    }
}
