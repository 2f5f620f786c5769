use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Fixed reply for malformed requests and unreachable upstreams.
pub const BAD_REQUEST_RESPONSE: &[u8] =
    b"HTTP/1.0 400 Bad Request\r\nContent-Type: plain/text\r\nContent-Length: 0\r\n\r\n";

pub async fn send_bad_request<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(BAD_REQUEST_RESPONSE).await?;
    stream.flush().await
}

pub async fn shutdown_stream<S>(stream: &mut S, peer: SocketAddr)
where
    S: AsyncWrite + Unpin,
{
    if let Err(err) = stream.shutdown().await {
        debug!(peer = %peer, error = %err, "failed to shut down client stream");
    }
}
