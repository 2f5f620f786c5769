use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::debug;

use crate::proxy::exchange_error::ExchangeError;
use crate::proxy::headers::{HeaderAction, classify_request_header, normalized_request_headers};
use crate::proxy::request::RequestLine;
use crate::proxy::target::Target;

use super::capture::ResponseCapture;
use super::codec::{LineError, read_line, skip_line, sniff_status};

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct RelaySummary {
    pub bytes_out: u64,
    pub status: Option<StatusCode>,
}

fn header_error(err: LineError) -> ExchangeError {
    match err {
        LineError::TooLong { limit } => ExchangeError::HeaderTooLong { limit },
        LineError::Io(source) => ExchangeError::ClientIo(source),
    }
}

/// Build the upstream request head: origin-form request line, the client's headers minus the
/// ones the proxy overrides, then the fixed identity and connection headers.
pub(super) async fn build_upstream_request<S>(
    client: &mut BufReader<S>,
    request: &RequestLine,
    target: &Target,
    max_line_length: usize,
    user_agent: &str,
) -> Result<Vec<u8>, ExchangeError>
where
    S: AsyncRead + Unpin,
{
    let mut head = request.origin_form(&target.uri).into_bytes();
    let mut line = Vec::new();

    loop {
        let read = read_line(client, &mut line, max_line_length)
            .await
            .map_err(header_error)?;
        if read == 0 {
            break;
        }
        match classify_request_header(&line) {
            HeaderAction::EndOfHeaders => break,
            HeaderAction::Skip => {}
            HeaderAction::Forward => {
                head.extend_from_slice(&line);
                if !line.ends_with(b"\n") {
                    head.extend_from_slice(b"\r\n");
                }
            }
        }
    }

    head.extend_from_slice(normalized_request_headers(user_agent).as_bytes());
    Ok(head)
}

pub(super) async fn send_upstream_request<U>(
    upstream: &mut U,
    head: &[u8],
) -> Result<(), ExchangeError>
where
    U: AsyncWrite + Unpin,
{
    upstream
        .write_all(head)
        .await
        .map_err(ExchangeError::UpstreamIo)?;
    upstream.flush().await.map_err(ExchangeError::UpstreamIo)
}

/// Upper bound on reading leftover request headers after a cache hit has been answered.
const HIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Read and drop what is left of the client's header section once a cache hit has been written,
/// so closing the socket does not reset it under unread input.
///
/// Best effort: overlong lines are skipped, and an I/O error, end of stream or a client that
/// stays silent past [`HIT_DRAIN_TIMEOUT`] simply ends the drain.
pub(super) async fn drain_request_headers<S>(client: &mut BufReader<S>, max_line_length: usize)
where
    S: AsyncRead + Unpin,
{
    let drain = async {
        let mut line = Vec::new();
        loop {
            match read_line(client, &mut line, max_line_length).await {
                Ok(0) | Err(LineError::Io(_)) => return,
                Ok(_) => {
                    if classify_request_header(&line) == HeaderAction::EndOfHeaders {
                        return;
                    }
                }
                Err(LineError::TooLong { .. }) => match skip_line(client).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                },
            }
        }
    };

    if timeout(HIT_DRAIN_TIMEOUT, drain).await.is_err() {
        debug!("client kept its request headers open after a cache hit");
    }
}

/// Stream the upstream response to the client chunk by chunk until upstream closes, mirroring
/// each chunk into `capture`.
pub(super) async fn relay_response<U, C>(
    upstream: &mut U,
    client: &mut C,
    capture: &mut ResponseCapture,
    chunk_size: usize,
) -> Result<RelaySummary, ExchangeError>
where
    U: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut summary = RelaySummary::default();

    loop {
        let read = upstream
            .read(&mut buf)
            .await
            .map_err(ExchangeError::UpstreamIo)?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        if summary.bytes_out == 0 {
            summary.status = sniff_status(chunk);
        }
        client
            .write_all(chunk)
            .await
            .map_err(ExchangeError::ClientIo)?;
        capture.push(chunk);
        summary.bytes_out += read as u64;
    }

    client.flush().await.map_err(ExchangeError::ClientIo)?;
    Ok(summary)
}
