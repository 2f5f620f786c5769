use std::net::SocketAddr;
use std::time::Instant;

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::logging::AccessLogBuilder;
use crate::metrics;
use crate::proxy::AppContext;
use crate::proxy::cache::InsertOutcome;
use crate::proxy::exchange_error::{ExchangeError, log_exchange_error};
use crate::proxy::request::{MalformedRequestLine, parse_request_line};
use crate::proxy::target::{Target, resolve_target};

use super::capture::{CaptureResult, ResponseCapture};
use super::codec::{LineError, read_line, sniff_status};
use super::forward::{
    build_upstream_request, drain_request_headers, relay_response, send_upstream_request,
};
use super::respond::{BAD_REQUEST_RESPONSE, send_bad_request, shutdown_stream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeOutcome {
    Hit,
    Miss,
}

impl ExchangeOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// What the access log needs to know about an exchange, filled in as it progresses.
#[derive(Debug, Default)]
struct ExchangeFacts {
    method: Option<String>,
    target: Option<Target>,
    cache_lookup: Option<&'static str>,
    cache_store: Option<&'static str>,
    status: Option<StatusCode>,
    bytes_out: u64,
}

impl ExchangeFacts {
    fn access_log(self, peer: SocketAddr) -> AccessLogBuilder {
        let mut builder = AccessLogBuilder::new(peer).maybe_status(self.status);
        if let Some(method) = self.method {
            builder = builder.method(method);
        }
        if let Some(target) = self.target {
            builder = builder.host(target.host).port(target.port).path(target.uri);
        }
        if let Some(lookup) = self.cache_lookup {
            builder = builder.cache_lookup(lookup);
        }
        if let Some(store) = self.cache_store {
            builder = builder.cache_store(store);
        }
        builder.bytes_out(self.bytes_out)
    }
}

/// Serve exactly one proxied request on `stream`, then close it.
///
/// Requests that cannot be parsed, and targets that cannot be reached, are answered with the
/// fixed 400 response. Failures after relaying has started just end the connection.
pub async fn handle_http<S>(
    stream: S,
    peer: SocketAddr,
    app: AppContext,
) -> Result<(), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let start = Instant::now();
    let mut reader = BufReader::new(stream);
    let mut facts = ExchangeFacts::default();

    let result = exchange(&mut reader, &app, &mut facts).await;

    if let Err(err) = &result {
        log_exchange_error(err, peer);
        if err.wants_bad_request() {
            match send_bad_request(reader.get_mut()).await {
                Ok(()) => {
                    facts.status = Some(StatusCode::BAD_REQUEST);
                    facts.bytes_out += BAD_REQUEST_RESPONSE.len() as u64;
                }
                Err(write_err) => {
                    debug!(peer = %peer, error = %write_err, "failed to send bad request response");
                }
            }
        }
    }
    shutdown_stream(reader.get_mut(), peer).await;

    let log = facts.access_log(peer).elapsed(start.elapsed());
    match &result {
        Ok(outcome) => log.outcome(outcome.label()).log(),
        Err(err) => log.outcome(err.outcome()).error_reason(err.reason()).log(),
    }

    result.map(|_| ())
}

async fn exchange<S>(
    reader: &mut BufReader<S>,
    app: &AppContext,
    facts: &mut ExchangeFacts,
) -> Result<ExchangeOutcome, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let settings = &app.settings;

    let mut raw_line = Vec::new();
    let read = read_line(reader, &mut raw_line, settings.max_line_length)
        .await
        .map_err(|err| match err {
            LineError::TooLong { limit } => {
                ExchangeError::from(MalformedRequestLine::TooLong { limit })
            }
            LineError::Io(source) => ExchangeError::ClientIo(source),
        })?;
    if read == 0 {
        return Err(ExchangeError::EmptyRequest);
    }
    let line =
        std::str::from_utf8(&raw_line).map_err(|_| MalformedRequestLine::InvalidEncoding)?;
    let request = parse_request_line(line)?;
    facts.method = Some(request.method.clone());

    let target = resolve_target(&request.target);
    facts.target = Some(target.clone());

    if let Some(entry) = app.cache.lookup_target(&target) {
        facts.cache_lookup = Some("hit");
        let client = reader.get_mut();
        client
            .write_all(entry.data())
            .await
            .map_err(ExchangeError::ClientIo)?;
        client.flush().await.map_err(ExchangeError::ClientIo)?;
        facts.status = sniff_status(entry.data());
        facts.bytes_out = entry.len() as u64;
        drain_request_headers(reader, settings.max_line_length).await;
        return Ok(ExchangeOutcome::Hit);
    }
    facts.cache_lookup = Some("miss");

    let mut upstream = app
        .connector
        .connect(&target.host, &target.port)
        .await
        .map_err(|source| ExchangeError::UpstreamConnect {
            host: target.host.clone(),
            port: target.port.clone(),
            source,
        })?;

    let head = build_upstream_request(
        reader,
        &request,
        &target,
        settings.max_line_length,
        &settings.user_agent,
    )
    .await?;
    send_upstream_request(&mut upstream, &head).await?;

    facts.cache_store = Some("incomplete");
    let mut capture = ResponseCapture::new(app.cache.max_object_size());
    let summary = relay_response(
        &mut upstream,
        reader.get_mut(),
        &mut capture,
        settings.relay_chunk_size,
    )
    .await?;
    facts.status = summary.status;
    facts.bytes_out = summary.bytes_out;

    let captured = capture.finish();
    facts.cache_store = Some(captured.label());
    match captured {
        CaptureResult::Cacheable(data) => {
            if app.cache.insert(target, data) == InsertOutcome::Rejected {
                facts.cache_store = Some("rejected");
                metrics::record_cache_store_skipped("rejected");
            }
        }
        skipped => metrics::record_cache_store_skipped(skipped.label()),
    }

    Ok(ExchangeOutcome::Miss)
}
