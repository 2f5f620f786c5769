use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
    time::timeout,
};

use crate::proxy::headers::{HeaderAction, classify_request_header};
use crate::proxy::http::codec::{LineError, read_line};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("requests_total", "Exchanges by outcome");
    let vec = IntCounterVec::new(opts, &["outcome"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register requests_total");
    vec
});

static RELAYED_BYTES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("relayed_bytes_total", "Response bytes written to clients")
        .expect("create relayed_bytes_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register relayed_bytes_total");
    counter
});

static CACHE_LOOKUP_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("cache_lookup_total", "Object cache lookups by result");
    let vec = IntCounterVec::new(opts, &["result"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register cache_lookup_total");
    vec
});

static CACHE_STORE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("cache_store_total", "Objects stored in the cache")
        .expect("create cache_store_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register cache_store_total");
    counter
});

static CACHE_STORE_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "cache_store_skipped_total",
        "Relayed responses not stored, by reason",
    );
    let vec = IntCounterVec::new(opts, &["reason"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register cache_store_skipped_total");
    vec
});

static CACHE_EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter =
        IntCounter::new("cache_evictions_total", "Object cache evictions").expect("create counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register cache_evictions_total");
    counter
});

static CACHE_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("cache_bytes", "Bytes held by the object cache")
        .expect("create cache_bytes");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register cache_bytes");
    gauge
});

static CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("cache_entries", "Entries held by the object cache")
        .expect("create cache_entries");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register cache_entries");
    gauge
});

static INFLIGHT_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("inflight_connections", "Connections currently being handled")
        .expect("create gauge");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register inflight_connections");
    gauge
});

const METRICS_PATH: &str = "/metrics";
const METRICS_MAX_REQUEST_BYTES: usize = 8192;
const METRICS_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts one connection in `inflight_connections` for as long as it is alive, including when
/// the worker holding it unwinds.
#[must_use = "the connection stops being counted when the guard is dropped"]
pub struct InflightGuard {
    _private: (),
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        INFLIGHT_CONNECTIONS.dec();
    }
}

pub fn track_inflight() -> InflightGuard {
    INFLIGHT_CONNECTIONS.inc();
    InflightGuard { _private: () }
}

pub fn record_request(outcome: &str, bytes_out: u64) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    if bytes_out > 0 {
        RELAYED_BYTES_TOTAL.inc_by(bytes_out);
    }
}

pub fn record_cache_lookup(hit: bool) {
    let label = if hit { "hit" } else { "miss" };
    CACHE_LOOKUP_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_cache_store() {
    CACHE_STORE_TOTAL.inc();
}

pub fn record_cache_store_skipped(reason: &str) {
    CACHE_STORE_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_cache_evictions(count: usize) {
    CACHE_EVICTIONS_TOTAL.inc_by(count as u64);
}

/// Handles to the `cache_bytes` and `cache_entries` gauges. A cache owns one and updates it
/// while holding its own lock, so the gauges never lag behind a later mutation.
#[derive(Clone)]
pub struct CacheUsageGauges {
    bytes: IntGauge,
    entries: IntGauge,
}

impl CacheUsageGauges {
    pub fn registered() -> Self {
        Self {
            bytes: CACHE_BYTES.clone(),
            entries: CACHE_ENTRIES.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            bytes: IntGauge::new("cache_bytes", "test").expect("gauge"),
            entries: IntGauge::new("cache_entries", "test").expect("gauge"),
        }
    }

    pub fn set(&self, bytes: usize, entries: usize) {
        self.bytes.set(bytes as i64);
        self.entries.set(entries as i64);
    }

    pub fn get(&self) -> (usize, usize) {
        (self.bytes.get() as usize, self.entries.get() as usize)
    }
}

impl std::fmt::Debug for CacheUsageGauges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (bytes, entries) = self.get();
        f.debug_struct("CacheUsageGauges")
            .field("bytes", &bytes)
            .field("entries", &entries)
            .finish()
    }
}

pub fn gather() -> Vec<u8> {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("encode metrics");
    buffer
}

/// Serve `GET /metrics` in the Prometheus text format until the listener fails.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(err) = handle_scrape(
                stream,
                METRICS_PATH,
                METRICS_READ_TIMEOUT,
                METRICS_MAX_REQUEST_BYTES,
            )
            .await
            {
                tracing::debug!(error = %err, "metrics handler error");
            }
        });
    }
}

/// Answer one scrape. The request line and headers together may not exceed `max_bytes`, and
/// each line must arrive within `read_timeout`.
async fn handle_scrape<S>(
    stream: S,
    path: &str,
    read_timeout: Duration,
    max_bytes: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut budget = max_bytes;
    let mut request_target: Option<(String, String)> = None;

    loop {
        let read = timeout(read_timeout, read_line(&mut reader, &mut line, budget))
            .await
            .map_err(|_| anyhow!("timed out reading metrics request"))?
            .map_err(|err| match err {
                LineError::TooLong { .. } => anyhow!("metrics request exceeded allowed size"),
                LineError::Io(source) => anyhow!(source).context("reading metrics request"),
            })?;
        if read == 0 {
            break;
        }
        budget = budget
            .checked_sub(read)
            .ok_or_else(|| anyhow!("metrics request exceeded allowed size"))?;

        if request_target.is_none() {
            let text = String::from_utf8_lossy(&line);
            let mut parts = text.split_ascii_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let uri = parts.next().unwrap_or_default().to_string();
            request_target = Some((method, uri));
        } else if classify_request_header(&line) == HeaderAction::EndOfHeaders {
            break;
        }
    }

    let Some((method, uri)) = request_target else {
        return Ok(());
    };

    let response = if method == "GET" && uri == path {
        scrape_response(StatusCode::OK, TextEncoder::new().format_type(), gather())
    } else {
        scrape_response(StatusCode::NOT_FOUND, "text/plain", b"not found".to_vec())
    };

    let stream = reader.get_mut();
    stream.write_all(&response).await?;
    stream.shutdown().await?;
    Ok(())
}

fn scrape_response(status: StatusCode, content_type: &str, body: Vec<u8>) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status.as_str(),
        status.canonical_reason().unwrap_or_default(),
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    response
}
