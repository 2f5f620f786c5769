use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::proxy::request::MalformedRequestLine;

/// Ways a single client exchange can end early.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("client closed the connection before sending a request line")]
    EmptyRequest,
    #[error("malformed request line: {0}")]
    MalformedRequestLine(#[from] MalformedRequestLine),
    #[error("request header line exceeds configured limit of {limit} bytes")]
    HeaderTooLong { limit: usize },
    #[error("failed to connect to upstream {host}:{port}")]
    UpstreamConnect {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("client connection failed")]
    ClientIo(#[source] io::Error),
    #[error("upstream connection failed")]
    UpstreamIo(#[source] io::Error),
}

impl ExchangeError {
    /// Errors answered with the fixed 400 response. Others happen after relaying has started,
    /// when a second status line would corrupt what the client already received.
    pub fn wants_bad_request(&self) -> bool {
        matches!(
            self,
            Self::EmptyRequest
                | Self::MalformedRequestLine(_)
                | Self::HeaderTooLong { .. }
                | Self::UpstreamConnect { .. }
        )
    }

    /// Short label used in access logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyRequest => "empty_request",
            Self::MalformedRequestLine(_) => "malformed_request_line",
            Self::HeaderTooLong { .. } => "header_too_long",
            Self::UpstreamConnect { .. } => "upstream_connect",
            Self::ClientIo(_) => "client_io",
            Self::UpstreamIo(_) => "upstream_io",
        }
    }

    /// Outcome label for the `requests_total` metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::EmptyRequest | Self::MalformedRequestLine(_) | Self::HeaderTooLong { .. } => {
                "rejected"
            }
            Self::UpstreamConnect { .. } => "upstream_error",
            Self::ClientIo(_) | Self::UpstreamIo(_) => "aborted",
        }
    }
}

pub fn log_exchange_error(err: &ExchangeError, peer: SocketAddr) {
    match err {
        ExchangeError::EmptyRequest => debug!(peer = %peer, "empty request"),
        ExchangeError::MalformedRequestLine(reason) => {
            debug!(peer = %peer, error = %reason, "invalid HTTP request line")
        }
        ExchangeError::HeaderTooLong { limit } => {
            debug!(peer = %peer, limit, "request header line too long")
        }
        ExchangeError::UpstreamConnect { host, port, source } => warn!(
            peer = %peer,
            host = %host,
            port = %port,
            error = %source,
            "upstream connection failed"
        ),
        ExchangeError::ClientIo(source) => {
            debug!(peer = %peer, error = %source, "client connection failed mid-exchange")
        }
        ExchangeError::UpstreamIo(source) => warn!(
            peer = %peer,
            error = %source,
            "upstream connection failed mid-exchange"
        ),
    }
}
