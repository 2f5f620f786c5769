use http::Version;
use thiserror::Error;

/// Reasons a client request line is refused before any upstream work happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRequestLine {
    #[error("request line has no target")]
    MissingTarget,
    #[error("request line has no protocol version")]
    MissingVersion,
    #[error("request line has unexpected trailing token '{0}'")]
    TrailingToken(String),
    #[error("unsupported protocol version '{0}'")]
    UnsupportedVersion(String),
    #[error("request line exceeds configured limit of {limit} bytes")]
    TooLong { limit: usize },
    #[error("request line contained invalid bytes")]
    InvalidEncoding,
}

/// The three fields of an HTTP/1.x request line, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: Version,
}

impl RequestLine {
    pub fn version_str(&self) -> &'static str {
        version_str(self.version)
    }

    /// Request line sent upstream: the resolved path replaces the absolute URL.
    pub fn origin_form(&self, uri: &str) -> String {
        format!("{} {} {}\r\n", self.method, uri, self.version_str())
    }
}

pub fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

/// Split a raw request line into method, target and version.
///
/// Accepts the line with or without its `\r\n` terminator. Only the token count and the protocol
/// version are checked; the method and target are passed through untouched.
pub fn parse_request_line(line: &str) -> Result<RequestLine, MalformedRequestLine> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.split_ascii_whitespace();

    let method = parts.next().ok_or(MalformedRequestLine::MissingTarget)?;
    let target = parts.next().ok_or(MalformedRequestLine::MissingTarget)?;
    let version = parts.next().ok_or(MalformedRequestLine::MissingVersion)?;
    if let Some(extra) = parts.next() {
        return Err(MalformedRequestLine::TrailingToken(extra.to_string()));
    }

    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other => return Err(MalformedRequestLine::UnsupportedVersion(other.to_string())),
    };

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version,
    })
}
