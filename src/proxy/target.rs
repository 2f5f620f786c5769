use std::fmt;

pub const DEFAULT_PORT: &str = "80";

const HTTP_SCHEME: &str = "http://";

/// Where a request points: upstream host and port plus the path+query sent to it.
///
/// Also the cache key. Fields are compared textually and case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: String,
    pub uri: String,
}

impl Target {
    pub fn new(host: impl Into<String>, port: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            uri: uri.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.uri)
    }
}

/// Decompose an absolute URL (or a bare `host[:port][/path]`) into a [`Target`].
///
/// Never fails: anything unrecognizable ends up as the host with the default port and `/`, and
/// the upstream connect reports the real problem.
pub fn resolve_target(url: &str) -> Target {
    let rest = url.strip_prefix(HTTP_SCHEME).unwrap_or(url);

    let slash = rest.find('/');
    let (authority, uri) = match slash {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, port),
        None => (authority, DEFAULT_PORT),
    };

    let uri = if uri.is_empty() { "/" } else { uri };

    Target::new(host, port, uri)
}
