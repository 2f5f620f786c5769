#![allow(dead_code)]

mod harness;
mod http_utils;
mod net;
mod proxy_client;
mod upstream;

pub use harness::{ProxyHarness, ProxyHarnessBuilder};
pub use http_utils::{body_of, http_ok_response, read_until_double_crlf, status_of};
pub use net::unused_local_port;
pub use proxy_client::ProxyClient;
pub use upstream::TestUpstream;

pub const BAD_REQUEST: &[u8] =
    b"HTTP/1.0 400 Bad Request\r\nContent-Type: plain/text\r\nContent-Length: 0\r\n\r\n";
