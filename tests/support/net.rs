use std::net::Ipv4Addr;

use anyhow::Result;

/// A loopback port nothing is listening on, for refused-connection scenarios.
pub fn unused_local_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
