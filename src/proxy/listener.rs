use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use super::{AppContext, http};
use crate::metrics;

pub async fn start_listener<F>(app: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let bind_addr = app.settings.listen;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;
    serve(listener, app, shutdown).await
}

/// Accept connections on `listener`, one worker task each, until `shutdown` resolves.
///
/// In-flight exchanges are allowed to finish before the cache is released.
pub async fn serve<F>(listener: TcpListener, app: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!(address = %local_addr, "proxy listener started");

    let mut workers = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(inflight = workers.len(), "shutdown requested; no longer accepting connections");
                break;
            }
            Some(joined) = workers.join_next(), if !workers.is_empty() => log_worker_exit(joined),
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!(error = %err, "failed to accept incoming connection");
                        continue;
                    }
                };
                debug!(peer = %peer_addr, "accepted connection");
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(peer = %peer_addr, error = %err, "failed to set TCP_NODELAY on downstream stream");
                }
                workers.spawn(handle_connection(stream, peer_addr, app.clone()));
            }
        }
    }

    drop(listener);
    while let Some(joined) = workers.join_next().await {
        log_worker_exit(joined);
    }

    let stats = app.cache.stats();
    let released = app.cache.clear();
    info!(
        entries = stats.entries,
        released_bytes = released,
        "object cache released"
    );
    Ok(())
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, app: AppContext) {
    let _inflight = metrics::track_inflight();
    if let Err(err) = http::handle_http(stream, peer, app).await {
        debug!(peer = %peer, error = %err, "connection closed with error");
    }
}

fn log_worker_exit(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            error!(error = %err, "connection worker panicked");
        } else {
            debug!(error = %err, "connection worker cancelled");
        }
    }
}
