pub mod cli;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod settings;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::proxy::cache::ObjectCache;
use crate::proxy::upstream::TcpConnector;
use crate::settings::Settings;

pub async fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    if let Some(addr) = settings.metrics_listen {
        tokio::spawn(async move {
            info!(address = %addr, "metrics endpoint starting");
            if let Err(err) = metrics::serve(addr).await {
                error!(error = %err, "metrics endpoint failed");
            }
        });
    }

    let cache = Arc::new(ObjectCache::from_settings(&settings)?);
    info!(
        capacity = settings.cache_total_capacity,
        max_object_size = settings.cache_max_object_size,
        "object cache ready"
    );

    let app = proxy::AppContext::new(settings, cache, Arc::new(TcpConnector));
    proxy::run(app, shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C; shutting down"),
        _ = terminate => info!("received SIGTERM; shutting down"),
    }
}
