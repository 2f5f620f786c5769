use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use relaycache::{
    cli::LogFormat,
    proxy::{
        self, AppContext,
        cache::ObjectCache,
        upstream::{TcpConnector, UpstreamConnector, UpstreamStream},
    },
    settings::Settings,
};

/// Sends symbolic host names to fixed addresses; everything else goes through DNS.
#[derive(Debug, Default, Clone)]
struct RoutingConnector {
    routes: HashMap<String, IpAddr>,
}

impl RoutingConnector {
    fn route(mut self, host: &str, ip: IpAddr) -> Self {
        self.routes.insert(host.to_string(), ip);
        self
    }
}

#[async_trait]
impl UpstreamConnector for RoutingConnector {
    async fn connect(&self, host: &str, port: &str) -> io::Result<UpstreamStream> {
        match self.routes.get(host) {
            Some(ip) => TcpConnector.connect(&ip.to_string(), port).await,
            None => TcpConnector.connect(host, port).await,
        }
    }
}

fn default_test_settings() -> Settings {
    Settings {
        listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        log: LogFormat::Text,
        ..Settings::default()
    }
}

pub struct ProxyHarness {
    pub addr: SocketAddr,
    pub settings: Arc<Settings>,
    pub cache: Arc<ObjectCache>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl ProxyHarness {
    /// Stop accepting, wait for in-flight exchanges and the cache release.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.handle
            .await
            .map_err(|err| anyhow!("proxy task failed: {err}"))?
    }
}

pub struct ProxyHarnessBuilder {
    connector: RoutingConnector,
    settings_override: Option<Box<dyn FnOnce(&mut Settings) + Send>>,
}

impl ProxyHarnessBuilder {
    pub fn new() -> Self {
        Self {
            connector: RoutingConnector::default().route("origin", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            settings_override: None,
        }
    }

    pub fn route(mut self, host: &str, ip: IpAddr) -> Self {
        self.connector = self.connector.route(host, ip);
        self
    }

    pub fn with_settings<F>(mut self, func: F) -> Self
    where
        F: FnOnce(&mut Settings) + Send + 'static,
    {
        self.settings_override = Some(Box::new(func));
        self
    }

    pub async fn spawn(self) -> Result<ProxyHarness> {
        let mut settings = default_test_settings();
        if let Some(func) = self.settings_override {
            func(&mut settings);
        }
        settings.validate()?;

        let listener = TcpListener::bind(settings.listen).await?;
        let addr = listener.local_addr()?;
        let settings = Arc::new(settings);
        let cache = Arc::new(ObjectCache::from_settings(&settings)?);
        let app = AppContext::new(settings.clone(), cache.clone(), Arc::new(self.connector));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            proxy::listener::serve(listener, app, async move {
                let _ = shutdown_rx.await;
            })
            .await
        });

        Ok(ProxyHarness {
            addr,
            settings,
            cache,
            shutdown_tx,
            handle,
        })
    }
}

impl Default for ProxyHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
