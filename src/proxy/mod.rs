pub mod cache;
pub mod exchange_error;
pub mod headers;
pub mod http;
pub mod listener;
pub mod request;
pub mod target;
pub mod upstream;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::settings::Settings;
use cache::ObjectCache;
use upstream::UpstreamConnector;

/// Everything a connection worker shares with its siblings.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub cache: Arc<ObjectCache>,
    pub connector: Arc<dyn UpstreamConnector>,
}

impl AppContext {
    pub fn new(
        settings: Arc<Settings>,
        cache: Arc<ObjectCache>,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Self {
        Self {
            settings,
            cache,
            connector,
        }
    }
}

pub async fn run<F>(app: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    listener::start_listener(app, shutdown).await
}
