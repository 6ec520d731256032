pub mod api;
pub mod config;
pub mod error;
pub mod scraper;
pub mod ui;

use std::sync::Arc;
use config::Config;
use reqwest::Client;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Connection pool only; responses are never cached.
    pub client: Client,
}

impl AppState {
    pub fn new(config: Config) -> error::Result<Self> {
        let client = crate::scraper::build_client(config.fetch_timeout)?;
        Ok(AppState {
            config: Arc::new(config),
            client,
        })
    }
}
