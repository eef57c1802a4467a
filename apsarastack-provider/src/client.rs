//! Client handed back to resource operations after configure

use std::sync::Arc;

use log::debug;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Build an HTTP client honoring the proxy and insecure settings
pub fn http_client(proxy: &str, insecure: bool) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(insecure);

    if !proxy.is_empty() {
        let proxy_config = reqwest::Proxy::all(proxy).map_err(|source| ClientError::InvalidProxy {
            proxy: proxy.to_string(),
            source,
        })?;
        builder = builder.proxy(proxy_config);
    }

    builder.build().map_err(ClientError::Build)
}

#[derive(Debug, Clone)]
pub struct ApsaraStackClient {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl ApsaraStackClient {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let http = http_client(&config.proxy, config.insecure)?;
        debug!(
            "Created client for region {} (configuration source: {})",
            config.region, config.configuration_source
        );
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Host serving `service`
    pub fn endpoint(&self, service: &str) -> String {
        self.config
            .endpoints
            .resolve(service, &self.config.region)
    }

    /// Base URL for `service` using the configured protocol
    pub fn base_url(&self, service: &str) -> String {
        let endpoint = self.endpoint(service);
        if endpoint.contains("://") {
            endpoint
        } else {
            format!("{}://{}", self.config.protocol.scheme(), endpoint)
        }
    }
}
