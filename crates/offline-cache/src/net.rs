//! # Network
//!
//! The live-fetch seam of the worker and its `reqwest` implementation.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::FetchError;
use crate::types::{Request, Response};

/// Performs live network fetches.
///
/// Any response the server produced, whatever its status, is `Ok`; `Err`
/// means no response was obtained.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &NetworkConfig) -> Result<Client, FetchError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout().is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout());
    }

    if let Some(timeout) = config.timeout() {
        client_builder = client_builder.timeout(timeout);
    }

    client_builder.build().map_err(FetchError::from)
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(format!("header {name}: {e}")))?;
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response.bytes().await?;

        debug!(url = %request.url, status, size = body.len(), "Fetched from network");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
