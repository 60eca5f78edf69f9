//! HTTP transport collaborator
//!
//! Cookies, TLS and compression are the client's business. Redirects are not
//! followed: a 3xx comes back as an ordinary response so its `Location` can be
//! run through scope and dedup like any other discovered link.

use crate::config::UserAgentConfig;
use crate::dispatcher::exchange::{ExchangeRequest, ExchangeResponse, RequestBody};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::{multipart, redirect::Policy, Client, Method};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs the network I/O of one exchange
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `cookies` - Cookie store shared with whoever replays login sequences
/// * `timeout` - Overall request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    cookies: Arc<Jar>,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .cookie_provider(cookies)
        // Targets under test routinely carry self-signed certificates
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport backed by a reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            TransportError::InvalidRequest(format!("bad method '{}'", request.method))
        })?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        builder = match &request.body {
            Some(RequestBody::UrlEncoded(params)) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(params.clone()),
            Some(RequestBody::Multipart(fields)) => {
                let form = fields.iter().fold(multipart::Form::new(), |form, (name, value)| {
                    form.text(name.clone(), value.clone())
                });
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(ExchangeResponse {
            status,
            headers,
            body,
            final_url,
        })
    }
}
