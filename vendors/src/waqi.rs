//! World Air Quality Index client
//!
//! One client serves both collaborator roles: the map bounds query lists the
//! stations inside a box and the geolocalized feed returns a station's
//! current PM2.5 value.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde_json::Value;

use airq_core::{ApiToken, Bounds, DiscoveryError, FetchError, Target, TargetDiscovery, TargetFetcher};

use crate::extract::{extract_pm25, extract_stations, ExtractError};
use crate::http::{ClientError, HttpConfig};

/// Public WAQI endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

/// WAQI client implementing [`TargetDiscovery`] and [`TargetFetcher`]
#[derive(Debug, Clone)]
pub struct WaqiClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl WaqiClient {
    /// Create a client for the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP configuration is invalid.
    pub fn new(config: &HttpConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: config.build_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: config.request_timeout,
        })
    }

    /// Point the client at another endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_request(&self, bounds: &Bounds, token: &ApiToken) -> reqwest::Result<Request> {
        self.client
            .get(format!("{}/v2/map/bounds", self.base_url))
            .query(&[
                ("latlng", bounds.to_string().as_str()),
                ("networks", "all"),
                ("token", token.as_str()),
            ])
            .build()
    }

    fn feed_request(&self, target: &Target, token: &ApiToken) -> reqwest::Result<Request> {
        self.client
            .get(format!("{}/feed/geo:{}/", self.base_url, target))
            .query(&[("token", token.as_str())])
            .build()
    }

    /// Send a request and decode a 200 body as JSON
    async fn send(&self, request: Request) -> Result<Value, SendError> {
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SendError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Failure of one request, before it is mapped to a trait error
#[derive(Debug)]
enum SendError {
    Http(reqwest::Error),
    Status(u16),
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        SendError::Http(e)
    }
}

#[async_trait]
impl TargetDiscovery for WaqiClient {
    fn name(&self) -> &str {
        "waqi"
    }

    async fn discover(
        &self,
        bounds: &Bounds,
        token: &ApiToken,
    ) -> Result<Vec<Target>, DiscoveryError> {
        let request = self
            .map_request(bounds, token)
            .map_err(|e| DiscoveryError::Transport(Box::new(e)))?;

        let body = match self.send(request).await {
            Ok(body) => body,
            Err(SendError::Status(code)) => return Err(DiscoveryError::Status(code)),
            Err(SendError::Http(e)) if e.is_decode() => {
                return Err(DiscoveryError::Malformed(e.to_string()))
            }
            Err(SendError::Http(e)) => return Err(DiscoveryError::Transport(Box::new(e))),
        };

        let stations = extract_stations(&body).map_err(|e| match e {
            ExtractError::Status { .. } => DiscoveryError::Api(e.to_string()),
            ExtractError::Shape(_) => DiscoveryError::Malformed(e.to_string()),
        })?;

        tracing::debug!(bounds = %bounds, stations = stations.len(), "Map bounds query answered");
        Ok(stations)
    }
}

#[async_trait]
impl TargetFetcher for WaqiClient {
    fn name(&self) -> &str {
        "waqi"
    }

    async fn fetch(&self, target: &Target, token: &ApiToken) -> Result<Option<f64>, FetchError> {
        let request = self
            .feed_request(target, token)
            .map_err(|e| FetchError::Transport(Box::new(e)))?;

        let body = match self.send(request).await {
            Ok(body) => body,
            Err(SendError::Status(code)) => return Err(FetchError::Status(code)),
            Err(SendError::Http(e)) if e.is_timeout() => {
                return Err(FetchError::Timeout(self.request_timeout))
            }
            Err(SendError::Http(e)) => return Err(FetchError::Transport(Box::new(e))),
        };

        extract_pm25(&body).map_err(|e| FetchError::Api(e.to_string()))
    }
}
