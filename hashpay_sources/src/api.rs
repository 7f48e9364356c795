use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::ProviderError;

/// Every provider call gives up after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A thin JSON-over-HTTP client bound to one provider's base URL.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(base_url: &str, headers: HeaderMap) -> Result<Self, ProviderError> {
        let mut headers = headers;
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T, ProviderError> {
        self.rest_query::<T, ()>(Method::GET, path, params, HeaderMap::new(), None).await
    }

    /// Sends a request and decodes a JSON response. Non-2xx responses become [`ProviderError::QueryError`].
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        headers: HeaderMap,
        body: Option<B>,
    ) -> Result<T, ProviderError> {
        let url = self.url(path);
        trace!("🔌️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url).headers(headers);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("🔌️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProviderError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(ProviderError::QueryError { status, message })
        }
    }
}
