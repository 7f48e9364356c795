use std::sync::Arc;

use async_trait::async_trait;
use hashpay_engine::{db_types::NotificationKind, DeliveryError, DeliveryRequest, NotificationDispatcher};
use log::*;
use reqwest::Client;
use serde_json::json;

use crate::{api::DEFAULT_TIMEOUT, ProviderError};

/// Delivers notifications over HTTP.
///
/// * Callbacks and webhooks are POSTed as JSON to the merchant's URL, with the merchant's API key in `X-Api-Key`. Any
///   2xx response counts as delivered.
/// * Alerts are POSTed as `{"target": .., "text": ..}` to the operator webhook. Without one they are only logged.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Arc<Client>,
    alert_webhook: Option<String>,
}

impl HttpNotifier {
    pub fn new(alert_webhook: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        let alert_webhook = alert_webhook.filter(|url| !url.trim().is_empty());
        Ok(Self { client: Arc::new(client), alert_webhook })
    }

    async fn post(&self, url: &str, body: String, api_key: Option<&str>) -> Result<(), DeliveryError> {
        if !is_http_url(url) {
            return Err(DeliveryError::InvalidTarget(url.to_string()));
        }
        let mut req = self.client.post(url).header("Content-Type", "application/json").body(body);
        if let Some(key) = api_key {
            req = req.header("X-Api-Key", key);
        }
        let response = req.send().await.map_err(ProviderError::from)?;
        let status = response.status();
        if status.is_success() {
            trace!("📨️ {url} accepted the notification. {status}");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected { status: status.as_u16(), body })
        }
    }

    async fn alert(&self, request: &DeliveryRequest) -> Result<(), DeliveryError> {
        match &self.alert_webhook {
            Some(url) => {
                let body = json!({ "target": request.target, "text": request.payload }).to_string();
                self.post(url, body, None).await
            },
            None => {
                info!("📨️ [{}] {}", request.target, request.payload);
                Ok(())
            },
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("https://") || url.starts_with("http://")
}

#[async_trait]
impl NotificationDispatcher for HttpNotifier {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError> {
        match request.kind {
            NotificationKind::Alert => self.alert(request).await,
            NotificationKind::Callback | NotificationKind::Webhook => {
                let api_key = request.api_key.as_ref().map(|k| k.reveal().as_str());
                self.post(&request.target, request.payload.clone(), api_key).await
            },
        }
    }
}
