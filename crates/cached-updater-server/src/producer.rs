//! Report producer backed by an HTTP endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use cached_updater_core::{Producer, ProducerError, Snapshot};
use serde_json::Value;
use url::Url;

/// Fetches a JSON document with `GET` on every refresh.
#[derive(Debug, Clone)]
pub struct HttpReportProducer {
    http_client: reqwest::Client,
    url: Url,
}

impl HttpReportProducer {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http_client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch(&self) -> Result<Value, ProducerError> {
        let started = Instant::now();
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                ProducerError::Timeout {
                    elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                }
            } else if e.is_decode() {
                ProducerError::decode(e.to_string())
            } else {
                ProducerError::upstream(e.to_string())
            }
        };

        let response = self
            .http_client
            .get(self.url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProducerError::upstream(format!(
                "report endpoint returned {status}: {body}"
            )));
        }

        response.json::<Value>().await.map_err(classify)
    }
}

#[async_trait]
impl Producer for HttpReportProducer {
    type Output = Value;

    async fn produce(&self) -> Snapshot<Value> {
        let result = self.fetch().await;
        if let Err(e) = &result {
            tracing::debug!(url = %self.url, error = %e, "Report fetch failed");
        }
        Snapshot::from(result)
    }
}
