use std::time::Duration;

use anyhow::Context;
use product_sink::{BatchOutcome, BatchSink, SinkError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use sync_core::Product;

use crate::bulk::{encode_bulk_body, BulkSummary};

/// Highest status code still treated as a successful bulk write.
const MAX_SUCCESS_STATUS: u16 = 399;

#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster, e.g. `http://127.0.0.1:9200`
    pub endpoint: String,
    /// Index every product is written to
    pub index: String,
    /// Timeout for one bulk request, including reading the response
    pub timeout: Duration,
    /// Fail the batch when items were rejected with a retryable status (429
    /// or 5xx). Items rejected for any other reason are logged and skipped,
    /// since replaying them can never succeed.
    pub retry_item_errors: bool,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9200".to_string(),
            index: "floral-products".to_string(),
            timeout: Duration::from_secs(30),
            retry_item_errors: true,
        }
    }
}

/// Bulk writer for an Elasticsearch-compatible `_bulk` endpoint.
///
/// One call to [`BatchSink::write_batch`] is exactly one HTTP request (or
/// none, for an empty batch). Retrying is left to the caller.
pub struct ElasticsearchSink {
    client: Client,
    bulk_url: String,
    config: ElasticsearchConfig,
}

impl ElasticsearchSink {
    pub fn new(config: ElasticsearchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client for Elasticsearch")?;
        let bulk_url = format!("{}/_bulk", config.endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            bulk_url,
            config,
        })
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }
}

fn request_error(e: reqwest::Error) -> SinkError {
    if e.is_timeout() {
        SinkError::Timeout
    } else {
        SinkError::Transport(e.to_string())
    }
}

#[async_trait::async_trait]
impl BatchSink for ElasticsearchSink {
    async fn write_batch(&self, records: &[Product]) -> BatchOutcome {
        if records.is_empty() {
            tracing::debug!("Empty batch, skipping bulk request");
            return BatchOutcome::success(String::new());
        }

        let body = match encode_bulk_body(&self.config.index, records) {
            Ok(body) => body,
            Err(e) => return BatchOutcome::failure(SinkError::Serialization(e), None),
        };

        tracing::debug!(
            "Sending bulk request with {} records ({} bytes) to {}",
            records.len(),
            body.len(),
            self.bulk_url
        );

        let response = match self
            .client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return BatchOutcome::failure(request_error(e), None),
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return BatchOutcome::failure(request_error(e), None),
        };

        if status > MAX_SUCCESS_STATUS {
            return BatchOutcome::failure(SinkError::Status { status }, Some(text));
        }

        if let Some(summary) = BulkSummary::parse(&text, records.len()) {
            if self.config.retry_item_errors && summary.retryable > 0 {
                return BatchOutcome::failure(
                    SinkError::PartialFailure {
                        retryable: summary.retryable,
                        total: summary.total,
                    },
                    Some(text),
                );
            }
            if summary.failed > 0 {
                tracing::warn!(
                    "{} of {} records were rejected by index {} and will not be retried: {}",
                    summary.failed,
                    summary.total,
                    self.config.index,
                    text
                );
            }
        }

        BatchOutcome::success(text)
    }
}
