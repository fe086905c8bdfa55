//! product-sync library
//!
//! Keeps an Elasticsearch index of floral products in step with a Kafka topic.
//! Records are consumed in batches, written through the `_bulk` API, and the
//! consumer group's offsets are committed only once a write has succeeded.
//!
//! # Crates
//!
//! - `sync_core` - product records, offsets, decoding and the backoff policy
//! - `product_sink` - the `BatchSink` trait and batch outcomes
//! - `elasticsearch_sink` - bulk writer over HTTP
//! - `product_sync_kafka_source` - Kafka consumer and the ingestion loop
//!
//! # CLI Usage
//!
//! ```bash
//! # Ingest from a local broker into a local cluster
//! product-sync ingest --brokers localhost:9092 --topic products \
//!   --es-endpoint http://127.0.0.1:9200 --es-index floral-products
//!
//! # Show what the consumer group has committed so far
//! product-sync offsets --brokers localhost:9092 --topic products
//! ```

use anyhow::Context;
use clap::Parser;
use elasticsearch_sink::ElasticsearchConfig;
use sync_core::BackoffConfig;

pub mod config;
pub mod signal;

pub use config::parse_duration;

// Re-export the source crate for convenience
pub use product_sync_kafka_source as kafka;

#[derive(Parser, Clone, Debug)]
pub struct ElasticsearchOpts {
    /// Elasticsearch base URL
    #[arg(long, default_value = "http://127.0.0.1:9200", env = "ES_ENDPOINT")]
    pub es_endpoint: String,

    /// Index products are written to
    #[arg(long, default_value = "floral-products", env = "ES_INDEX")]
    pub es_index: String,

    /// Timeout for one bulk request (e.g. "30s", "500ms")
    #[arg(long, default_value = "30s")]
    pub es_timeout: String,

    /// Retry a batch when items are rejected with a retryable status (429 or 5xx)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub retry_item_errors: bool,
}

impl ElasticsearchOpts {
    pub fn to_config(&self) -> anyhow::Result<ElasticsearchConfig> {
        let timeout = parse_duration(&self.es_timeout)
            .with_context(|| format!("Invalid --es-timeout: {}", self.es_timeout))?;

        Ok(ElasticsearchConfig {
            endpoint: self.es_endpoint.clone(),
            index: self.es_index.clone(),
            timeout,
            retry_item_errors: self.retry_item_errors,
        })
    }
}

#[derive(Parser, Clone, Debug)]
pub struct BackoffOpts {
    /// Delay before the first retry of a failed batch
    #[arg(long, default_value = "1s")]
    pub backoff_start: String,

    /// Upper bound for the retry delay, before jitter
    #[arg(long, default_value = "30s")]
    pub backoff_max: String,

    /// Smallest random jitter added to each retry delay
    #[arg(long, default_value = "200ms")]
    pub jitter_min: String,

    /// Largest random jitter added to each retry delay
    #[arg(long, default_value = "1s")]
    pub jitter_max: String,

    /// Multiplier applied to the delay after each consecutive failure
    #[arg(long, default_value_t = 2.0)]
    pub backoff_factor: f64,
}

impl BackoffOpts {
    pub fn to_config(&self) -> anyhow::Result<BackoffConfig> {
        let config = BackoffConfig {
            start: parse_duration(&self.backoff_start)
                .with_context(|| format!("Invalid --backoff-start: {}", self.backoff_start))?,
            max: parse_duration(&self.backoff_max)
                .with_context(|| format!("Invalid --backoff-max: {}", self.backoff_max))?,
            jitter_min: parse_duration(&self.jitter_min)
                .with_context(|| format!("Invalid --jitter-min: {}", self.jitter_min))?,
            jitter_max: parse_duration(&self.jitter_max)
                .with_context(|| format!("Invalid --jitter-max: {}", self.jitter_max))?,
            factor: self.backoff_factor,
        };
        config.validate().context("Invalid backoff configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_opts_match_defaults() {
        let es = ElasticsearchOpts::parse_from(["ingest"]).to_config().unwrap();
        let defaults = ElasticsearchConfig::default();
        assert_eq!(es.endpoint, defaults.endpoint);
        assert_eq!(es.index, defaults.index);
        assert_eq!(es.timeout, defaults.timeout);
        assert!(es.retry_item_errors);

        let backoff = BackoffOpts::parse_from(["ingest"]).to_config().unwrap();
        assert_eq!(backoff, BackoffConfig::default());
    }

    #[test]
    fn test_backoff_opts_parse_durations() {
        let backoff = BackoffOpts::parse_from([
            "ingest",
            "--backoff-start",
            "250ms",
            "--backoff-max",
            "1m",
            "--jitter-min",
            "0",
            "--jitter-max",
            "50ms",
            "--backoff-factor",
            "1.5",
        ])
        .to_config()
        .unwrap();

        assert_eq!(backoff.start, Duration::from_millis(250));
        assert_eq!(backoff.max, Duration::from_secs(60));
        assert_eq!(backoff.jitter_min, Duration::ZERO);
        assert_eq!(backoff.jitter_max, Duration::from_millis(50));
        assert_eq!(backoff.factor, 1.5);
    }

    #[test]
    fn test_backoff_opts_reject_invalid() {
        let start_after_max =
            BackoffOpts::parse_from(["ingest", "--backoff-start", "1m", "--backoff-max", "1s"]);
        assert!(start_after_max.to_config().is_err());

        let bad_duration = BackoffOpts::parse_from(["ingest", "--jitter-max", "soon"]);
        let err = bad_duration.to_config().unwrap_err();
        assert!(format!("{err:#}").contains("--jitter-max"));
    }

    #[test]
    fn test_item_error_retries_can_be_disabled() {
        let es = ElasticsearchOpts::parse_from(["ingest", "--retry-item-errors", "false"])
            .to_config()
            .unwrap();
        assert!(!es.retry_item_errors);
    }
}
