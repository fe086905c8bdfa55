use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use product_sink::BatchSink;
use sync_core::{Backoff, BackoffConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::ingest::{IngestLoop, IngestSummary};
use crate::consumer::{ConsumerConfig, KafkaConsumer};

/// Configuration for the Kafka source.
#[derive(Debug, Clone, Parser)]
pub struct Config {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[clap(
        long,
        value_delimiter = ',',
        default_value = "localhost:9092",
        env = "KAFKA_BROKERS"
    )]
    pub brokers: Vec<String>,
    /// Consumer group ID
    #[clap(long, default_value = "product-sync-consumer-group", env = "KAFKA_GROUP_ID")]
    pub group_id: String,
    /// Topic to consume from
    #[clap(long, default_value = "products", env = "KAFKA_TOPIC")]
    pub topic: String,
    /// Maximum number of messages fetched, written and committed together.
    /// Larger batches mean fewer bulk requests, but more records replayed
    /// after a failed write.
    #[clap(long, default_value_t = 100)]
    pub batch_size: usize,
    /// Session timeout in milliseconds
    #[clap(long, default_value = "6000")]
    pub session_timeout_ms: String,
    /// Heartbeat interval in milliseconds
    #[clap(long, default_value = "1500")]
    pub heartbeat_interval_ms: String,
    /// Where to start when the group has no committed offset ("earliest" or "latest")
    #[clap(long, default_value = "earliest")]
    pub auto_offset_reset: String,
    /// Number of consumers in the consumer group to spawn
    #[clap(long, default_value_t = 1)]
    pub num_consumers: usize,
}

impl Config {
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            brokers: self.brokers.join(","),
            group_id: self.group_id.clone(),
            topic: self.topic.clone(),
            batch_size: self.batch_size,
            auto_offset_reset: self.auto_offset_reset.clone(),
            session_timeout_ms: self.session_timeout_ms.clone(),
            heartbeat_interval_ms: self.heartbeat_interval_ms.clone(),
            ..Default::default()
        }
    }
}

/// Run ingestion from Kafka into `sink` until `cancel` fires.
///
/// Spawns `num_consumers` loops in the same consumer group, each with its
/// own Kafka consumer, backoff and offsets. Kafka assigns partitions between
/// them. If any loop hits a fatal fetch error the others are stopped and the
/// first error is returned.
pub async fn run_ingest<S: BatchSink + 'static>(
    sink: Arc<S>,
    config: Config,
    backoff: BackoffConfig,
    cancel: CancellationToken,
) -> anyhow::Result<IngestSummary> {
    backoff.validate().context("Invalid backoff configuration")?;

    info!(
        "Starting ingestion from topic {} as group {} ({} consumers, batch size {})",
        config.topic, config.group_id, config.num_consumers, config.batch_size
    );

    let consumer_config = config.consumer_config();
    let mut consumers = Vec::new();
    for i in 0..config.num_consumers.max(1) {
        let consumer = KafkaConsumer::new(consumer_config.clone())
            .with_context(|| format!("Failed to create consumer {i}"))?;
        consumers.push(consumer);
    }
    if let Some(consumer) = consumers.first() {
        consumer.ping().context("Failed to reach Kafka brokers")?;
    }

    let group_cancel = cancel.child_token();
    let mut handles = Vec::new();

    for (i, consumer) in consumers.into_iter().enumerate() {
        let backoff = Backoff::new(backoff.clone())?;
        let sink = Arc::clone(&sink);
        let cancel = group_cancel.clone();

        handles.push(tokio::spawn(async move {
            let mut ingest = IngestLoop::new(consumer, sink, backoff);
            let result = ingest.run(&cancel).await;
            if result.is_err() {
                // Stop the rest of the group; the caller decides what happens next
                cancel.cancel();
            }
            result
        }));
        debug!("Spawned consumer {i}");
    }

    let mut summary = IngestSummary::default();
    let mut first_error: Option<anyhow::Error> = None;

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(consumer_summary)) => summary.merge(&consumer_summary),
            Ok(Err(e)) => {
                error!("Consumer {i} stopped with a fatal error: {e}");
                first_error.get_or_insert_with(|| {
                    anyhow::Error::new(e).context(format!("Consumer {i} failed"))
                });
            }
            Err(e) => {
                error!("Consumer {i} task panicked or was aborted: {e}");
                first_error
                    .get_or_insert_with(|| anyhow::anyhow!("Consumer {i} task failed: {e}"));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    info!(
        "Ingestion from topic {} completed: {} records written from {} messages",
        config.topic, summary.records_written, summary.messages_fetched
    );
    Ok(summary)
}
