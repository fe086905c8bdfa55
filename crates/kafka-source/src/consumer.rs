use crate::client::{Fetch, LogClient};
use crate::error::{Error, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    CommitMode, Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use sync_core::{OffsetSet, RawMessage};
use tokio_util::sync::CancellationToken;

/// Timeout for the startup connectivity check
const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for Kafka consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to consume from
    pub topic: String,
    /// Maximum number of messages returned by one fetch
    ///
    /// A larger batch means fewer bulk requests and commits, in exchange for
    /// more memory and more duplicates replayed after a failed write.
    pub batch_size: usize,
    /// How long a fetch keeps waiting for more messages once it has one
    pub linger: Duration,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// Only applies when the consumer group has no committed offset for a
    /// partition. "earliest" avoids skipping records produced before the
    /// group first started.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: String,
    /// Timeout for commit, seek and committed-offset lookups
    pub operation_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "product-sync-consumer-group".to_string(),
            topic: "products".to_string(),
            batch_size: 100,
            linger: Duration::from_millis(10),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "6000".to_string(),
            heartbeat_interval_ms: "1500".to_string(),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

impl ConsumerConfig {
    fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Kafka consumer with manual offset management.
///
/// Auto-commit is always disabled: offsets only move through
/// [`LogClient::commit`], after the caller has durably processed a batch.
pub struct KafkaConsumer {
    consumer: RdkafkaStreamConsumer,
    config: ConsumerConfig,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer subscribed to the configured topic
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        config.validate()?;

        let consumer: RdkafkaStreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("heartbeat.interval.ms", &config.heartbeat_interval_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| Error::Consumer(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| Error::Consumer(format!("Failed to subscribe to topic: {e}")))?;

        Ok(Self { consumer, config })
    }

    /// Check that the brokers are reachable and the topic exists
    pub fn ping(&self) -> Result<()> {
        let partitions = self.topic_partitions(PING_TIMEOUT)?;
        tracing::debug!(
            "Topic {} has {} partitions",
            self.config.topic,
            partitions.len()
        );
        Ok(())
    }

    fn topic_partitions(&self, timeout: Duration) -> Result<Vec<i32>> {
        let metadata = self
            .consumer
            .fetch_metadata(Some(&self.config.topic), timeout)
            .map_err(|e| Error::Consumer(format!("Failed to fetch metadata: {e}")))?;

        let topic = metadata
            .topics()
            .iter()
            .find(|t| t.name() == self.config.topic)
            .ok_or_else(|| Error::Consumer(format!("Topic {} not found", self.config.topic)))?;

        if let Some(err) = topic.error() {
            return Err(Error::Consumer(format!(
                "Topic {} metadata error: {err:?}",
                self.config.topic
            )));
        }

        let partitions: Vec<i32> = topic.partitions().iter().map(|p| p.id()).collect();
        if partitions.is_empty() {
            return Err(Error::Consumer(format!(
                "Topic {} has no partitions",
                self.config.topic
            )));
        }
        Ok(partitions)
    }

    fn to_raw(msg: &RdkafkaBorrowedMessage) -> RawMessage {
        RawMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(|k| k.to_vec()),
            payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
        }
    }

    fn to_partition_list(offsets: &OffsetSet) -> Result<TopicPartitionList> {
        let mut tpl = TopicPartitionList::new();
        for (tp, next) in offsets.iter() {
            tpl.add_partition_offset(&tp.topic, tp.partition, Offset::Offset(next))
                .map_err(|e| Error::Consumer(format!("Failed to add partition offset: {e}")))?;
        }
        Ok(tpl)
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Get the underlying consumer (for advanced use cases)
    pub fn inner(&self) -> &RdkafkaStreamConsumer {
        &self.consumer
    }
}

#[async_trait::async_trait]
impl LogClient for KafkaConsumer {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Fetch> {
        // Block for the first message
        let first = tokio::select! {
            _ = cancel.cancelled() => return Ok(Fetch::Closed),
            msg = self.consumer.recv() => {
                let msg = msg
                    .map_err(|e| Error::Consumer(format!("Error receiving message: {e}")))?;
                Self::to_raw(&msg)
            }
        };
        let mut messages = vec![first];

        // Then take whatever else arrives within the linger window
        while messages.len() < self.config.batch_size {
            match tokio::time::timeout(self.config.linger, self.consumer.recv()).await {
                Ok(Ok(msg)) => messages.push(Self::to_raw(&msg)),
                Ok(Err(e)) => {
                    return Err(Error::Consumer(format!("Error receiving message: {e}")))
                }
                Err(_) => break,
            }
        }

        Ok(Fetch::Records(messages))
    }

    async fn commit(&mut self, offsets: &OffsetSet) -> Result<()> {
        if offsets.is_empty() {
            return Ok(());
        }

        let tpl = Self::to_partition_list(offsets)?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| Error::Consumer(format!("Failed to commit offset: {e}")))?;

        Ok(())
    }

    async fn reset_position(&mut self, offsets: &OffsetSet) -> Result<()> {
        for (tp, next) in offsets.iter() {
            self.consumer
                .seek(
                    &tp.topic,
                    tp.partition,
                    Offset::Offset(next),
                    self.config.operation_timeout,
                )
                .map_err(|e| Error::Consumer(format!("Failed to seek {tp} to {next}: {e}")))?;
        }
        Ok(())
    }

    async fn committed_offsets(&self) -> Result<OffsetSet> {
        let mut tpl = TopicPartitionList::new();
        for partition in self.topic_partitions(self.config.operation_timeout)? {
            tpl.add_partition(&self.config.topic, partition);
        }

        let committed = self
            .consumer
            .committed_offsets(tpl, self.config.operation_timeout)
            .map_err(|e| Error::Consumer(format!("Failed to read committed offsets: {e}")))?;

        let mut offsets = OffsetSet::new();
        for elem in committed.elements() {
            // Partitions without a commit come back as Offset::Invalid
            if let Offset::Offset(next) = elem.offset() {
                offsets.insert(elem.topic(), elem.partition(), next);
            }
        }
        Ok(offsets)
    }
}
