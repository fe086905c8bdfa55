//! Command-line interface for product-sync
//!
//! # Usage Examples
//!
//! ## Ingest
//! ```bash
//! # Consume the products topic into the floral-products index
//! product-sync ingest \
//!   --brokers localhost:9092 \
//!   --group-id product-sync-consumer-group \
//!   --topic products \
//!   --es-endpoint http://127.0.0.1:9200 \
//!   --es-index floral-products
//!
//! # Two consumers in the group, slower retries
//! product-sync ingest --num-consumers 2 --backoff-start 5s --backoff-max 2m
//! ```
//!
//! ## Offsets
//! ```bash
//! # Committed offsets of the consumer group, one partition per line
//! product-sync offsets --topic products
//!
//! # The same as JSON
//! product-sync offsets --topic products --json
//! ```
//!
//! Logging is configured through `RUST_LOG`, e.g. `RUST_LOG=info`.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use elasticsearch_sink::ElasticsearchSink;
use product_sync::kafka::{self, KafkaConsumer, LogClient};
use product_sync::signal::shutdown_signal;
use product_sync::{BackoffOpts, ElasticsearchOpts};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "product-sync")]
#[command(about = "Sync product records from Kafka into Elasticsearch")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume products from Kafka and bulk-index them into Elasticsearch
    Ingest {
        /// Kafka consumer options
        #[command(flatten)]
        kafka: kafka::Config,

        /// Elasticsearch options
        #[command(flatten)]
        es: ElasticsearchOpts,

        /// Retry delay options
        #[command(flatten)]
        backoff: BackoffOpts,
    },

    /// Print the consumer group's committed offsets for the topic
    Offsets {
        /// Kafka consumer options
        #[command(flatten)]
        kafka: kafka::Config,

        /// Print the offsets as a JSON object
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { kafka, es, backoff } => run_ingest(kafka, es, backoff).await,
        Commands::Offsets { kafka, json } => print_offsets(kafka, json).await,
    }
}

async fn run_ingest(
    config: kafka::Config,
    es: ElasticsearchOpts,
    backoff: BackoffOpts,
) -> anyhow::Result<()> {
    let es_config = es.to_config()?;
    let backoff = backoff.to_config()?;

    info!(
        "Writing to index {} at {}",
        es_config.index, es_config.endpoint
    );
    let sink = Arc::new(ElasticsearchSink::new(es_config)?);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down, waiting for in-flight batches");
        shutdown.cancel();
    });

    let summary = kafka::run_ingest(sink, config, backoff, cancel).await?;

    info!(
        "Ingestion finished: {} batches, {} records written, {} dropped as malformed, {} failed writes retried",
        summary.batches, summary.records_written, summary.decode_failures, summary.write_failures
    );
    Ok(())
}

async fn print_offsets(config: kafka::Config, json: bool) -> anyhow::Result<()> {
    let consumer =
        KafkaConsumer::new(config.consumer_config()).context("Failed to create Kafka consumer")?;
    consumer.ping().context("Failed to reach Kafka brokers")?;

    let offsets = consumer
        .committed_offsets()
        .await
        .with_context(|| format!("Failed to read committed offsets for group {}", config.group_id))?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = offsets
            .iter()
            .map(|(tp, next)| (tp.to_string(), next.into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if offsets.is_empty() {
        println!(
            "Group {} has no committed offsets for topic {}",
            config.group_id, config.topic
        );
        return Ok(());
    }
    for (tp, next) in offsets.iter() {
        println!("{tp}\t{next}");
    }
    Ok(())
}
