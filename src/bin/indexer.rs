//! Plansync Indexer - standalone change-event consumer
//!
//! Run this binary when the index worker should scale separately from the
//! HTTP service (start the server with `INDEXER_ENABLED=false`).
//!
//! Usage:
//!   plansync-indexer --mongodb-uri mongodb://localhost:27017 --nats-url nats://localhost:4222

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use plansync::{
    config::NatsArgs,
    db::MongoClient,
    logging,
    nats::{JetStreamSource, NatsClient},
    projection::{MongoSearchIndex, SearchIndex},
    worker::{spawn_index_worker, ChangeProcessor, RetryPolicy, WorkerConfig},
};

#[derive(Parser, Debug)]
#[command(name = "plansync-indexer")]
#[command(about = "Consumes plan change events into the search projection")]
#[command(version)]
struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "plansync")]
    mongodb_db: String,

    /// Search index the change events target
    #[arg(long, env = "SEARCH_INDEX", default_value = "plans")]
    search_index: String,

    #[command(flatten)]
    nats: NatsArgs,

    /// Unique worker ID (auto-generated if not provided)
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Attempts per change event before it is given up on
    #[arg(long, env = "INDEXER_MAX_ATTEMPTS", default_value = "5")]
    indexer_max_attempts: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    #[arg(long, env = "INDEXER_BACKOFF_MS", default_value = "200")]
    indexer_backoff_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init_tracing(&args.log_level, args.log_format.eq_ignore_ascii_case("json"));

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let nats = match NatsClient::new(&args.nats, "plansync-indexer").await {
        Ok(client) => client,
        Err(e) => {
            error!("NATS connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let search: Arc<dyn SearchIndex> = Arc::new(MongoSearchIndex::new(mongo));
    search.ensure_index(&args.search_index).await?;
    let source = JetStreamSource::new(&nats).await?;

    let mut config = WorkerConfig {
        retry: RetryPolicy::new(args.indexer_max_attempts, args.indexer_backoff_ms),
        ..WorkerConfig::default()
    };
    if let Some(id) = args.worker_id {
        config.worker_id = id;
    }

    info!(
        "Starting plansync indexer {} (NATS: {}, queue: {})",
        config.worker_id, args.nats.nats_url, args.nats.queue_name
    );

    let processor = Arc::new(ChangeProcessor::new(search));
    let worker = spawn_index_worker(Box::new(source), processor, config);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal, draining");

    worker.shutdown().await?;
    info!("Indexer stopped");
    Ok(())
}
