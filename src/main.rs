//! Plansync - plan record service
//!
//! Serves `/v1/plans` and, unless disabled, runs the index worker in-process.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use plansync::{
    concurrency::PlanController,
    config::Args,
    db::{redact_uri, MongoClient},
    logging,
    nats::{memory_queue, ChangePublisher, ChangeSource, JetStreamPublisher, JetStreamSource, NatsClient},
    projection::{MemorySearchIndex, MongoSearchIndex, SearchIndex},
    server::{self, AppState},
    store::{MemoryPlanStore, MongoPlanStore, PlanStore},
    worker::{spawn_index_worker, ChangeProcessor, RetryPolicy, WorkerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init_tracing(&args.log_level, args.json_logs());

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Plansync - plan record service");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", redact_uri(&args.mongodb_uri), args.mongodb_db);
    info!("NATS: {} (queue {})", args.nats.nats_url, args.nats.queue_name);
    info!("Canonical collection: {}", args.canonical_collection);
    info!("Search index: {}", args.search_index);
    info!("Indexer: {}", if args.indexer_enabled { "in-process" } else { "external" });
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => Some(client),
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
            None
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Connect to NATS (optional in dev mode)
    let nats = match NatsClient::new(&args.nats, "plansync").await {
        Ok(client) => Some(client),
        Err(e) if args.dev_mode => {
            warn!("NATS connection failed (dev mode, using in-memory queue): {}", e);
            None
        }
        Err(e) => {
            error!("NATS connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let (store, search): (Arc<dyn PlanStore>, Arc<dyn SearchIndex>) = match &mongo {
        Some(mongo) => (
            Arc::new(MongoPlanStore::new(mongo, &args.canonical_collection).await?),
            Arc::new(MongoSearchIndex::new(mongo.clone())),
        ),
        None => (Arc::new(MemoryPlanStore::new()), Arc::new(MemorySearchIndex::new())),
    };
    search.ensure_index(&args.search_index).await?;

    let (publisher, source): (Arc<dyn ChangePublisher>, Option<Box<dyn ChangeSource>>) =
        match &nats {
            Some(nats) => {
                let publisher = JetStreamPublisher::new(nats, args.request_timeout()).await?;
                let source: Option<Box<dyn ChangeSource>> = if args.indexer_enabled {
                    Some(Box::new(JetStreamSource::new(nats).await?))
                } else {
                    None
                };
                (Arc::new(publisher), source)
            }
            None => {
                if !args.indexer_enabled {
                    warn!("In-memory queue has no external consumer, running index worker anyway");
                }
                let (publisher, source) = memory_queue();
                (Arc::new(publisher), Some(Box::new(source)))
            }
        };

    let worker = source.map(|source| {
        let processor = Arc::new(ChangeProcessor::new(Arc::clone(&search)));
        let config = WorkerConfig {
            retry: RetryPolicy::new(args.indexer_max_attempts, args.indexer_backoff_ms),
            ..WorkerConfig::default()
        };
        spawn_index_worker(source, processor, config)
    });

    let controller = PlanController::new(store, publisher, args.search_index.clone());
    let state = Arc::new(AppState::new(args, controller, search.backend())?);

    if let Err(e) = server::run(state, shutdown_signal()).await {
        error!("Server error: {}", e);
    }

    if let Some(worker) = worker {
        info!("Waiting for index worker to drain");
        worker.shutdown().await?;
    }

    info!("Plansync stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
