use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dupradar_core::config::Secrets;
use dupradar_core::db::TableName;
use dupradar_core::{DupRadarConfig, EmbeddingBackend, SignatureVerifier, VertexConfig, VertexEmbeddingClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use dupradar_server::dispatch;
use dupradar_server::http::{self, HttpState};
use dupradar_server::pipeline::{Pipeline, PipelineSettings};
use dupradar_server::subsystems::comment::GitHubCommentPoster;
use dupradar_server::subsystems::fingerprint::PgFingerprintWriter;
use dupradar_server::subsystems::search::{PgVectorSearcher, SearchSettings};
use dupradar_server::subsystems::RetryPolicy;
use dupradar_server::telemetry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "dupradar.toml")]
    config: String,

    /// Check PostgreSQL and pgvector, then exit
    #[arg(long)]
    health: bool,

    /// Create the pgvector extension, fingerprint table and index, then exit
    #[arg(long)]
    provision: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match DupRadarConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match dupradar_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let table = TableName::from_config(&config.database)?;

    if args.health {
        match dupradar_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match dupradar_core::db::check_pgvector(&pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ DupRadar DB health check passed");
        return Ok(());
    }

    if args.provision {
        dupradar_core::db::provision_schema(
            &pool,
            &table,
            config.vector_search.dimensions,
            config.vector_search.distance_type,
        )
        .await?;
        println!(
            "✅ Provisioned {} ({} dims, {})",
            table.qualified(),
            config.vector_search.dimensions,
            config.vector_search.distance_type
        );
        return Ok(());
    }

    // Secrets come from the environment only
    let secrets = match Secrets::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };
    let verifier = SignatureVerifier::new(secrets.webhook_secret.as_str())?;
    if secrets.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN is not set; triage comments will not be posted");
    }

    let call_timeout = Duration::from_secs(config.pipeline.call_timeout_secs);

    // Embedding backend
    let vertex_config = VertexConfig::from_config(
        &config.embedding,
        secrets.vertex_api_key.clone(),
        call_timeout,
    );
    let embedder = match &config.embedding.base_url {
        Some(base_url) => VertexEmbeddingClient::with_base_url(vertex_config, base_url.clone())?,
        None => VertexEmbeddingClient::new(vertex_config)?,
    };
    tracing::info!(
        backend = embedder.name(),
        model = %config.embedding.model,
        dimensions = embedder.dimensions(),
        task_type = ?config.embedding.task_type,
        "Embedding backend ready"
    );

    let retry = RetryPolicy::from_config(&config.database);
    let searcher = PgVectorSearcher::new(
        pool.clone(),
        SearchSettings::new(&config.vector_search, table.clone(), retry),
    );
    let store = PgFingerprintWriter::new(pool.clone(), &table, retry);
    let poster = GitHubCommentPoster::new(&config.github, secrets.github_token.clone(), call_timeout)?;

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(embedder),
        Arc::new(searcher),
        Arc::new(poster),
        Arc::new(store),
        PipelineSettings::from_config(&config),
    ));

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder unavailable; /metrics disabled");
            None
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    let (dispatcher, queue) = dispatch::job_queue(config.pipeline.queue_capacity);
    let dispatcher_task = tokio::spawn(dispatch::run_dispatcher(
        queue,
        pipeline,
        config.pipeline.max_in_flight,
        shutdown.clone(),
    ));

    let state = Arc::new(HttpState {
        pool,
        verifier,
        dispatcher,
        metrics,
    });

    let served = http::start_http_server(state, &config.server, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "Dispatcher task failed");
    }

    served
}
