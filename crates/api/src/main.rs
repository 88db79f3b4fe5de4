use std::net::SocketAddr;
use std::sync::Arc;

use batchgen_cloud::storage::{ObjectStore, S3ObjectStore};
use batchgen_cloud::thumbnail::{
    HttpThumbnailService, NoopThumbnailService, ThumbnailService, ThumbnailTrigger,
};
use batchgen_db::sink::PgRecordSink;
use batchgen_generation::api::HttpGenerationBackend;
use batchgen_generation::backend::GenerationBackend;
use batchgen_pipeline::{BatchServices, PersistenceSidecar};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use batchgen_api::config::{IntegrationsConfig, ServerConfig};
use batchgen_api::router::build_app_router;
use batchgen_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "batchgen_api=debug,batchgen_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let integrations = IntegrationsConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = batchgen_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    batchgen_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    batchgen_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Generation backend ---
    let backend: Option<Arc<dyn GenerationBackend>> = match &integrations.generation {
        Some(generation) => {
            let backend = HttpGenerationBackend::new(
                generation.api_url.clone(),
                generation.api_key.clone(),
                generation.timeout,
            )
            .expect("Failed to build generation HTTP client");
            tracing::info!(api_url = %generation.api_url, "Generation backend configured");
            Some(Arc::new(backend))
        }
        None => {
            tracing::warn!("GENERATION_API_KEY not set, every batch job will fail");
            None
        }
    };

    // --- Object storage ---
    let store: Option<Arc<dyn ObjectStore>> = match &integrations.storage {
        Some(storage) => {
            let store = S3ObjectStore::from_env(
                storage.bucket.clone(),
                storage.public_base_url.clone(),
            )
            .await;
            tracing::info!(bucket = %storage.bucket, "Object storage configured");
            Some(Arc::new(store))
        }
        None => {
            tracing::warn!("S3_BUCKET not set, collection images keep backend URLs");
            None
        }
    };

    // --- Thumbnails ---
    let thumbnails: Arc<dyn ThumbnailService> = match &integrations.thumbnail_url {
        Some(url) => Arc::new(HttpThumbnailService::new(reqwest::Client::new(), url.clone())),
        None => Arc::new(NoopThumbnailService),
    };

    // --- App state ---
    let services = BatchServices {
        backend,
        sidecar: PersistenceSidecar::new(
            store,
            Arc::new(PgRecordSink::new(pool)),
            ThumbnailTrigger::new(thumbnails),
        ),
    };
    let state = AppState {
        config: Arc::new(config.clone()),
        services,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
