mod config;
mod constants;
mod domain;
mod routes;
mod services;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use google_cloud_storage::client::{Storage, StorageControl};
use sqlx::postgres::PgPoolOptions;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use config::Config;
use domain::models::User;
use services::media::MediaStorage;
use services::session;
use store::{MemoryStore, PgStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: MediaStorage,
    pub jwt_secret: Vec<u8>,
    pub max_page_size: u64,
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if !config.in_memory_store {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("failed to connect to database")?;
        let store = PgStore::new(pool);
        store.migrate().await.context("failed to run migrations")?;
        info!("connected to postgres, migrations applied");
        return Ok(Arc::new(store));
    }

    let store = MemoryStore::new();
    let demo = User {
        id: Uuid::new_v4(),
        username: "demo".to_string(),
        email: "demo@localhost".to_string(),
        full_name: "Demo User".to_string(),
        avatar: None,
        cover_image: None,
        password: String::new(),
        refresh_token: None,
        watch_history: Vec::new(),
    };
    let token = session::create_access_token(demo.id, config.jwt_secret.as_bytes())
        .context("failed to mint demo token")?;
    warn!(user_id = %demo.id, "using in-memory store; data is lost on exit");
    // Bearer credential: only emitted with RUST_LOG=debug
    debug!(%token, "demo user access token");
    store.seed_user(demo);
    Ok(Arc::new(store))
}

async fn media_storage(config: &Config) -> anyhow::Result<MediaStorage> {
    if let Some(path) = &config.local_storage_path {
        info!(path = %path.display(), "storing uploads on local disk");
        return Ok(MediaStorage::local(path));
    }
    if let Some(bucket) = &config.gcs_bucket_name {
        // Uses GOOGLE_APPLICATION_CREDENTIALS
        let client = Storage::builder()
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create GCS client: {}", e))?;
        let control = StorageControl::builder()
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create GCS control client: {}", e))?;
        info!(%bucket, "storing uploads in GCS");
        return Ok(MediaStorage::Gcs {
            client,
            control,
            bucket: bucket.clone(),
        });
    }

    let fallback = PathBuf::from("uploads");
    warn!(path = %fallback.display(), "no media backend configured, using local directory");
    Ok(MediaStorage::local(fallback))
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let Some(origin) = &config.cors_origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin.parse().context("invalid CORS_ORIGIN")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let state = Arc::new(AppState {
        store: connect_store(&config).await?,
        media: media_storage(&config).await?,
        jwt_secret: config.jwt_secret.as_bytes().to_vec(),
        max_page_size: config.max_page_size,
    });

    // Per-IP: burst of 50, then 10 per second
    let governor = GovernorConfigBuilder::default()
        .per_millisecond(100)
        .burst_size(50)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .context("invalid rate limit config")?;

    let app = routes::build_routes()
        .with_state(state)
        .layer(GovernorLayer {
            config: Arc::new(governor),
        })
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    Ok(())
}
