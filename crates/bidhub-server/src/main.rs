mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bidhub_api::clock::SystemClock;
use bidhub_api::email::{EmailSender, LogEmailSender, ResendEmailSender};
use bidhub_api::images::DiskImageStore;
use bidhub_api::{AppState, AppStateInner, routes};

use crate::config::{Config, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bidhub=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting Bidhub in {:?} mode", config.mode);

    // Init database
    let db = bidhub_db::Database::open(&config.db_path)?;

    let email: Arc<dyn EmailSender> = match &config.resend_api_key {
        Some(key) => Arc::new(ResendEmailSender::new(key.clone(), config.email_from.clone())),
        None => {
            if config.mode != Mode::Test {
                warn!("RESEND_API_KEY not set, emails will only be logged");
            }
            Arc::new(LogEmailSender)
        }
    };

    let images = DiskImageStore::new(
        config.upload_dir.clone(),
        &format!("{}/uploads", config.public_url),
    )
    .await?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        public_url: config.public_url.clone(),
        clock: Arc::new(SystemClock),
        email,
        images: Arc::new(images),
    });

    tokio::spawn(cleanup::run_token_cleanup_loop(
        state.clone(),
        config.token_prune_secs,
    ));

    let app = Router::new()
        .merge(routes::router(state))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Bidhub server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
