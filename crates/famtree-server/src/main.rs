mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use chrono::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use famtree_bot::webhook::{self, AppStateInner, SignatureCheck};
use famtree_bot::{Engine, LockManager};
use famtree_db::Database;

use crate::config::{Config, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "famtree=debug,famtree_bot=debug,famtree_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let locks = LockManager::new(Duration::seconds(config.lock_ttl_secs));
    let engine = Engine::new(db, locks, config.generation_limit);

    let signature = match config.twilio_auth_token.clone() {
        Some(auth_token) => Some(SignatureCheck {
            auth_token,
            public_url: config.public_url.clone(),
            enforce: config.environment == Environment::Production,
        }),
        None => {
            if config.environment == Environment::Production {
                warn!("TWILIO_AUTH_TOKEN is not set; webhook requests are not authenticated");
            }
            None
        }
    };

    let state = Arc::new(AppStateInner { engine, signature });

    let app = Router::new()
        .merge(webhook::routes(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Family tree bot listening on {} ({:?}, lock ttl {}s, generation limit {})",
        addr, config.environment, config.lock_ttl_secs, config.generation_limit
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
