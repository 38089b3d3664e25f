mod config;

use std::sync::Arc;

use anyhow::Context;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sprout_db::{Database, SeriesStore};
use sprout_hub::{Hub, MessageRouter, MqttConnection};
use sprout_services::{EmailSender, LogMailer, SendGridMailer, Services, Templates};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprout=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let series = Arc::new(SeriesStore::open(&config.series_db_path)?);

    let mailer: Arc<dyn EmailSender> = match &config.sendgrid_api_key {
        Some(key) => Arc::new(SendGridMailer::new(key.clone(), config.mail_from.clone())),
        None => {
            warn!("SPROUT_SENDGRID_API_KEY not set, outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let services = Services::new(
        db,
        series,
        mailer,
        Arc::new(Templates::new()?),
        config.auth_config(),
    );

    let cancel = CancellationToken::new();

    // Device-facing side: the message hub
    let hub = Hub::new(
        Arc::new(MessageRouter::for_services(&services)),
        config.reconnect_attempts,
    );
    let conn = MqttConnection::new(&config.mqtt)?;
    let hub_cancel = cancel.clone();
    let hub_task = tokio::spawn(async move { hub.run(conn, hub_cancel).await });
    info!("Message hub connecting to {}", config.mqtt.uri);

    // Human-facing side: HTTP
    let app = sprout_api::router(services)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Sprout server listening on {}", addr);

    let server_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    // The hub only returns on shutdown or when the bus is gone for good
    let hub_result = hub_task.await?;
    cancel.cancel();
    server_task.await??;

    hub_result.context("message hub stopped")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
