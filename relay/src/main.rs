//! wa-relay server - WhatsApp Cloud API webhook receiver.
//!
//! This binary:
//! - Answers Meta's subscription verification challenge
//! - Acknowledges every webhook event with 200 right away
//! - Persists, caches and forwards each event in the background
//!
//! Only a missing or invalid document store configuration stops startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wa_relay::backoff::Backoff;
use wa_relay::{forward, sink, web, AppState, CacheBackend, Config, MongoDocumentSink, Relay};

/// How long in-flight fan-outs may run after the server stops accepting.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "config_invalid");
            return Err(e).context("Invalid configuration");
        }
    };

    let cache_backend = match &config.cache {
        Some(CacheBackend::Redis { .. }) => "redis",
        Some(CacheBackend::Upstash { .. }) => "upstash",
        None => "none",
    };

    info!(
        port = config.port,
        mongo_database = %config.mongo_database,
        mongo_collection = %config.mongo_collection,
        cache_backend = cache_backend,
        forward_configured = config.forward_url.is_some(),
        forward_timeout_ms = config.forward_timeout_ms,
        sink_timeout_ms = config.sink_timeout_ms,
        "config_loaded"
    );

    // One HTTP client for forwarding and REST cache calls
    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(16)
        .build()
        .context("Failed to create HTTP client")?;

    let documents = MongoDocumentSink::new(
        &config.mongo_uri,
        &config.mongo_database,
        &config.mongo_collection,
        config.sink_timeout(),
    )
    .context("Invalid MONGO_URI")?;
    documents.spawn_connect(Backoff::default());

    let cache = sink::cache_from_config(&config, http.clone())
        .context("Invalid cache configuration")?;
    if cache.is_none() {
        warn!("cache_disabled");
    }

    let forwarder = forward::from_config(&config, http);
    if forwarder.is_none() {
        warn!("forward_disabled");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let relay = Relay::new(Arc::new(documents), cache, forwarder)
        .with_step_timeout(config.sink_timeout().max(config.forward_timeout()));
    let state = AppState::new(config, relay);
    let relay = Arc::clone(&state.relay);
    let app = web::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if relay.drain(DRAIN_TIMEOUT).await {
        info!("relay_drained");
    } else {
        warn!(timeout_ms = DRAIN_TIMEOUT.as_millis() as u64, "relay_drain_timed_out");
    }

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
