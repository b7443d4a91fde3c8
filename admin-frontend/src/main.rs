use admin_frontend::config::get_configuration;
use admin_frontend::observability::init_tracing;
use admin_frontend::services::auth_gate::CredentialGate;
use admin_frontend::services::identity_client::{spawn_readiness_probe, IdentityClient};
use admin_frontend::services::metrics;
use admin_frontend::services::redis_store::RedisStore;
use admin_frontend::services::session_sweeper::spawn_sweeper;
use admin_frontend::startup::build_router;
use admin_frontend::AppState;
use axum_extra::extract::cookie::Key;
use secrecy::ExposeSecret;
use session_core::{
    AttemptStore, AuthThrottleService, Clock, KvStore, LockoutPolicy, MemoryStore, SessionMonitor,
    SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {e}");
        anyhow::anyhow!("configuration error: {e}")
    })?;

    init_tracing(
        "admin-frontend",
        &configuration.observability.log_level,
        configuration.observability.otlp_endpoint.as_deref(),
    );
    metrics::init_metrics();

    let cookie_secret = configuration.server.cookie_secret.expose_secret();
    anyhow::ensure!(
        cookie_secret.len() >= 32,
        "server.cookie_secret must be at least 32 bytes"
    );
    let cookie_key = Key::derive_from(cookie_secret.as_bytes());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Lockout state is durable and shared; session state is ephemeral and
    // process-local by design.
    let durable: Arc<dyn KvStore> = match &configuration.redis.url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            tracing::warn!("no redis url configured, lockout state is process-local");
            Arc::new(MemoryStore::new())
        }
    };
    let sessions: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

    let throttle = AuthThrottleService::new(
        AttemptStore::new(durable),
        clock.clone(),
        LockoutPolicy {
            threshold: configuration.security.lockout.max_attempts,
            base_seconds: configuration.security.lockout.base_seconds,
            cap_seconds: configuration.security.lockout.cap_seconds,
        },
    );
    let monitor = SessionMonitor::new(
        sessions.clone(),
        clock.clone(),
        chrono::Duration::minutes(configuration.security.session.idle_minutes),
    );

    let provider = Arc::new(IdentityClient::new(configuration.identity_service.clone())?);
    let gate = Arc::new(CredentialGate::new(
        provider.clone(),
        throttle,
        monitor.clone(),
    ));

    let shutdown = CancellationToken::new();
    let (ready_tx, ready_rx) = watch::channel(false);
    let probe = spawn_readiness_probe(provider.clone(), ready_tx, shutdown.clone());

    let state = AppState::new(gate, monitor, provider, sessions, ready_rx, cookie_key);
    let sweeper = spawn_sweeper(
        state.clone(),
        Duration::from_secs(configuration.security.session.sweep_seconds),
        shutdown.clone(),
    );

    let app = build_router(state, &configuration);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("failed to bind to address {address}: {e}")
    })?;

    info!("Starting admin-frontend on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            anyhow::anyhow!("server error: {e}")
        })?;

    // Release the sweep timer and readiness probe with the listener.
    shutdown.cancel();
    let _ = tokio::join!(probe, sweeper);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
