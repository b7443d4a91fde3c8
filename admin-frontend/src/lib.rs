pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod startup;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use services::auth_gate::CredentialGate;
use services::identity_client::IdentityProvider;
use session_core::{KvStore, SessionMonitor};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<CredentialGate>,
    pub monitor: SessionMonitor,
    pub identity: Arc<dyn IdentityProvider>,
    /// Ephemeral per-session store holding `sessionStart` and the cached
    /// provider identity. Process-local by design.
    pub sessions: Arc<dyn KvStore>,
    /// False until the identity service has answered once; the route guard
    /// reports "loading" while this is unresolved.
    pub provider_ready: watch::Receiver<bool>,
    cookie_key: Key,
}

impl AppState {
    pub fn new(
        gate: Arc<CredentialGate>,
        monitor: SessionMonitor,
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn KvStore>,
        provider_ready: watch::Receiver<bool>,
        cookie_key: Key,
    ) -> Self {
        Self {
            gate,
            monitor,
            identity,
            sessions,
            provider_ready,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}
