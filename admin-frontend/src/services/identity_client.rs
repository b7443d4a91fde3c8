use crate::config::IdentityServiceSettings;
use crate::observability::inject_trace_context;
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity as issued by the remote identity service. Opaque to the session
/// core: the gate caches it per session and hands the token back on
/// sign-out, nothing in this repository inspects it further.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredential,

    /// Transport failure or any unclassified provider response.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Boundary to the remote identity service. The trait exists so the gate,
/// the guard and the sweeper can be exercised against a mock in tests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Liveness probe backing the route guard's loading state.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    user_id: String,
    #[serde(default)]
    email: Option<String>,
}

/// HTTP client for the identity service.
pub struct IdentityClient {
    client: Client,
    settings: IdentityServiceSettings,
}

impl IdentityClient {
    pub fn new(settings: IdentityServiceSettings) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }

    fn traced_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        headers
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let url = format!("{}/auth/login", self.settings.url);
        let response = self
            .client
            .post(&url)
            .headers(Self::traced_headers())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "identity service unreachable");
                ProviderError::Unavailable(e.to_string())
            })?;

        match response.status() {
            status if status.is_success() => {
                let body: LoginResponse = response.json().await.map_err(|e| {
                    ProviderError::Unavailable(format!("malformed login response: {e}"))
                })?;
                Ok(Identity {
                    user_id: body.user_id,
                    email: body.email.unwrap_or_else(|| email.to_string()),
                    access_token: body.access_token,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(ProviderError::InvalidCredential)
            }
            status => Err(ProviderError::Unavailable(format!(
                "unexpected status {status}"
            ))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let url = format!("{}/auth/logout", self.settings.url);
        let response = self
            .client
            .post(&url)
            .headers(Self::traced_headers())
            .json(&serde_json::json!({ "token": access_token }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!(
                "sign-out rejected with status {}",
                response.status()
            )))
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!("{}{}", self.settings.url, self.settings.health_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

/// Resolve the route guard's loading state: poll the identity service until
/// it answers once, then flip the readiness flag and exit. Cancellation
/// releases the timer on shutdown.
pub fn spawn_readiness_probe(
    provider: Arc<dyn IdentityProvider>,
    ready: watch::Sender<bool>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match provider.health_check().await {
                Ok(()) => {
                    let _ = ready.send(true);
                    tracing::info!("identity service reachable, provider state resolved");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "identity service not ready yet");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(2)) => {}
            }
        }
    })
}
