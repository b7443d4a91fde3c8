use crate::models::session::{load_identity, remove_identity};
use crate::services::metrics;
use crate::AppState;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Revoke the provider identity and drop cached state for a session whose
/// idle window elapsed. The `sessionStart` record itself is already cleared
/// by `SessionMonitor::check_and_expire`.
pub async fn expire_session(state: &AppState, session_id: &str) {
    match load_identity(state.sessions.as_ref(), session_id).await {
        Ok(Some(identity)) => {
            if let Err(e) = state.identity.sign_out(&identity.access_token).await {
                tracing::warn!(error = %e, "provider sign-out failed for expired session");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to load identity for expired session"),
    }

    if let Err(e) = remove_identity(state.sessions.as_ref(), session_id).await {
        tracing::warn!(error = %e, "failed to clear identity for expired session");
    }
    metrics::record_session_expired();
}

/// Recurring idle-session sweep, the backstop for sessions whose browser
/// never issues another request. Runs until the token is cancelled so the
/// timer is released together with everything else on shutdown.
pub fn spawn_sweeper(
    state: AppState,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("session sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match state.monitor.sweep().await {
                Ok(expired) => {
                    for session_id in expired {
                        expire_session(&state, &session_id).await;
                    }
                }
                Err(e) => tracing::error!(error = %e, "session sweep failed"),
            }
        }
    })
}
