//! Provider identity cached per session id in the ephemeral store.
//!
//! This is the service-side analog of the identity SDK's own persisted auth
//! state. The session core never reads it; only the guard, the sweeper and
//! the auth handlers do.

use crate::services::identity_client::Identity;
use anyhow::Result;
use session_core::KvStore;

pub const IDENTITY_KEY: &str = "identity";

fn key(session_id: &str) -> String {
    format!("{IDENTITY_KEY}:{session_id}")
}

pub async fn save_identity(
    store: &dyn KvStore,
    session_id: &str,
    identity: &Identity,
) -> Result<()> {
    store
        .put(&key(session_id), &serde_json::to_string(identity)?)
        .await
}

pub async fn load_identity(store: &dyn KvStore, session_id: &str) -> Result<Option<Identity>> {
    match store.get(&key(session_id)).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "unreadable cached identity, dropping it");
                store.remove(&key(session_id)).await?;
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub async fn remove_identity(store: &dyn KvStore, session_id: &str) -> Result<()> {
    store.remove(&key(session_id)).await
}
