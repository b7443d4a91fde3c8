use crate::store::KvStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const LOGIN_ATTEMPTS_KEY: &str = "loginAttempts";
pub const LOCKOUT_UNTIL_KEY: &str = "lockoutUntil";

/// Failure counter and lockout deadline for one client scope.
///
/// Once `now >= lockout_until` the record is logically expired even before a
/// reset is persisted; readers must treat it as open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

/// Durable persistence for [`LoginAttemptRecord`]s, one per client scope.
///
/// Values keep the wire shape of the original browser storage: the counter
/// is a decimal string, the deadline an RFC 3339 timestamp. Stored values
/// are client-influenced state and never trusted; anything unreadable loads
/// as an absent record.
#[derive(Clone)]
pub struct AttemptStore {
    store: Arc<dyn KvStore>,
}

impl AttemptStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn attempts_key(scope: &str) -> String {
        format!("{LOGIN_ATTEMPTS_KEY}:{scope}")
    }

    fn lockout_key(scope: &str) -> String {
        format!("{LOCKOUT_UNTIL_KEY}:{scope}")
    }

    pub async fn load(&self, scope: &str) -> Result<LoginAttemptRecord> {
        let attempts = match self.store.get(&Self::attempts_key(scope)).await? {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(scope, raw, "unreadable attempt counter, treating as zero");
                0
            }),
            None => 0,
        };

        let lockout_until = match self.store.get(&Self::lockout_key(scope)).await? {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(_) => {
                    tracing::warn!(scope, raw, "unreadable lockout deadline, treating as absent");
                    None
                }
            },
            None => None,
        };

        Ok(LoginAttemptRecord {
            attempts,
            lockout_until,
        })
    }

    pub async fn save(&self, scope: &str, record: &LoginAttemptRecord) -> Result<()> {
        self.store
            .put(&Self::attempts_key(scope), &record.attempts.to_string())
            .await?;
        match record.lockout_until {
            Some(until) => {
                self.store
                    .put(&Self::lockout_key(scope), &until.to_rfc3339())
                    .await
            }
            None => self.store.remove(&Self::lockout_key(scope)).await,
        }
    }

    pub async fn reset(&self, scope: &str) -> Result<()> {
        self.store.remove(&Self::attempts_key(scope)).await?;
        self.store.remove(&Self::lockout_key(scope)).await
    }
}
