use crate::clock::Clock;
use crate::store::KvStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const SESSION_START_KEY: &str = "sessionStart";

/// Outcome of a single authoritative expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Active,
    Expired,
    Absent,
}

/// Sliding idle-window session tracking over the ephemeral store.
///
/// One record per session id: a single `sessionStart` epoch-millisecond
/// value that slides forward on every qualifying activity. Validity is
/// judged against the injected clock only; the identity provider's own
/// token lifetime is deliberately not consulted.
#[derive(Clone)]
pub struct SessionMonitor {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    idle: Duration,
}

impl SessionMonitor {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, idle: Duration) -> Self {
        Self { store, clock, idle }
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle
    }

    fn key(session_id: &str) -> String {
        format!("{SESSION_START_KEY}:{session_id}")
    }

    pub async fn start(&self, session_id: &str) -> Result<()> {
        self.write_start(session_id).await
    }

    /// Slide the idle window forward. Touch races across callers only ever
    /// extend validity, never shorten it.
    pub async fn touch(&self, session_id: &str) -> Result<()> {
        self.write_start(session_id).await
    }

    async fn write_start(&self, session_id: &str) -> Result<()> {
        let millis = self.clock.now().timestamp_millis().to_string();
        self.store.put(&Self::key(session_id), &millis).await
    }

    async fn started_at(&self, session_id: &str) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(&Self::key(session_id)).await? {
            Some(raw) => match raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) {
                Some(start) => Ok(Some(start)),
                None => {
                    tracing::warn!(session_id, raw, "unreadable session start, treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn is_valid(&self, session_id: &str) -> Result<bool> {
        Ok(match self.started_at(session_id).await? {
            Some(start) => self.clock.now() - start <= self.idle,
            None => false,
        })
    }

    /// Single authoritative expiry evaluation. An elapsed idle window clears
    /// the record; the caller is responsible for revoking the provider-side
    /// identity of an `Expired` session.
    pub async fn check_and_expire(&self, session_id: &str) -> Result<SessionVerdict> {
        match self.started_at(session_id).await? {
            None => Ok(SessionVerdict::Absent),
            Some(start) if self.clock.now() - start <= self.idle => Ok(SessionVerdict::Active),
            Some(start) => {
                self.store.remove(&Self::key(session_id)).await?;
                tracing::info!(
                    session_id,
                    idle_minutes = (self.clock.now() - start).num_minutes(),
                    "idle session expired"
                );
                Ok(SessionVerdict::Expired)
            }
        }
    }

    /// Clear the record on explicit sign-out.
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        self.store.remove(&Self::key(session_id)).await
    }

    /// Expire every stale record, returning the session ids that just
    /// expired so the caller can revoke their provider-side identities.
    pub async fn sweep(&self) -> Result<Vec<String>> {
        let prefix = format!("{SESSION_START_KEY}:");
        let mut expired = Vec::new();
        for key in self.store.keys_with_prefix(&prefix).await? {
            let Some(session_id) = key.strip_prefix(&prefix) else {
                continue;
            };
            if self.check_and_expire(session_id).await? == SessionVerdict::Expired {
                expired.push(session_id.to_string());
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    const SID: &str = "tab-1";

    fn monitor() -> (ManualClock, Arc<MemoryStore>, SessionMonitor) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let monitor = SessionMonitor::new(
            store.clone(),
            Arc::new(clock.clone()),
            Duration::minutes(30),
        );
        (clock, store, monitor)
    }

    #[tokio::test]
    async fn fresh_session_is_valid_until_the_idle_window_elapses() {
        let (clock, _, monitor) = monitor();
        monitor.start(SID).await.unwrap();

        assert!(monitor.is_valid(SID).await.unwrap());

        clock.advance(Duration::minutes(30));
        assert!(monitor.is_valid(SID).await.unwrap());

        clock.advance(Duration::minutes(1));
        assert!(!monitor.is_valid(SID).await.unwrap());
    }

    #[tokio::test]
    async fn idle_session_is_cleared_at_thirty_one_minutes() {
        let (clock, store, monitor) = monitor();
        monitor.start(SID).await.unwrap();

        clock.advance(Duration::minutes(31));

        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Expired
        );
        assert_eq!(store.get("sessionStart:tab-1").await.unwrap(), None);
        // A second check sees nothing left to expire.
        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Absent
        );
    }

    #[tokio::test]
    async fn touch_slides_the_window_forward() {
        let (clock, _, monitor) = monitor();
        monitor.start(SID).await.unwrap();

        clock.advance(Duration::minutes(20));
        monitor.touch(SID).await.unwrap();

        // 40 minutes after start, but only 20 since the last activity.
        clock.advance(Duration::minutes(20));
        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Active
        );

        clock.advance(Duration::minutes(11));
        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Expired
        );
    }

    #[tokio::test]
    async fn stop_clears_the_record() {
        let (_clock, _, monitor) = monitor();
        monitor.start(SID).await.unwrap();

        monitor.stop(SID).await.unwrap();

        assert!(!monitor.is_valid(SID).await.unwrap());
        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Absent
        );
    }

    #[tokio::test]
    async fn sweep_expires_only_stale_sessions() {
        let (clock, _, monitor) = monitor();
        monitor.start("stale").await.unwrap();

        clock.advance(Duration::minutes(25));
        monitor.start("fresh").await.unwrap();

        clock.advance(Duration::minutes(10));
        let expired = monitor.sweep().await.unwrap();

        assert_eq!(expired, vec!["stale".to_string()]);
        assert!(monitor.is_valid("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_session_start_reads_as_absent() {
        let (_clock, store, monitor) = monitor();
        store.put("sessionStart:tab-1", "not-a-number").await.unwrap();

        assert!(!monitor.is_valid(SID).await.unwrap());
        assert_eq!(
            monitor.check_and_expire(SID).await.unwrap(),
            SessionVerdict::Absent
        );
    }
}
