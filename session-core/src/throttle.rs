use crate::attempts::{AttemptStore, LoginAttemptRecord};
use crate::clock::Clock;
use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;

/// Lockout policy: failures tolerated before the first lockout, the base
/// lockout length, and the cap the geometric backoff saturates at.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub base_seconds: u64,
    pub cap_seconds: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            base_seconds: 30,
            cap_seconds: 1800,
        }
    }
}

impl LockoutPolicy {
    /// Lockout length after `attempts` consecutive failures: base at the
    /// threshold, doubling per further failure, saturating at the cap.
    /// With defaults: 3 -> 30s, 4 -> 60s, 5 -> 120s, ..., capped at 1800s.
    pub fn lockout_duration(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(self.threshold);
        let seconds = 2u64
            .checked_pow(exp)
            .and_then(|factor| self.base_seconds.checked_mul(factor))
            .map_or(self.cap_seconds, |s| s.min(self.cap_seconds));
        Duration::seconds(seconds as i64)
    }
}

/// Verdict of a pre-flight lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    Allowed,
    Blocked { seconds_remaining: u64 },
}

/// State machine over the durable attempt store deciding whether a login
/// attempt may proceed and for how long a locked client stays blocked.
///
/// The two states are implicit in the stored record: open while
/// `attempts < threshold`, locked while `attempts >= threshold` and the
/// deadline lies ahead. A lapsed deadline counts as open without any timer;
/// expiry is evaluated lazily against the injected clock.
#[derive(Clone)]
pub struct AuthThrottleService {
    attempts: AttemptStore,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
}

impl AuthThrottleService {
    pub fn new(attempts: AttemptStore, clock: Arc<dyn Clock>, policy: LockoutPolicy) -> Self {
        Self {
            attempts,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Read-only gate check, one authoritative evaluation per decision point.
    /// A lapsed lockout counts as open without being rewritten here;
    /// `record_failure` folds the reset in on the next failure.
    pub async fn check_allowed(&self, scope: &str) -> Result<AttemptDecision> {
        let record = self.attempts.load(scope).await?;
        let now = self.clock.now();

        if record.attempts >= self.policy.threshold {
            if let Some(until) = record.lockout_until {
                if now < until {
                    let millis = (until - now).num_milliseconds().max(0) as u64;
                    // Rounded up so the user never sees "0 seconds" while
                    // still blocked.
                    let seconds_remaining = millis.div_ceil(1000);
                    return Ok(AttemptDecision::Blocked { seconds_remaining });
                }
            }
        }

        Ok(AttemptDecision::Allowed)
    }

    /// Count one provider-side failure, arming or extending the lockout once
    /// the threshold is crossed. Returns the persisted record.
    pub async fn record_failure(&self, scope: &str) -> Result<LoginAttemptRecord> {
        let now = self.clock.now();
        let mut record = self.attempts.load(scope).await?;

        // A lapsed lockout means the previous streak ended; this failure
        // starts a fresh count rather than resuming the old one.
        if record.lockout_until.is_some_and(|until| now >= until) {
            record = LoginAttemptRecord::default();
        }

        record.attempts += 1;
        if record.attempts >= self.policy.threshold {
            let duration = self.policy.lockout_duration(record.attempts);
            record.lockout_until = Some(now + duration);
            tracing::warn!(
                scope,
                attempts = record.attempts,
                lockout_seconds = duration.num_seconds(),
                "login lockout armed"
            );
        }

        self.attempts.save(scope, &record).await?;
        Ok(record)
    }

    /// Unconditional reset on a successful login.
    pub async fn record_success(&self, scope: &str) -> Result<()> {
        self.attempts.reset(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    const SCOPE: &str = "203.0.113.7";

    fn throttle() -> (ManualClock, AuthThrottleService) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let attempts = AttemptStore::new(Arc::new(MemoryStore::new()));
        let service =
            AuthThrottleService::new(attempts, Arc::new(clock.clone()), LockoutPolicy::default());
        (clock, service)
    }

    #[test]
    fn backoff_doubles_from_base_and_caps() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.lockout_duration(3), Duration::seconds(30));
        assert_eq!(policy.lockout_duration(4), Duration::seconds(60));
        assert_eq!(policy.lockout_duration(5), Duration::seconds(120));
        assert_eq!(policy.lockout_duration(6), Duration::seconds(240));
        assert_eq!(policy.lockout_duration(10), Duration::seconds(1800));
        // Far past the cap the arithmetic must not overflow.
        assert_eq!(policy.lockout_duration(200), Duration::seconds(1800));
    }

    #[tokio::test]
    async fn attempts_below_threshold_stay_allowed() {
        let (_clock, throttle) = throttle();

        for expected in 1..3u32 {
            let record = throttle.record_failure(SCOPE).await.unwrap();
            assert_eq!(record.attempts, expected);
            assert_eq!(record.lockout_until, None);
            assert_eq!(
                throttle.check_allowed(SCOPE).await.unwrap(),
                AttemptDecision::Allowed
            );
        }
    }

    #[tokio::test]
    async fn third_failure_arms_a_thirty_second_lockout() {
        let (clock, throttle) = throttle();

        for _ in 0..3 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        match throttle.check_allowed(SCOPE).await.unwrap() {
            AttemptDecision::Blocked { seconds_remaining } => {
                assert_eq!(seconds_remaining, 30);
            }
            AttemptDecision::Allowed => panic!("expected a lockout after three failures"),
        }

        // Part-way through the window the remaining time rounds up.
        clock.advance(Duration::milliseconds(10_500));
        assert_eq!(
            throttle.check_allowed(SCOPE).await.unwrap(),
            AttemptDecision::Blocked {
                seconds_remaining: 20
            }
        );
    }

    #[tokio::test]
    async fn lockout_expires_lazily_without_a_write() {
        let (clock, throttle) = throttle();
        for _ in 0..3 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        clock.advance(Duration::seconds(30));
        assert_eq!(
            throttle.check_allowed(SCOPE).await.unwrap(),
            AttemptDecision::Allowed
        );
        // The stored record still carries the lapsed deadline; only the
        // interpretation changed.
        let stored = throttle.attempts.load(SCOPE).await.unwrap();
        assert_eq!(stored.attempts, 3);
        assert!(stored.lockout_until.is_some());
    }

    #[tokio::test]
    async fn failure_after_expiry_restarts_the_count_at_one() {
        let (clock, throttle) = throttle();
        for _ in 0..3 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        clock.advance(Duration::seconds(31));
        let record = throttle.record_failure(SCOPE).await.unwrap();

        assert_eq!(record.attempts, 1);
        assert_eq!(record.lockout_until, None);
    }

    #[tokio::test]
    async fn repeated_failures_inside_the_window_extend_the_deadline() {
        let (clock, throttle) = throttle();
        for _ in 0..4 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        // Fourth failure doubles the window to 60s from "now".
        match throttle.check_allowed(SCOPE).await.unwrap() {
            AttemptDecision::Blocked { seconds_remaining } => {
                assert_eq!(seconds_remaining, 60);
            }
            AttemptDecision::Allowed => panic!("expected a lockout after four failures"),
        }

        clock.advance(Duration::seconds(59));
        assert!(matches!(
            throttle.check_allowed(SCOPE).await.unwrap(),
            AttemptDecision::Blocked { .. }
        ));
    }

    #[tokio::test]
    async fn success_resets_everything() {
        let (_clock, throttle) = throttle();
        for _ in 0..3 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        throttle.record_success(SCOPE).await.unwrap();

        assert_eq!(
            throttle.check_allowed(SCOPE).await.unwrap(),
            AttemptDecision::Allowed
        );
        assert_eq!(
            throttle.attempts.load(SCOPE).await.unwrap(),
            LoginAttemptRecord::default()
        );
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let (_clock, throttle) = throttle();
        for _ in 0..3 {
            throttle.record_failure(SCOPE).await.unwrap();
        }

        assert_eq!(
            throttle.check_allowed("198.51.100.9").await.unwrap(),
            AttemptDecision::Allowed
        );
    }
}
