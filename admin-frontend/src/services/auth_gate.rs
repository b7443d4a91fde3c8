use crate::services::identity_client::{Identity, IdentityProvider, ProviderError};
use crate::services::metrics;
use session_core::{AttemptDecision, AuthThrottleService, GateError, SessionMonitor};
use std::sync::Arc;
use validator::ValidateEmail;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Front door for password logins: local validation, lockout throttle,
/// provider call, session start.
///
/// Side effects are confined to the attempt and session stores. Validation
/// and lockout rejections never reach the provider and never count as
/// failures; credential and availability failures from the provider count
/// identically.
pub struct CredentialGate {
    provider: Arc<dyn IdentityProvider>,
    throttle: AuthThrottleService,
    monitor: SessionMonitor,
}

impl CredentialGate {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        throttle: AuthThrottleService,
        monitor: SessionMonitor,
    ) -> Self {
        Self {
            provider,
            throttle,
            monitor,
        }
    }

    pub async fn submit(
        &self,
        scope: &str,
        session_id: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, GateError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(GateError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if !email.validate_email() {
            return Err(GateError::Validation(
                "A valid email address is required".to_string(),
            ));
        }

        if let AttemptDecision::Blocked { seconds_remaining } =
            self.throttle.check_allowed(scope).await?
        {
            metrics::record_login_attempt("locked_out");
            tracing::warn!(scope, seconds_remaining, "login attempt rejected by lockout");
            return Err(GateError::Lockout(seconds_remaining));
        }

        match self.provider.authenticate_with_password(email, password).await {
            Ok(identity) => {
                self.throttle.record_success(scope).await?;
                self.monitor.start(session_id).await?;
                metrics::record_login_attempt("success");
                tracing::info!(user_id = %identity.user_id, "login succeeded");
                Ok(identity)
            }
            Err(err) => {
                let record = self.throttle.record_failure(scope).await?;
                if record.lockout_until.is_some() {
                    metrics::record_lockout();
                }
                metrics::record_login_attempt("failure");
                tracing::warn!(
                    scope,
                    attempts = record.attempts,
                    error = %err,
                    "login failed"
                );
                Err(match err {
                    ProviderError::InvalidCredential => GateError::InvalidCredential,
                    ProviderError::Unavailable(detail) => GateError::Unknown(detail),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use session_core::{AttemptStore, LockoutPolicy, ManualClock, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCOPE: &str = "203.0.113.7";
    const SID: &str = "session-1";
    const GOOD_PASSWORD: &str = "correct-horse-battery";

    struct StubProvider {
        calls: AtomicUsize,
        /// `None` simulates an unreachable provider.
        accept_password: Option<&'static str>,
    }

    impl StubProvider {
        fn accepting(password: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                accept_password: Some(password),
            }
        }

        fn unavailable() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                accept_password: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IdentityProvider for StubProvider {
        async fn authenticate_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> Result<Identity, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.accept_password {
                Some(expected) if password == expected => Ok(Identity {
                    user_id: "user-1".to_string(),
                    email: email.to_string(),
                    access_token: "token-1".to_string(),
                }),
                Some(_) => Err(ProviderError::InvalidCredential),
                None => Err(ProviderError::Unavailable("connection refused".to_string())),
            }
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn gate(provider: Arc<StubProvider>) -> (ManualClock, SessionMonitor, CredentialGate) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let throttle = AuthThrottleService::new(
            AttemptStore::new(Arc::new(MemoryStore::new())),
            Arc::new(clock.clone()),
            LockoutPolicy::default(),
        );
        let monitor = SessionMonitor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            Duration::minutes(30),
        );
        let gate = CredentialGate::new(provider, throttle, monitor.clone());
        (clock, monitor, gate)
    }

    #[tokio::test]
    async fn short_password_fails_locally_without_provider_or_throttle() {
        let provider = Arc::new(StubProvider::accepting(GOOD_PASSWORD));
        let (_clock, _monitor, gate) = gate(provider.clone());

        let err = gate.submit(SCOPE, SID, "admin@example.com", "short").await;
        assert!(matches!(err, Err(GateError::Validation(_))));
        assert_eq!(provider.call_count(), 0);

        // A real attempt right after is still allowed: nothing was counted.
        for _ in 0..2 {
            let _ = gate
                .submit(SCOPE, SID, "admin@example.com", "wrong-password")
                .await;
        }
        let third = gate
            .submit(SCOPE, SID, "admin@example.com", "wrong-password")
            .await;
        // The third provider failure arms the lockout, proving the earlier
        // validation failure did not count as the first one.
        assert!(matches!(third, Err(GateError::InvalidCredential)));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn malformed_email_fails_locally() {
        let provider = Arc::new(StubProvider::accepting(GOOD_PASSWORD));
        let (_clock, _monitor, gate) = gate(provider.clone());

        let err = gate.submit(SCOPE, SID, "not-an-email", GOOD_PASSWORD).await;

        assert!(matches!(err, Err(GateError::Validation(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn fourth_attempt_is_blocked_without_a_provider_call() {
        let provider = Arc::new(StubProvider::accepting(GOOD_PASSWORD));
        let (_clock, _monitor, gate) = gate(provider.clone());

        for _ in 0..3 {
            let _ = gate
                .submit(SCOPE, SID, "admin@example.com", "wrong-password")
                .await;
        }
        assert_eq!(provider.call_count(), 3);

        match gate.submit(SCOPE, SID, "admin@example.com", GOOD_PASSWORD).await {
            Err(GateError::Lockout(seconds_remaining)) => {
                assert!(seconds_remaining > 0);
            }
            other => panic!("expected a lockout, got {other:?}"),
        }
        // Even the correct password never reached the provider.
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn attempt_after_lockout_expiry_reaches_the_provider_again() {
        let provider = Arc::new(StubProvider::accepting(GOOD_PASSWORD));
        let (clock, _monitor, gate) = gate(provider.clone());

        for _ in 0..3 {
            let _ = gate
                .submit(SCOPE, SID, "admin@example.com", "wrong-password")
                .await;
        }

        clock.advance(Duration::seconds(31));
        let err = gate
            .submit(SCOPE, SID, "admin@example.com", "wrong-password")
            .await;

        assert!(matches!(err, Err(GateError::InvalidCredential)));
        assert_eq!(provider.call_count(), 4);
        // The counter restarted at 1: two more failures are needed before
        // the next lockout.
        let _ = gate
            .submit(SCOPE, SID, "admin@example.com", "wrong-password")
            .await;
        assert!(matches!(
            gate.submit(SCOPE, SID, "admin@example.com", GOOD_PASSWORD).await,
            Ok(_)
        ));
        assert_eq!(provider.call_count(), 6);
    }

    #[tokio::test]
    async fn success_resets_the_throttle_and_starts_the_session() {
        let provider = Arc::new(StubProvider::accepting(GOOD_PASSWORD));
        let (_clock, monitor, gate) = gate(provider.clone());

        for _ in 0..2 {
            let _ = gate
                .submit(SCOPE, SID, "admin@example.com", "wrong-password")
                .await;
        }
        let identity = gate
            .submit(SCOPE, SID, "admin@example.com", GOOD_PASSWORD)
            .await
            .expect("login should succeed");

        assert_eq!(identity.user_id, "user-1");
        assert!(monitor.is_valid(SID).await.unwrap());

        // The earlier failures are gone: three fresh ones are needed to lock.
        for _ in 0..2 {
            let _ = gate
                .submit(SCOPE, SID, "admin@example.com", "wrong-password")
                .await;
        }
        assert!(matches!(
            gate.submit(SCOPE, SID, "admin@example.com", "wrong-password").await,
            Err(GateError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn provider_outage_counts_like_a_credential_failure() {
        let provider = Arc::new(StubProvider::unavailable());
        let (_clock, _monitor, gate) = gate(provider.clone());

        for _ in 0..3 {
            let err = gate
                .submit(SCOPE, SID, "admin@example.com", GOOD_PASSWORD)
                .await;
            assert!(matches!(err, Err(GateError::Unknown(_))));
        }

        // Outages locked the client out exactly as wrong passwords would.
        assert!(matches!(
            gate.submit(SCOPE, SID, "admin@example.com", GOOD_PASSWORD).await,
            Err(GateError::Lockout(_))
        ));
        assert_eq!(provider.call_count(), 3);
    }
}
