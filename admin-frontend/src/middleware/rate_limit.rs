use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc, time::Duration};

/// Coarse per-process limiter for login submissions, in front of the
/// per-client lockout throttle.
pub type LoginRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub fn create_login_rate_limiter(attempts: u32, window_seconds: u64) -> LoginRateLimiter {
    let attempts = attempts.max(1);
    let period = Duration::from_secs((window_seconds / u64::from(attempts)).max(1));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_minute(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN)))
        .allow_burst(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN));

    Arc::new(RateLimiter::direct(quota))
}

/// Only submissions are limited; rendering the login form stays free.
pub async fn rate_limit_middleware(
    limiter: LoginRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many requests. Please try again later."
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_within_limit() {
        let limiter = create_login_rate_limiter(3, 60);

        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());

        // 4th request inside the window is limited.
        assert!(limiter.check().is_err());
    }

    #[test]
    fn zero_attempts_does_not_panic() {
        let limiter = create_login_rate_limiter(0, 0);
        assert!(limiter.check().is_ok());
    }
}
