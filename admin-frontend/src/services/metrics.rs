use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static LOGIN_LOCKOUTS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static SESSIONS_EXPIRED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Register all collectors. Called once from `main`; every record helper is
/// a no-op before that, so library tests never trip over global state.
pub fn init_metrics() {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("metric can be created");

    let request_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )
    .expect("metric can be created");

    let login_attempts = IntCounterVec::new(
        Opts::new("login_attempts_total", "Login attempts by outcome"),
        &["outcome"],
    )
    .expect("metric can be created");

    let lockouts = IntCounter::new("login_lockouts_total", "Lockouts armed after repeated failures")
        .expect("metric can be created");

    let sessions_expired = IntCounter::new(
        "sessions_expired_total",
        "Admin sessions invalidated by the idle timeout",
    )
    .expect("metric can be created");

    for collector in [
        Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(request_duration.clone()),
        Box::new(login_attempts.clone()),
        Box::new(lockouts.clone()),
        Box::new(sessions_expired.clone()),
    ] {
        registry
            .register(collector)
            .expect("collector can be registered");
    }

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = LOGIN_ATTEMPTS_TOTAL.set(login_attempts);
    let _ = LOGIN_LOCKOUTS_TOTAL.set(lockouts);
    let _ = SESSIONS_EXPIRED_TOTAL.set(sessions_expired);
}

pub fn observe_http(method: &str, path: &str, status: &str, elapsed: Duration) {
    if let (Some(counter), Some(histogram)) = (
        HTTP_REQUESTS_TOTAL.get(),
        HTTP_REQUEST_DURATION_SECONDS.get(),
    ) {
        counter.with_label_values(&[method, path, status]).inc();
        histogram
            .with_label_values(&[method, path, status])
            .observe(elapsed.as_secs_f64());
    }
}

/// `outcome` is one of `success`, `failure`, `locked_out`.
pub fn record_login_attempt(outcome: &str) {
    if let Some(counter) = LOGIN_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_lockout() {
    if let Some(counter) = LOGIN_LOCKOUTS_TOTAL.get() {
        counter.inc();
    }
}

pub fn record_session_expired() {
    if let Some(counter) = SESSIONS_EXPIRED_TOTAL.get() {
        counter.inc();
    }
}

pub fn gather() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
