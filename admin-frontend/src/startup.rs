use crate::config::Settings;
use crate::handlers::{
    admin::{activity, admin_dashboard},
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler},
};
use crate::middleware::guard::{route_guard, LOGIN_PATH};
use crate::middleware::metrics::metrics_middleware;
use crate::middleware::rate_limit::{create_login_rate_limiter, rate_limit_middleware};
use crate::middleware::tracing::request_id_middleware;
use crate::AppState;
use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state, Next},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, settings: &Settings) -> Router {
    let login_limiter = create_login_rate_limiter(
        settings.security.rate_limit.attempts,
        settings.security.rate_limit.window_seconds,
    );
    let login_limit_layer = from_fn(move |req: Request, next: Next| {
        let limiter = login_limiter.clone();
        async move { rate_limit_middleware(limiter, req, next).await }
    });

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route(
            LOGIN_PATH,
            get(login_page).post(login_handler).layer(login_limit_layer),
        )
        .route("/admin/logout", get(logout_handler))
        .route(
            "/admin",
            get(admin_dashboard).layer(from_fn_with_state(state.clone(), route_guard)),
        )
        .route(
            "/admin/activity",
            post(activity).layer(from_fn_with_state(state.clone(), route_guard)),
        )
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
