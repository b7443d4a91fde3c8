use askama::Template;
use axum::response::IntoResponse;

/// Public landing stub. The portfolio pages themselves are served
/// elsewhere; this service only fronts the admin area.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {}

pub async fn index() -> impl IntoResponse {
    IndexTemplate {}
}

/// Liveness of this service, distinct from the identity-service readiness
/// the route guard tracks.
pub async fn health_check() -> &'static str {
    "OK"
}
