use crate::services::identity_client::Identity;
use askama::Template;
use axum::{http::StatusCode, response::IntoResponse, Extension};

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub email: String,
}

/// Dashboard shell for the protected area. The content-management views
/// live behind it and are not part of this service.
pub async fn admin_dashboard(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    AdminTemplate {
        email: identity.email,
    }
}

/// Heartbeat posted by the admin pages on user activity (pointer, keys,
/// scroll, tab focus). The route guard has already slid the idle window
/// forward by the time this runs, so there is nothing left to do.
pub async fn activity() -> StatusCode {
    StatusCode::NO_CONTENT
}
