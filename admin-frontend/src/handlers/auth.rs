use crate::middleware::guard::{clear_session_cookie, LOGIN_PATH, SESSION_COOKIE};
use crate::models::session::{load_identity, remove_identity, save_identity};
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use session_core::GateError;
use uuid::Uuid;

const GENERIC_FAILURE: &str = "Failed to log in. Please try again.";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// One throttle scope per client. Proxy headers are honored when present so
/// the lockout follows the browser rather than the reverse proxy.
pub fn client_scope(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "direct".to_string())
}

/// Non-persistent cookie: it goes away with the browser, mirroring the
/// tab-scoped ephemeral storage of the original client.
fn session_cookie(session_id: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Login form. An already signed-in visitor is bounced straight to the
/// dashboard, same as the public site behaves.
pub async fn login_page(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state
            .monitor
            .is_valid(cookie.value())
            .await
            .unwrap_or(false)
        {
            return Redirect::to("/admin").into_response();
        }
    }
    LoginTemplate { error: None }.into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    Form(payload): Form<LoginForm>,
) -> Response {
    let scope = client_scope(&headers);
    let session_id = Uuid::new_v4().to_string();

    match state
        .gate
        .submit(&scope, &session_id, &payload.email, &payload.password)
        .await
    {
        Ok(identity) => {
            if let Err(e) = save_identity(state.sessions.as_ref(), &session_id, &identity).await {
                tracing::error!(error = %e, "failed to persist session identity");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    LoginTemplate {
                        error: Some(GENERIC_FAILURE.to_string()),
                    },
                )
                    .into_response();
            }
            (
                jar.add(session_cookie(session_id)),
                Redirect::to("/admin"),
            )
                .into_response()
        }
        Err(err) => {
            let (status, message) = match &err {
                GateError::Validation(message) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, message.clone())
                }
                GateError::Lockout(seconds) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("Too many attempts, try again in {seconds} seconds"),
                ),
                GateError::InvalidCredential => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid email or password".to_string(),
                ),
                GateError::Unknown(_) => (StatusCode::UNAUTHORIZED, GENERIC_FAILURE.to_string()),
                GateError::Store(e) => {
                    tracing::error!(error = %e, "attempt store failure during login");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        GENERIC_FAILURE.to_string(),
                    )
                }
            };
            (
                status,
                LoginTemplate {
                    error: Some(message),
                },
            )
                .into_response()
        }
    }
}

/// Explicit sign-out: revoke the provider session best-effort, then clear
/// local state regardless.
pub async fn logout_handler(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session_id = cookie.value().to_string();

        match load_identity(state.sessions.as_ref(), &session_id).await {
            Ok(Some(identity)) => {
                if let Err(e) = state.identity.sign_out(&identity.access_token).await {
                    tracing::warn!(error = %e, "provider sign-out failed during logout");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "identity lookup failed during logout"),
        }

        if let Err(e) = state.monitor.stop(&session_id).await {
            tracing::warn!(error = %e, "failed to clear session record during logout");
        }
        if let Err(e) = remove_identity(state.sessions.as_ref(), &session_id).await {
            tracing::warn!(error = %e, "failed to clear identity during logout");
        }
        tracing::info!("user signed out");
    }

    (jar.remove(clear_session_cookie()), Redirect::to(LOGIN_PATH)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_scope_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());

        assert_eq!(client_scope(&headers), "203.0.113.7");
    }

    #[test]
    fn client_scope_falls_back_to_real_ip_then_direct() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.9".parse().unwrap());
        assert_eq!(client_scope(&headers), "198.51.100.9");

        assert_eq!(client_scope(&HeaderMap::new()), "direct");
    }
}
