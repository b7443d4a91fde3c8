use crate::models::session::load_identity;
use crate::services::identity_client::Identity;
use crate::services::session_sweeper::expire_session;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::SignedCookieJar;
use session_core::{decide, GuardDecision, SessionVerdict};

pub const SESSION_COOKIE: &str = "admin_session";
pub const LOGIN_PATH: &str = "/admin/login";

#[derive(Template)]
#[template(path = "loading.html")]
struct LoadingTemplate {}

/// Removal cookie matching the attributes the session cookie was set with.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookie
}

/// Guard on every protected-area request.
///
/// One authoritative evaluation per request: the session verdict is read
/// once, then fed into the pure three-way decision. The expiry check runs
/// here as well as on the sweeper timer, so a session that lapsed while no
/// timer fired is still caught the moment its browser comes back.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Response {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let identity_loading = !*state.provider_ready.borrow();

    let (session_valid, identity) = match &session_id {
        Some(sid) => {
            let verdict = match state.monitor.check_and_expire(sid).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::error!(error = %e, "session store failure in route guard");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            if verdict == SessionVerdict::Expired {
                expire_session(&state, sid).await;
            }

            let identity = if verdict == SessionVerdict::Active {
                load_identity(state.sessions.as_ref(), sid)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!(error = %e, "identity lookup failed in route guard");
                        None
                    })
            } else {
                None
            };
            (verdict == SessionVerdict::Active, identity)
        }
        None => (false, None),
    };

    match decide(identity.is_some(), identity_loading, session_valid) {
        GuardDecision::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            LoadingTemplate {},
        )
            .into_response(),
        GuardDecision::Redirect => {
            // Clear any residual session state before bouncing to login.
            if let Some(sid) = &session_id {
                if let Err(e) = state.monitor.stop(sid).await {
                    tracing::warn!(error = %e, "failed to clear residual session record");
                }
                if let Err(e) =
                    crate::models::session::remove_identity(state.sessions.as_ref(), sid).await
                {
                    tracing::warn!(error = %e, "failed to clear residual identity");
                }
            }
            (jar.remove(clear_session_cookie()), Redirect::to(LOGIN_PATH)).into_response()
        }
        GuardDecision::Render => {
            // decide() only returns Render with an identity and a live
            // session, so both are present here.
            let (Some(sid), Some(identity)) = (session_id.as_deref(), identity) else {
                return Redirect::to(LOGIN_PATH).into_response();
            };
            // Any request that reaches the protected subtree counts as
            // activity and slides the idle window forward.
            if let Err(e) = state.monitor.touch(sid).await {
                tracing::warn!(error = %e, "failed to refresh session activity");
            }

            let mut request = request;
            request.extensions_mut().insert::<Identity>(identity);
            next.run(request).await
        }
    }
}
