use axum::http::{HeaderName, HeaderValue};
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries a correlation id and echo it back on the
/// response, so login and lockout log lines can be tied to one request.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);

    let request_id = match req.headers().get(&header) {
        Some(value) => value.clone(),
        None => {
            let generated = Uuid::new_v4().to_string();
            let value = HeaderValue::from_str(&generated)
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            req.headers_mut().insert(header.clone(), value.clone());
            value
        }
    };

    let mut response = next.run(req).await;
    response.headers_mut().insert(header, request_id);
    response
}
