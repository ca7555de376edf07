use axum::{
    extract::{Request, State},
    http::{header::ALLOW, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ErrorVerbosityProvider, MethodNotAllowedError};

/// Middleware to replace axum's empty `405` response with our [`ApiError`] envelope.
///
/// The `Allow` header axum computed for the route is carried over.
pub async fn method_not_allowed<S: ErrorVerbosityProvider>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let resp = next.run(req).await;

    if resp.status() != StatusCode::METHOD_NOT_ALLOWED {
        return resp;
    }

    tracing::debug!(%method, %uri, "Method not allowed");

    let mut error_resp =
        ApiError::from(MethodNotAllowedError::new(state.error_verbosity())).into_response();

    if let Some(allow) = resp.headers().get(ALLOW) {
        error_resp.headers_mut().insert(ALLOW, allow.clone());
    }

    error_resp
}
