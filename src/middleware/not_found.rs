use axum::extract::{OriginalUri, State};

use crate::{
    error::{ApiError, ErrorVerbosityProvider, NotFoundError},
    state::ApiState,
};

/// Fallback for requests no route matches.
pub async fn not_found(State(state): State<ApiState>, OriginalUri(uri): OriginalUri) -> ApiError {
    tracing::debug!(%uri, "No route matched");

    ApiError::NotFound(NotFoundError::new(state.error_verbosity()))
}
