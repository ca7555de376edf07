use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiErrorResponse, ErrorVerbosityProvider},
    extractor::validated::Validated,
    state::ApiState,
    store::Book,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateBookResponse {
    pub book: Book,
}

impl IntoResponse for CreateBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

/// Creates a book. A duplicate isbn is not checked up front and fails as an internal error.
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = Book,
    responses(
        (status = 201, description = "The created book", body = CreateBookResponse),
        (status = 400, description = "Schema violations", body = ApiErrorResponse),
        (status = 500, description = "Database failure", body = ApiErrorResponse),
    )
)]
pub async fn create_book(
    State(state): State<ApiState>,
    Validated(book): Validated<Book>,
) -> Result<CreateBookResponse, ApiError> {
    let book = state
        .book_store()
        .create(&book)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    Ok(CreateBookResponse { book })
}
