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
    extractor::path::ApiPath,
    state::ApiState,
    store::Book,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct GetBookResponse {
    pub book: Book,
}

impl IntoResponse for GetBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Fetches a single book by isbn.
#[utoipa::path(
    get,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Isbn of the book")),
    responses(
        (status = 200, description = "The book", body = GetBookResponse),
        (status = 404, description = "No book with this isbn", body = ApiErrorResponse),
    )
)]
pub async fn get_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<GetBookResponse, ApiError> {
    let book = state
        .book_store()
        .get_by_isbn(&isbn)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    Ok(GetBookResponse { book })
}
