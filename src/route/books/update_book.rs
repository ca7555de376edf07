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
    extractor::{path::ApiPath, validated::Validated},
    state::ApiState,
    store::Book,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateBookResponse {
    pub book: Book,
}

impl IntoResponse for UpdateBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Overwrites every field of a book. The isbn in the path is the key and never changes.
#[utoipa::path(
    put,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Isbn of the book")),
    request_body = Book,
    responses(
        (status = 200, description = "The updated book", body = UpdateBookResponse),
        (status = 400, description = "Schema violations", body = ApiErrorResponse),
        (status = 404, description = "No book with this isbn", body = ApiErrorResponse),
    )
)]
pub async fn update_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
    Validated(book): Validated<Book>,
) -> Result<UpdateBookResponse, ApiError> {
    let book = state
        .book_store()
        .update(&isbn, &book)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    Ok(UpdateBookResponse { book })
}
