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
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteBookResponse {
    pub message: String,
}

impl IntoResponse for DeleteBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[utoipa::path(
    delete,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Isbn of the book")),
    responses(
        (status = 200, description = "Book deleted", body = DeleteBookResponse),
        (status = 404, description = "No book with this isbn", body = ApiErrorResponse),
    )
)]
pub async fn delete_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<DeleteBookResponse, ApiError> {
    state
        .book_store()
        .remove(&isbn)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    Ok(DeleteBookResponse {
        message: "Book deleted".to_string(),
    })
}
