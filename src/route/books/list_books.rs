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
    state::ApiState,
    store::Book,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ListBooksResponse {
    pub books: Vec<Book>,
}

impl IntoResponse for ListBooksResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Lists every book.
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = ListBooksResponse),
        (status = 500, description = "Database failure", body = ApiErrorResponse),
    )
)]
pub async fn list_books(State(state): State<ApiState>) -> Result<ListBooksResponse, ApiError> {
    let books = state
        .book_store()
        .list_all()
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    Ok(ListBooksResponse { books })
}
