use axum::{routing::get, Json, Router};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::{
    error::{ApiErrorResponse, ErrorBody},
    route::books::{
        create_book::CreateBookResponse, delete_book::DeleteBookResponse,
        get_book::GetBookResponse, list_books::ListBooksResponse,
        update_book::UpdateBookResponse,
    },
    state::ApiState,
    store::Book,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::route::books::list_books::list_books,
        crate::route::books::get_book::get_book,
        crate::route::books::create_book::create_book,
        crate::route::books::update_book::update_book,
        crate::route::books::delete_book::delete_book,
    ),
    components(schemas(
        Book,
        ListBooksResponse,
        GetBookResponse,
        CreateBookResponse,
        UpdateBookResponse,
        DeleteBookResponse,
        ApiErrorResponse,
        ErrorBody,
    )),
    tags((name = "books", description = "Book records keyed by isbn"))
)]
pub struct ApiDoc;

/// Serves the OpenAPI document as JSON and rendered through ReDoc.
pub fn app() -> Router<ApiState> {
    Router::<ApiState>::new()
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(Redoc::with_url("/redoc", ApiDoc::openapi()))
}
