use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ErrorVerbosity {
    /// Server returns only the appropriate status code with an empty body.
    StatusCode,
    /// Server returns the error envelope. Internal errors carry a generic message.
    #[default]
    Message,
    /// Server returns the error envelope. Internal errors carry their cause and
    /// body errors carry the expected schema.
    Full,
}

impl ErrorVerbosity {
    pub fn should_generate_error_reason(&self) -> bool {
        matches!(self, ErrorVerbosity::Full)
    }
}

pub trait ErrorVerbosityProvider {
    fn error_verbosity(&self) -> ErrorVerbosity;
}

/// The `message` of an error envelope: a single text or a list of violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Violations(Vec<String>),
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Either a string or a list of violation strings.
    #[schema(value_type = Object)]
    message: ErrorMessage,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_schema: Option<String>,
}

/// Uniform error envelope: `{"error": {"message": ..., "status": ...}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    error: ErrorBody,
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        let status = error.status_code().as_u16();
        let expected_schema = match &error {
            ApiError::Body(err) => err.expected_schema.clone(),
            _ => None,
        };

        ApiErrorResponse {
            error: ErrorBody {
                message: error.into_message(),
                status,
                expected_schema,
            },
        }
    }
}

#[derive(Debug, From)]
/// API error
pub enum ApiError {
    /// Internal server error
    ///
    /// Returned for every failure not explicitly handled, e.g. database errors.
    InternalServerError(InternalServerError),
    /// Validation error
    ///
    /// Returned when the request body violates the book schema.
    Validation(ValidationError),
    /// Book not found
    ///
    /// Returned when no book matches the requested isbn.
    BookNotFound(BookNotFoundError),
    /// Body error
    ///
    /// Returned when the body is not valid JSON.
    Body(BodyError),
    /// Path error
    ///
    /// Returned when the path parameters are not as expected.
    Path(PathError),
    /// Method not allowed
    MethodNotAllowed(MethodNotAllowedError),
    /// Not found error
    ///
    /// Returned when no route matches the request.
    NotFound(NotFoundError),
}

impl ApiError {
    pub fn from_store_error(verbosity: ErrorVerbosity, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(isbn) => BookNotFoundError::new(verbosity, isbn).into(),
            StoreError::Database(err) => {
                InternalServerError::from_generic_error(verbosity, err).into()
            }
        }
    }

    fn verbosity(&self) -> ErrorVerbosity {
        match self {
            ApiError::InternalServerError(err) => err.verbosity,
            ApiError::Validation(err) => err.verbosity,
            ApiError::BookNotFound(err) => err.verbosity,
            ApiError::Body(err) => err.verbosity,
            ApiError::Path(err) => err.verbosity,
            ApiError::MethodNotAllowed(err) => err.verbosity,
            ApiError::NotFound(err) => err.verbosity,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::BookNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Path(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn into_message(self) -> ErrorMessage {
        match self {
            ApiError::InternalServerError(err) => ErrorMessage::Text(
                err.internal_server_error
                    .unwrap_or_else(|| "An internal server error has occurred".to_string()),
            ),
            ApiError::Validation(err) => ErrorMessage::Violations(err.violations),
            ApiError::BookNotFound(err) => {
                ErrorMessage::Text(format!("There is no book with an isbn '{}", err.isbn))
            }
            ApiError::Body(err) => ErrorMessage::Text(err.body_error_reason),
            ApiError::Path(err) => ErrorMessage::Text(err.path_error_reason),
            ApiError::MethodNotAllowed(_) => "Method Not Allowed".into(),
            ApiError::NotFound(_) => "Not Found".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        match self.verbosity() {
            ErrorVerbosity::StatusCode => status_code.into_response(),
            ErrorVerbosity::Message | ErrorVerbosity::Full => {
                (status_code, Json(ApiErrorResponse::from(self))).into_response()
            }
        }
    }
}

#[derive(Debug)]
pub struct InternalServerError {
    verbosity: ErrorVerbosity,
    internal_server_error: Option<String>,
}

impl InternalServerError {
    pub fn from_generic_error<E: Into<anyhow::Error>>(verbosity: ErrorVerbosity, err: E) -> Self {
        let err: anyhow::Error = err.into();
        let err = format!("{err:#}");
        tracing::error!(%err, "Internal server error");

        let internal_server_error = verbosity.should_generate_error_reason().then_some(err);

        InternalServerError {
            verbosity,
            internal_server_error,
        }
    }
}

#[derive(Debug)]
pub struct ValidationError {
    verbosity: ErrorVerbosity,
    violations: Vec<String>,
}

impl ValidationError {
    pub fn new(verbosity: ErrorVerbosity, violations: Vec<String>) -> Self {
        ValidationError {
            verbosity,
            violations,
        }
    }
}

#[derive(Debug)]
pub struct BookNotFoundError {
    verbosity: ErrorVerbosity,
    isbn: String,
}

impl BookNotFoundError {
    pub fn new(verbosity: ErrorVerbosity, isbn: String) -> Self {
        BookNotFoundError { verbosity, isbn }
    }
}

#[derive(Debug)]
pub struct BodyError {
    verbosity: ErrorVerbosity,
    body_error_reason: String,
    expected_schema: Option<String>,
}

impl BodyError {
    pub fn new(
        verbosity: ErrorVerbosity,
        body_error_reason: String,
        expected_schema: Option<String>,
    ) -> Self {
        BodyError {
            verbosity,
            body_error_reason,
            expected_schema,
        }
    }

    /// Maps a JSON rejection, attaching the schema of `T` when the verbosity allows it.
    pub fn from_json_rejection<T: JsonSchema>(
        verbosity: ErrorVerbosity,
        json_rejection: JsonRejection,
    ) -> ApiError {
        Self::from_reason::<T>(verbosity, json_rejection.body_text())
    }

    pub fn from_reason<T: JsonSchema>(verbosity: ErrorVerbosity, reason: String) -> ApiError {
        let expected_schema = match verbosity.should_generate_error_reason() {
            true => match serde_yaml::to_string(&schema_for!(T)) {
                Ok(schema) => Some(schema),
                Err(err) => return InternalServerError::from_generic_error(verbosity, err).into(),
            },
            false => None,
        };

        BodyError::new(verbosity, reason, expected_schema).into()
    }
}

#[derive(Debug)]
pub struct PathError {
    verbosity: ErrorVerbosity,
    path_error_reason: String,
}

impl PathError {
    pub fn new(verbosity: ErrorVerbosity, path_error_reason: String) -> Self {
        PathError {
            verbosity,
            path_error_reason,
        }
    }

    pub fn from_path_rejection(verbosity: ErrorVerbosity, path_rejection: PathRejection) -> ApiError {
        PathError::new(verbosity, path_rejection.body_text()).into()
    }
}

#[derive(Debug)]
pub struct MethodNotAllowedError {
    verbosity: ErrorVerbosity,
}

impl MethodNotAllowedError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        MethodNotAllowedError { verbosity }
    }
}

#[derive(Debug)]
pub struct NotFoundError {
    verbosity: ErrorVerbosity,
}

impl NotFoundError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        NotFoundError { verbosity }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    use super::*;

    async fn render(error: ApiError) -> (StatusCode, Option<Value>) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).unwrap());

        (status, body)
    }

    #[tokio::test]
    async fn book_not_found_keeps_the_unbalanced_quote() {
        let error = BookNotFoundError::new(ErrorVerbosity::Message, "wrong_isbn".to_string());

        let (status, body) = render(error.into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            Some(json!({"error": {"message": "There is no book with an isbn 'wrong_isbn", "status": 404}}))
        );
    }

    #[tokio::test]
    async fn validation_error_lists_violations() {
        let violations = vec!["instance requires property \"publisher\"".to_string()];
        let error = ValidationError::new(ErrorVerbosity::Message, violations);

        let (status, body) = render(error.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            Some(json!({"error": {"message": ["instance requires property \"publisher\""], "status": 400}}))
        );
    }

    #[tokio::test]
    async fn internal_error_hides_cause_unless_full() {
        let (status, body) = render(
            InternalServerError::from_generic_error(ErrorVerbosity::Message, anyhow::anyhow!("disk on fire"))
                .into(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            Some(json!({"error": {"message": "An internal server error has occurred", "status": 500}}))
        );

        let (_, body) = render(
            InternalServerError::from_generic_error(ErrorVerbosity::Full, anyhow::anyhow!("disk on fire"))
                .into(),
        )
        .await;

        assert_eq!(
            body,
            Some(json!({"error": {"message": "disk on fire", "status": 500}}))
        );
    }

    #[tokio::test]
    async fn status_code_verbosity_has_empty_body() {
        let (status, body) = render(NotFoundError::new(ErrorVerbosity::StatusCode).into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, None);
    }

    #[test]
    fn store_errors_map_to_api_errors() {
        let not_found = ApiError::from_store_error(
            ErrorVerbosity::Message,
            StoreError::NotFound("wrong_isbn".to_string()),
        );
        assert!(matches!(not_found, ApiError::BookNotFound(_)));

        let database = ApiError::from_store_error(
            ErrorVerbosity::Message,
            StoreError::Database(sqlx::Error::RowNotFound),
        );
        assert!(matches!(database, ApiError::InternalServerError(_)));
    }
}
