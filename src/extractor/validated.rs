use axum::{
    async_trait,
    extract::{FromRequest, Json as AxumJson, Request},
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::{ApiError, BodyError, ErrorVerbosityProvider, ValidationError},
    schema::ObjectSchema,
};

/// Extracts a JSON body and checks it against the schema of `T` before deserializing.
///
/// Every violation is collected, so the rejection lists all of them at once.
pub struct Validated<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Validated<T>
where
    T: ObjectSchema + DeserializeOwned + JsonSchema + Debug + Send,
    S: Send + Sync + ErrorVerbosityProvider,
{
    type Rejection = ApiError;

    #[tracing::instrument(name = "validated_extractor", skip_all)]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let verbosity = state.error_verbosity();

        let AxumJson(mut value) = AxumJson::<Value>::from_request(req, state)
            .await
            .map_err(|json_rejection| {
                tracing::warn!(rejection=?json_rejection, "Rejection");

                BodyError::from_json_rejection::<T>(verbosity, json_rejection)
            })?;

        let violations = T::violations(&value);

        if !violations.is_empty() {
            tracing::warn!(?violations, "Validation errors");

            return Err(ValidationError::new(verbosity, violations).into());
        }

        T::normalize(&mut value);

        match serde_json::from_value::<T>(value) {
            Ok(extracted) => {
                tracing::trace!(?extracted, "Validated");

                Ok(Validated(extracted))
            }
            Err(err) => {
                tracing::warn!(%err, "Deserialization failed after validation");

                Err(BodyError::from_reason::<T>(verbosity, err.to_string()))
            }
        }
    }
}
