// Request body extraction with validation
// Deserializes JSON and runs the `validator` rules before the handler sees it

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use tracing::debug;
use validator::{Validate, ValidationError};

/// User names may not contain `@`, which marks a login as an email
pub fn validate_user_name(name: &str) -> Result<(), ValidationError> {
    if name.contains('@') {
        let mut error = ValidationError::new("user_name");
        error.message = Some(Cow::from("invalid name, must not contain '@'"));
        return Err(error);
    }
    Ok(())
}

/// JSON body that has passed its `Validate` rules.
///
/// Malformed JSON rejects as `AppError::Deserialize`, rule violations as
/// `AppError::Validation`.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(|errors| {
            debug!("Request body failed validation: {}", errors);
            AppError::Validation(errors)
        })?;
        Ok(ValidatedJson(value))
    }
}
