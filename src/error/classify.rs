// Error classifier: any AppError -> ClassifiedError
//
// Typed failures map directly. Text-only failures (foreign driver messages,
// opaque collaborator errors) go through `Signature::detect`.

use crate::auth::{
    error::AuthError, password::HashError, repository::RepositoryError, token::TokenError,
};
use crate::error::{AppError, ClassifiedError, ErrorCode, Signature, ValidatedField};
use serde_json::json;
use validator::ValidationErrors;

/// Classify a failure. Pure, total and idempotent: an already classified
/// error comes back unchanged.
pub fn classify(err: &AppError) -> ClassifiedError {
    match err {
        AppError::Auth(auth) => classify_auth(auth),
        AppError::Validation(errors) => classify_validation(errors),
        AppError::Deserialize(message) => Signature::Deserialization.classify(message),
        AppError::MalformedId(parse) => Signature::MalformedIdentifier.classify(&parse.to_string()),
        AppError::Classified(classified) => classified.clone(),
        AppError::Foreign(message) => Signature::detect(message).classify(message),
    }
}

fn classify_auth(err: &AuthError) -> ClassifiedError {
    match err {
        AuthError::DuplicateIdentity => ClassifiedError::duplicate_identity(),
        AuthError::WrongCredentials => {
            ClassifiedError::with_message(ErrorCode::Unauthorized, "wrong credentials")
        }
        AuthError::UserNotFound(_) => {
            ClassifiedError::with_message(ErrorCode::NotFound, "user not found")
        }
        // the hashing library refused the caller's input
        AuthError::Hashing(HashError::InputTooLong { .. }) => {
            Signature::Hashing.classify(&err.to_string())
        }
        AuthError::Hashing(_) => ClassifiedError::internal(err),
        AuthError::Token(token) => classify_token(token),
        AuthError::Repository { source, .. } => classify_repository(source, err),
        AuthError::Timeout { .. } => Signature::Timeout.classify(&err.to_string()),
    }
}

fn classify_token(err: &TokenError) -> ClassifiedError {
    let message = match err {
        TokenError::Invalid => "invalid jwt token",
        TokenError::Expired => "expired jwt token",
        TokenError::InvalidClaims(_) => "invalid jwt claims",
        TokenError::Config(_) | TokenError::Issue(_) => return ClassifiedError::internal(err),
    };
    ClassifiedError::with_message(ErrorCode::Unauthorized, message)
}

fn classify_repository(source: &RepositoryError, whole: &AuthError) -> ClassifiedError {
    let raw = whole.to_string();
    let signature = match source {
        RepositoryError::NotFound => Signature::NoRows,
        RepositoryError::Timeout => Signature::Timeout,
        RepositoryError::UniqueViolation { .. } => Signature::Constraint {
            sqlstate: "23505".to_string(),
            credential: source.is_credential_conflict(),
        },
        RepositoryError::ConstraintViolation { code, .. } => Signature::Constraint {
            sqlstate: code.clone(),
            credential: false,
        },
        RepositoryError::Driver(message) => Signature::detect(message),
    };
    signature.classify(&raw)
}

fn classify_validation(errors: &ValidationErrors) -> ClassifiedError {
    let fields = errors.field_errors();
    let (key, field) = if fields.contains_key("password") {
        ("password", Some(ValidatedField::Password))
    } else if fields.contains_key("email") {
        ("email", Some(ValidatedField::Email))
    } else {
        (fields.keys().min().copied().unwrap_or_default(), None)
    };

    // a message set on the rule itself wins over the field default
    let own = fields
        .get(key)
        .and_then(|errs| errs.iter().find_map(|e| e.message.as_deref()));
    let message = own.unwrap_or_else(|| field.map_or("bad request", ValidatedField::message));

    ClassifiedError::new(
        ErrorCode::BadRequest,
        Some(json!({
            "message": message,
            "fields": errors,
        })),
    )
}
