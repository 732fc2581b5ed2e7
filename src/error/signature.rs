// Message-signature detection for failures whose type we do not own.
//
// Foreign driver errors and opaque collaborator failures only give us text.
// The rules below run in a fixed order and the first match wins.

use crate::auth::repository::{is_credential_constraint, UNIQUE_VIOLATION};
use crate::error::{ClassifiedError, ErrorCode};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

/// Input fields with a tailored validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatedField {
    Password,
    Email,
}

impl ValidatedField {
    pub fn message(self) -> &'static str {
        match self {
            ValidatedField::Password => "invalid password, min length 6",
            ValidatedField::Email => "invalid email",
        }
    }
}

/// Failure shape recognised by the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    NoRows,
    Timeout,
    /// SQLSTATE class 23; `credential` marks a unique violation on the users table
    Constraint { sqlstate: String, credential: bool },
    FieldValidation { field: Option<ValidatedField> },
    Deserialization,
    MalformedIdentifier,
    AuthContext,
    Hashing,
    Unknown,
}

type Rule = fn(&str, &str) -> Option<Signature>;

/// Detection order. Reordering changes classification results.
const RULES: [Rule; 8] = [
    no_rows,
    timeout,
    constraint,
    field_validation,
    deserialization,
    malformed_identifier,
    auth_context,
    hashing,
];

static SQLSTATE_RE: OnceLock<Regex> = OnceLock::new();
static CONSTRAINT_RE: OnceLock<Regex> = OnceLock::new();

fn sqlstate_regex() -> &'static Regex {
    SQLSTATE_RE.get_or_init(|| {
        Regex::new(r"(?i)sqlstate[\s:=]*([0-9a-z]{5})")
            .unwrap_or_else(|error| panic!("sqlstate regex failed to compile: {error}"))
    })
}

fn constraint_regex() -> &'static Regex {
    CONSTRAINT_RE.get_or_init(|| {
        Regex::new(r#"(?i)constraint\s+"([^"]+)""#)
            .unwrap_or_else(|error| panic!("constraint regex failed to compile: {error}"))
    })
}

/// Quoted constraint name, if the message names one
fn constraint_name(raw: &str) -> Option<&str> {
    Some(constraint_regex().captures(raw)?.get(1)?.as_str())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn no_rows(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(lower, &["no rows", "row not found"]).then_some(Signature::NoRows)
}

fn timeout(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(lower, &["deadline exceeded", "timed out", "timeout"])
        .then_some(Signature::Timeout)
}

fn constraint(raw: &str, lower: &str) -> Option<Signature> {
    let code = if lower.contains("duplicate key value violates unique constraint") {
        UNIQUE_VIOLATION.to_string()
    } else {
        sqlstate_regex()
            .captures(raw)?
            .get(1)?
            .as_str()
            .to_ascii_uppercase()
    };
    // only integrity constraint violations; other SQLSTATEs fall through
    if !code.starts_with("23") {
        return None;
    }
    let credential = code == UNIQUE_VIOLATION && is_credential_constraint(constraint_name(raw));
    Some(Signature::Constraint {
        sqlstate: code,
        credential,
    })
}

fn field_validation(_raw: &str, lower: &str) -> Option<Signature> {
    if !contains_any(lower, &["field validation", "validation error", "validation failed"]) {
        return None;
    }
    let field = if lower.contains("password") {
        Some(ValidatedField::Password)
    } else if lower.contains("email") {
        Some(ValidatedField::Email)
    } else {
        None
    };
    Some(Signature::FieldValidation { field })
}

fn deserialization(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(
        lower,
        &["unmarshal", "deserialize", "invalid json", "eof while parsing"],
    )
    .then_some(Signature::Deserialization)
}

fn malformed_identifier(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(lower, &["uuid", "invalid user id", "malformed identifier"])
        .then_some(Signature::MalformedIdentifier)
}

fn auth_context(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(lower, &["cookie", "token"]).then_some(Signature::AuthContext)
}

fn hashing(_raw: &str, lower: &str) -> Option<Signature> {
    contains_any(lower, &["bcrypt", "argon2"]).then_some(Signature::Hashing)
}

impl Signature {
    /// Run the rules over `message`; `Unknown` when none match
    pub fn detect(message: &str) -> Signature {
        let lower = message.to_lowercase();
        RULES
            .iter()
            .find_map(|rule| rule(message, &lower))
            .unwrap_or(Signature::Unknown)
    }

    /// Map the shape to its classified form; `raw` is the original message
    pub fn classify(&self, raw: &str) -> ClassifiedError {
        match self {
            Signature::NoRows => {
                ClassifiedError::with_message(ErrorCode::NotFound, "data not found")
            }
            Signature::Timeout => {
                ClassifiedError::with_message(ErrorCode::RequestTimeout, "request timeout")
            }
            Signature::Constraint {
                credential: true, ..
            } => ClassifiedError::duplicate_identity(),
            Signature::Constraint { sqlstate, .. } => ClassifiedError::new(
                ErrorCode::BadRequest,
                Some(json!({ "message": "bad request", "sqlstate": sqlstate })),
            ),
            Signature::FieldValidation { field } => ClassifiedError::with_message(
                ErrorCode::BadRequest,
                field.map_or("bad request", ValidatedField::message),
            ),
            Signature::Deserialization => {
                ClassifiedError::with_message(ErrorCode::BadRequest, "invalid request body")
            }
            // produced by input-shape checks, so the text is safe to echo
            Signature::MalformedIdentifier => {
                ClassifiedError::with_message(ErrorCode::BadRequest, raw)
            }
            Signature::AuthContext => {
                ClassifiedError::with_message(ErrorCode::Unauthorized, "unauthorized")
            }
            Signature::Hashing => {
                ClassifiedError::with_message(ErrorCode::BadRequest, "invalid password")
            }
            Signature::Unknown => ClassifiedError::internal(raw),
        }
    }
}
