// Credential record persistence

use crate::auth::models::{NewUser, User, UserId};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

/// SQLSTATE for unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// Constraints and indexes guarding the credential table are prefixed with this
pub const CREDENTIAL_CONSTRAINT_PREFIX: &str = "users_";

/// Typed failure returned at the persistence boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("no rows found")]
    NotFound,

    #[error("database operation timed out")]
    Timeout,

    #[error("unique constraint violation (SQLSTATE 23505) on {}", describe(.constraint))]
    UniqueViolation { constraint: Option<String> },

    #[error("constraint violation (SQLSTATE {code}) on {}", describe(.constraint))]
    ConstraintViolation {
        code: String,
        constraint: Option<String>,
    },

    /// Anything the driver reports that has no dedicated tag; classified
    /// later from its message
    #[error("{0}")]
    Driver(String),
}

fn describe(constraint: &Option<String>) -> String {
    match constraint {
        Some(name) => format!("constraint \"{}\"", name),
        None => "unknown constraint".to_string(),
    }
}

/// Whether a unique constraint guards the credential table. An unnamed
/// constraint counts, since the only unique keys we write are on `users`.
pub fn is_credential_constraint(name: Option<&str>) -> bool {
    name.map_or(true, |name| name.starts_with(CREDENTIAL_CONSTRAINT_PREFIX))
}

impl RepositoryError {
    /// Whether a unique violation concerns the credential table
    pub fn is_credential_conflict(&self) -> bool {
        match self {
            RepositoryError::UniqueViolation { constraint } => {
                is_credential_constraint(constraint.as_deref())
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().map(str::to_string);
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => RepositoryError::UniqueViolation { constraint },
                    // class 23: integrity constraint violation
                    Some(code) if code.starts_with("23") => RepositoryError::ConstraintViolation {
                        code: code.to_string(),
                        constraint,
                    },
                    Some(code) => {
                        RepositoryError::Driver(format!("SQLSTATE {}: {}", code, db_err.message()))
                    }
                    None => RepositoryError::Driver(db_err.message().to_string()),
                }
            }
            other => RepositoryError::Driver(other.to_string()),
        }
    }
}

/// Which column a login string addresses. User names never contain `@`,
/// so anything with one is an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKind {
    Name,
    Email,
}

impl LoginKind {
    pub fn of(login: &str) -> Self {
        if login.contains('@') {
            LoginKind::Email
        } else {
            LoginKind::Name
        }
    }
}

/// Persistence capability consumed by the auth service.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Single combined lookup: true when either the name or the email is taken
    async fn find_by_email_or_username(&self, name: &str, email: &str)
        -> Result<bool, RepositoryError>;

    /// Insert a credential record and return it with its assigned identity
    async fn register(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Find a record by user name or email, chosen by [`LoginKind`]
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email_or_username(
        &self,
        name: &str,
        email: &str,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE name = $1 OR LOWER(email) = LOWER($2))",
        )
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn register(&self, user: NewUser) -> Result<User, RepositoryError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, registered_at, register_ip)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, registered_at, register_ip
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.registered_at)
        .bind(&user.register_ip)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, RepositoryError> {
        let query = match LoginKind::of(login) {
            LoginKind::Email => {
                r#"
                SELECT id, name, email, password_hash, registered_at, register_ip
                FROM users
                WHERE LOWER(email) = LOWER($1)
                "#
            }
            LoginKind::Name => {
                r#"
                SELECT id, name, email, password_hash, registered_at, register_ip
                FROM users
                WHERE name = $1
                "#
            }
        };

        let user = sqlx::query_as::<_, User>(query)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, registered_at, register_ip
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
