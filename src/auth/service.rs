// Authentication service - business logic layer

use crate::auth::{
    error::AuthError,
    models::{NewUser, Plaintext, Registration, TokenPair, UserId, UserResponse},
    password::{HashError, PasswordHasher},
    repository::{RepositoryError, UserRepository},
    token::TokenManager,
};
use chrono::Utc;
use std::{
    future::Future,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Default per-operation budget
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Hashed once per service; unknown logins verify against it
const DUMMY_PASSWORD: &str = "dummy password for unknown logins";

/// Authentication service coordinating registration, login and token refresh.
///
/// Holds no mutable state of its own; the injected collaborators must be safe
/// for concurrent use.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenManager>,
    timeout: Duration,
    dummy_hash: Arc<OnceLock<String>>,
}

fn repository(operation: &'static str) -> impl FnOnce(RepositoryError) -> AuthError {
    move |source| AuthError::Repository { operation, source }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            timeout,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Register a new user and issue their first token pair.
    ///
    /// A name or email that is already taken fails with `DuplicateIdentity`
    /// before any hashing or insert happens. The pre-check races with
    /// concurrent registrations; the unique constraints in the database are
    /// the authoritative guard and surface as a repository unique violation.
    pub async fn register(&self, registration: Registration) -> Result<TokenPair, AuthError> {
        self.bounded("register", self.register_inner(registration)).await
    }

    async fn register_inner(&self, registration: Registration) -> Result<TokenPair, AuthError> {
        let Registration {
            name,
            email,
            password,
            register_ip,
        } = registration;

        let taken = self
            .users
            .find_by_email_or_username(&name, &email)
            .await
            .map_err(repository("find_by_email_or_username"))?;
        if taken {
            warn!("Registration rejected, identity already in use: name={}", name);
            return Err(AuthError::DuplicateIdentity);
        }

        let password_hash = self.hash_password(password).await?;

        let new_user = NewUser {
            name,
            email,
            password_hash,
            registered_at: Utc::now(),
            register_ip,
        };

        let user = self
            .users
            .register(new_user)
            .await
            .map_err(repository("register"))?;
        info!("Registered user id={}", user.id);

        // The record stays persisted if issuing fails; the caller may retry
        // issuance through login.
        self.issue_pair(user.id).map_err(|e| {
            error!("Token issuance failed for newly registered user id={}: {}", user.id, e);
            e
        })
    }

    /// Authenticate by user name or email and password.
    ///
    /// Unknown logins and wrong passwords are reported identically and both
    /// pay for one password verification.
    pub async fn login(&self, login: &str, password: Plaintext) -> Result<TokenPair, AuthError> {
        self.bounded("login", self.login_inner(login, password)).await
    }

    async fn login_inner(&self, login: &str, password: Plaintext) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .find_by_login(login)
            .await
            .map_err(repository("find_by_login"))?;

        let Some(user) = user else {
            self.verify_dummy(password).await?;
            debug!("Login attempt for unknown identity");
            return Err(AuthError::WrongCredentials);
        };

        if !self.verify_password(user.password_hash, password).await? {
            debug!("Login attempt with wrong password for user id={}", user.id);
            return Err(AuthError::WrongCredentials);
        }

        info!("User id={} logged in", user.id);
        self.issue_pair(user.id)
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let subject = self.tokens.parse_refresh(refresh_token).map_err(|e| {
            warn!("Refresh rejected: {}", e);
            AuthError::Token(e)
        })?;
        debug!("Rotating tokens for user id={}", subject);
        self.issue_pair(subject)
    }

    /// Resolve an access token to its subject
    pub fn authenticate(&self, access_token: &str) -> Result<UserId, AuthError> {
        Ok(self.tokens.parse(access_token)?)
    }

    /// Public view of a credential record
    pub async fn profile(&self, id: UserId) -> Result<UserResponse, AuthError> {
        self.bounded("profile", async {
            self.users
                .find_by_id(id)
                .await
                .map_err(repository("find_by_id"))?
                .map(UserResponse::from)
                .ok_or(AuthError::UserNotFound(id))
        })
        .await
    }

    fn issue_pair(&self, subject: UserId) -> Result<TokenPair, AuthError> {
        let access_token = self.tokens.issue_access_token(subject)?;
        let refresh_token = self.tokens.issue_refresh_token(subject)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn hash_password(&self, password: Plaintext) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(password.expose()))
            .await
            .map_err(|e| HashError::Interrupted(e.to_string()))??;
        Ok(hash)
    }

    async fn verify_password(&self, hash: String, password: Plaintext) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&hash, password.expose()))
            .await
            .map_err(|e| HashError::Interrupted(e.to_string()))?;
        Ok(matches)
    }

    async fn verify_dummy(&self, password: Plaintext) -> Result<(), AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let dummy = Arc::clone(&self.dummy_hash);
        tokio::task::spawn_blocking(move || {
            let hash = dummy.get_or_init(|| hasher.hash(DUMMY_PASSWORD).unwrap_or_default());
            hasher.verify(hash, password.expose())
        })
        .await
        .map_err(|e| HashError::Interrupted(e.to_string()))?;
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} exceeded its {:?} budget", operation, self.timeout);
                Err(AuthError::Timeout { operation })
            }
        }
    }
}
