// In-memory collaborators for unit and HTTP tests
// The repository emulates the database's unique constraints so race behaviour
// can be exercised without PostgreSQL

use crate::auth::{
    models::{NewUser, User, UserId},
    password::{HashError, PasswordHasher},
    repository::{LoginKind, RepositoryError, UserRepository},
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};
use std::time::Duration;

/// User repository backed by a `Vec`, with call counters
#[derive(Default)]
pub struct InMemoryUserRepository {
    rows: Mutex<Vec<User>>,
    insert_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    blind_precheck: bool,
    latency: Option<Duration>,
    failure: Option<RepositoryError>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the existence pre-check always report "free", as if a concurrent
    /// registration had not committed yet
    pub fn with_blind_precheck(mut self) -> Self {
        self.blind_precheck = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call fails with `failure`
    pub fn failing_with(mut self, failure: RepositoryError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self) -> Result<(), RepositoryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email_or_username(
        &self,
        name: &str,
        email: &str,
    ) -> Result<bool, RepositoryError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        if self.blind_precheck {
            return Ok(false);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .any(|u| u.name == name || u.email.eq_ignore_ascii_case(email)))
    }

    async fn register(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let mut rows = self.rows.lock().unwrap();

        if rows.iter().any(|u| u.name == user.name) {
            return Err(RepositoryError::UniqueViolation {
                constraint: Some("users_name_key".to_string()),
            });
        }
        if rows.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepositoryError::UniqueViolation {
                constraint: Some("users_email_lower_key".to_string()),
            });
        }

        let created = User {
            id: UserId::new(rows.len() as i64 + 1),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            registered_at: user.registered_at,
            register_ip: user.register_ip,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, RepositoryError> {
        self.enter().await?;
        let rows = self.rows.lock().unwrap();
        let found = match LoginKind::of(login) {
            LoginKind::Email => rows.iter().find(|u| u.email.eq_ignore_ascii_case(login)),
            LoginKind::Name => rows.iter().find(|u| u.name == login),
        };
        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.enter().await?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }
}

/// Fast reversible "hasher" that counts calls and can be told to fail
#[derive(Default)]
pub struct CountingHasher {
    hash_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl CountingHasher {
    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(HashError::Argon2("injected failure".to_string()));
        }
        Ok(format!("hashed:{}", plaintext.chars().rev().collect::<String>()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        hash.strip_prefix("hashed:")
            .map_or(false, |h| h.chars().rev().collect::<String>() == plaintext)
    }
}
