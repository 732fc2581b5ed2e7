// Password hashing and verification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Argon2, PasswordHash,
};
use thiserror::Error;

/// Lowest bcrypt work factor accepted
pub const MIN_BCRYPT_COST: u32 = 10;

/// bcrypt ignores everything after this many bytes
pub const BCRYPT_MAX_INPUT: usize = 72;

#[derive(Debug, Error)]
pub enum HashError {
    /// The hashing library cannot accept this plaintext as-is
    #[error("bcrypt: password length {len} exceeds 72 bytes")]
    InputTooLong { len: usize },

    #[error("bcrypt: cost {0} is outside 10..=31")]
    InvalidCost(u32),

    #[error("bcrypt: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("argon2: {0}")]
    Argon2(String),

    /// The blocking hashing task did not complete
    #[error("password hashing task failed: {0}")]
    Interrupted(String),
}

/// One-way salted password hashing.
///
/// `hash` embeds the per-call salt in its output. `verify` never fails loudly:
/// malformed hashes and scheme mismatches read as a wrong password.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// bcrypt with a fixed work factor
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(MIN_BCRYPT_COST..=31).contains(&cost) {
            return Err(HashError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        if plaintext.len() > BCRYPT_MAX_INPUT {
            return Err(HashError::InputTooLong {
                len: plaintext.len(),
            });
        }
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        // bcrypt::verify compares digests in constant time
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }
}

/// Argon2id with the library's default parameters, PHC string output
#[derive(Default, Clone)]
pub struct Argon2Hasher {
    argon: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Argon2(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
