// Authentication module
// Registration, login and token refresh over pluggable persistence, hashing and token collaborators

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

pub use error::AuthError;
pub use middleware::AuthenticatedUser;
pub use service::AuthService;
