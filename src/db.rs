use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Creates the PostgreSQL connection pool.
///
/// `acquire_timeout` bounds how long a query waits for a free connection;
/// running out surfaces as `RepositoryError::Timeout`.
pub async fn create_pool(
    database_url: &str,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}
