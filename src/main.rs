pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod validation;

#[cfg(test)]
mod test_support;

use axum::{
    http::{header, HeaderValue, Request},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use auth::{
    handlers,
    models::{LoginRequest, RefreshRequest, RegisterRequest, TokenPair, UserResponse},
    password::{Argon2Hasher, BcryptHasher, PasswordHasher},
    repository::PgUserRepository,
    token::JwtManager,
    AuthService,
};
use config::{Config, PasswordScheme};
use error::{ClassifiedError, ErrorCode};

/// Registers the bearer token scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        handlers::index_handler,
        handlers::register_handler,
        handlers::login_handler,
        handlers::refresh_handler,
        handlers::me_handler,
        handlers::get_user_handler,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            TokenPair,
            UserResponse,
            ClassifiedError,
            ErrorCode,
            handlers::Banner
        )
    ),
    tags(
        (name = "meta", description = "Service information"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "User lookup")
    ),
    info(
        title = "Account API",
        version = "1.0.0",
        description = "User registration and JWT authentication with classified errors"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub app_name: String,
}

/// Request ids are random v4 UUIDs
#[derive(Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Creates and configures the application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let server_name = HeaderValue::from_str(&state.app_name)
        .unwrap_or_else(|_| HeaderValue::from_static("account-api"));
    let request_id = header::HeaderName::from_static("x-request-id");

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), UuidRequestId))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(SetResponseHeaderLayer::overriding(header::SERVER, server_name))
        .layer(cors);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::index_handler))
        .route("/api/v1/auth/register", post(handlers::register_handler))
        .route("/api/v1/auth/login", post(handlers::login_handler))
        .route("/api/v1/auth/refresh", post(handlers::refresh_handler))
        .route("/api/v1/auth/me", get(handlers::me_handler))
        .route("/api/v1/users/:id", get(handlers::get_user_handler))
        .layer(layers)
        .with_state(state)
}

fn password_hasher(config: &Config) -> Result<Arc<dyn PasswordHasher>, auth::password::HashError> {
    let hasher: Arc<dyn PasswordHasher> = match config.password_scheme {
        PasswordScheme::Bcrypt => Arc::new(BcryptHasher::new(config.bcrypt_cost)?),
        PasswordScheme::Argon2 => Arc::new(Argon2Hasher::new()),
    };
    Ok(hasher)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!("{} - Starting...", config.app_name);

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.request_timeout)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let hasher = password_hasher(&config).expect("Invalid password hasher configuration");
    let tokens = JwtManager::new(&config.jwt_secret, config.token_ttl)
        .expect("Invalid token configuration");

    let auth = AuthService::new(
        Arc::new(PgUserRepository::new(db_pool)),
        hasher,
        Arc::new(tokens),
        config.request_timeout,
    );
    let app = create_router(AppState {
        auth: Arc::new(auth),
        app_name: config.app_name.clone(),
    });

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("{} is running on http://{}", config.app_name, addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests;
