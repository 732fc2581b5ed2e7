// HTTP handlers for account endpoints

use crate::auth::{
    middleware::AuthenticatedUser,
    models::{
        LoginRequest, Plaintext, RefreshRequest, RegisterRequest, Registration, TokenPair, UserId,
        UserResponse,
    },
};
use crate::error::AppError;
use crate::validation::ValidatedJson;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Best-effort client address: proxy headers first, then the peer address
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Service banner body
#[derive(Debug, Serialize, ToSchema)]
pub struct Banner {
    #[schema(example = 200)]
    pub status: u16,
    #[schema(example = "account-api API v1")]
    pub message: String,
}

/// Service banner
/// GET /
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = Banner)),
    tag = "meta"
)]
pub async fn index_handler(State(state): State<AppState>) -> Json<Banner> {
    Json(Banner {
        status: StatusCode::OK.as_u16(),
        message: format!("{} API v1", state.app_name),
    })
}

/// Register a new user
/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = TokenPair),
        (status = 400, description = "Invalid input or identity already in use",
            body = crate::error::ClassifiedError,
            example = json!({
                "status": 400,
                "error": "DUPLICATE_IDENTITY",
                "data": {"message": "username or email already exists"}
            })),
        (status = 408, description = "Operation exceeded its time budget",
            body = crate::error::ClassifiedError),
        (status = 500, description = "Internal server error", body = crate::error::ClassifiedError)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPair>), AppError> {
    let register_ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    debug!("Register request: {:?} from {:?}", request, register_ip);

    let registration = Registration {
        name: request.name,
        email: request.email,
        password: Plaintext::new(request.password),
        register_ip,
    };
    let tokens = state.auth.register(registration).await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Log in with user name or email
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenPair),
        (status = 400, description = "Invalid input", body = crate::error::ClassifiedError),
        (status = 401, description = "Wrong credentials", body = crate::error::ClassifiedError)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = state
        .auth
        .login(&request.login, Plaintext::new(request.password))
        .await?;
    Ok(Json(tokens))
}

/// Exchange a refresh token for a new pair
/// POST /api/v1/auth/refresh
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Invalid or expired refresh token",
            body = crate::error::ClassifiedError)
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(tokens))
}

/// Profile of the token holder
/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid access token",
            body = crate::error::ClassifiedError),
        (status = 404, description = "Token subject no longer exists",
            body = crate::error::ClassifiedError)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.auth.profile(user.user_id).await?))
}

/// Look up a user by id
/// GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Malformed user id", body = crate::error::ClassifiedError),
        (status = 401, description = "Missing or invalid access token",
            body = crate::error::ClassifiedError),
        (status = 404, description = "User not found", body = crate::error::ClassifiedError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id: UserId = raw_id.parse()?;
    info!("User id={} looked up user id={}", caller.user_id, id);
    Ok(Json(state.auth.profile(id).await?))
}
