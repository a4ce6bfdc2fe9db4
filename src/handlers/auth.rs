use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    auth::PasswordService,
    database::bounded,
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{AuthResponse, LoginRequest, MeResponse, NewUser, RegisterRequest, RegisterResponse, UserResponse},
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn invalid_request(rejection: JsonRejection) -> AppError {
    tracing::debug!("Rejected request body: {}", rejection);
    AppError::Validation("Invalid request format".to_string())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Invalid input or user already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let Json(request) = payload.map_err(invalid_request)?;

    PasswordService::validate_username(&request.username)?;
    PasswordService::validate_password_strength(&request.password)?;

    let timeout = state.config.store_timeout();
    if bounded(timeout, state.store.find_user_by_username(&request.username))
        .await?
        .is_some()
    {
        return Err(AppError::Validation("User already exists".to_string()));
    }

    let cost = state.config.bcrypt_cost;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || PasswordService::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let user = bounded(
        timeout,
        state.store.create_user(NewUser {
            username: request.username,
            password_hash,
            storage_limit: state.config.default_storage_limit,
        }),
    )
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user: UserResponse::from(user),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(request) = payload.map_err(invalid_request)?;

    let user = bounded(
        state.config.store_timeout(),
        state.store.find_user_by_username(&request.username),
    )
    .await?
    .ok_or_else(|| AppError::Auth(INVALID_CREDENTIALS.to_string()))?;

    let password = request.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || PasswordService::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    if !valid {
        tracing::warn!(username = %user.username, "Login failed");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
    }

    let token = state.jwt.generate_token(user.id, &user.username)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Token names a user that no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(auth: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserResponse::from(auth.user),
    })
}
