use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, MessageResponse, PublicUser, RegisterRequest},
        extractors::AuthUser,
        services,
    },
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/api/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::register(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully!".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (user_id, display_name) =
        services::verify_credentials(state.users.as_ref(), &payload.email, &payload.password)
            .await?;

    let token = state.jwt.issue(user_id, &display_name, payload.remember)?;

    info!(user_id = %user_id, remember = payload.remember, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        display_name,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let Some(user) = state.users.find_by_id(session.id).await? else {
        warn!(user_id = %session.id, "token for unknown user");
        return Err(AppError::Unauthenticated("User not found".into()));
    };

    Ok(Json(PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
        created_at: user.created_at,
    }))
}
