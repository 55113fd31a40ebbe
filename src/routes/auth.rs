use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::User,
    state::AppState,
    store::UserStore,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        return Err(AppError::unauthorized());
    }

    let expires_at = Utc::now() + ChronoDuration::days(state.config.session_expiry_days);
    let session = state.store.create_session(user.id, expires_at).await?;
    let access_token = state
        .jwt
        .generate_token(&user, &session)
        .map_err(AppError::from)?;

    info!(user_id = %user.id, session_id = %session.id, "user signed in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
        user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    state.store.revoke_session(user.session_id).await?;
    info!(user_id = %user.user_id, session_id = %user.session_id, "user signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// Profile behind the current session.
pub async fn session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<User>> {
    Ok(Json(state.store.get_user(user.user_id).await?))
}
