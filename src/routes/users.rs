use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, ProfileChanges, User, UserRole},
    state::AppState,
    store::UserStore,
    utils::json::classify_nullable,
};

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<User>> {
    let name = classify_nullable(body.get("name"))
        .and_then(|value| value.into_required_change("name"))
        .map_err(AppError::bad_request)?;
    let phone = classify_nullable(body.get("phone"))
        .map_err(AppError::bad_request)?
        .into_nullable_change();
    let avatar_url = classify_nullable(body.get("avatar_url"))
        .map_err(AppError::bad_request)?
        .into_nullable_change();

    if name.is_none() && phone.is_none() && avatar_url.is_none() {
        return Ok(Json(state.store.get_user(user.user_id).await?));
    }

    let updated = state
        .store
        .update_profile(
            user.user_id,
            ProfileChanges {
                name,
                phone,
                avatar_url,
            },
        )
        .await?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Admin-only: adds a staff account with the `agent` role.
pub async fn create_agent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateAgentRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    user.require_admin()?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    let password_hash =
        password::hash_password(&payload.password).map_err(|err| AppError::bad_request(err.to_string()))?;

    let created = state
        .store
        .insert_user(NewUser {
            id: Uuid::new_v4(),
            email,
            name: name.to_string(),
            role: UserRole::Agent,
            phone: payload
                .phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
            password_hash,
        })
        .await?;

    info!(created_by = %user.user_id, user_id = %created.id, "agent account created");
    Ok((StatusCode::CREATED, Json(created)))
}
