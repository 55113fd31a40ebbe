use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    dashboard::{self, DashboardStats},
    error::AppResult,
    state::AppState,
};

pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    Ok(Json(dashboard::load(state.store.as_ref(), Utc::now()).await?))
}
