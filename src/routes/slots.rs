use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Slot, SlotStatus},
    scheduling,
    state::AppState,
    store::SlotStore,
};

#[derive(Deserialize)]
pub struct SlotQuery {
    pub status: Option<SlotStatus>,
}

#[derive(Deserialize)]
pub struct SlotRequest {
    pub datetime: DateTime<Utc>,
}

pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotQuery>,
) -> AppResult<Json<Vec<Slot>>> {
    let slots =
        scheduling::list_slots(state.store.as_ref(), &state.events, query.status, Utc::now())
            .await?;
    Ok(Json(slots))
}

pub async fn get_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
) -> AppResult<Json<Slot>> {
    Ok(Json(state.store.get_slot(slot_id).await?))
}

pub async fn create_slot(
    State(state): State<AppState>,
    Json(payload): Json<SlotRequest>,
) -> AppResult<(StatusCode, Json<Slot>)> {
    let slot =
        scheduling::create_slot(state.store.as_ref(), &state.events, payload.datetime, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn reschedule_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
    Json(payload): Json<SlotRequest>,
) -> AppResult<Json<Slot>> {
    let slot = scheduling::reschedule_slot(
        state.store.as_ref(),
        &state.events,
        slot_id,
        payload.datetime,
        Utc::now(),
    )
    .await?;
    Ok(Json(slot))
}

pub async fn delete_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    scheduling::delete_slot(state.store.as_ref(), &state.events, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
