use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Appointment,
    scheduling::{self, AppointmentEdit, BookingRequest},
    state::AppState,
    store::AppointmentStore,
    utils::json::classify_nullable,
};

pub async fn list_appointments(State(state): State<AppState>) -> AppResult<Json<Vec<Appointment>>> {
    Ok(Json(state.store.list_appointments().await?))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> AppResult<Json<Appointment>> {
    Ok(Json(state.store.get_appointment(appointment_id).await?))
}

pub async fn book_appointment(
    State(state): State<AppState>,
    Json(payload): Json<BookingRequest>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    let appointment =
        scheduling::book_appointment(state.store.as_ref(), &state.events, payload).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Appointment>> {
    if body.get("slot_id").is_some() {
        return Err(AppError::bad_request(
            "the slot of an appointment cannot be changed; cancel and book again",
        ));
    }
    let email = classify_nullable(body.get("email"))
        .map_err(AppError::bad_request)?
        .into_nullable_change();
    let edit: AppointmentEdit = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request(format!("invalid appointment fields: {err}")))?;

    let appointment = scheduling::update_appointment(
        state.store.as_ref(),
        &state.events,
        appointment_id,
        edit,
        email,
    )
    .await?;
    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> AppResult<Json<Appointment>> {
    let appointment =
        scheduling::cancel_appointment(state.store.as_ref(), &state.events, appointment_id)
            .await?;
    Ok(Json(appointment))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    scheduling::delete_appointment(state.store.as_ref(), &state.events, appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
