use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Quote, QuoteChanges, QuoteStatus},
    quotes::{self, QuoteRequest},
    state::AppState,
    store::QuoteStore,
    utils::json::classify_nullable,
};

#[derive(Deserialize)]
pub struct QuoteQuery {
    pub status: Option<QuoteStatus>,
}

pub async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<Vec<Quote>>> {
    Ok(Json(state.store.list_quotes(query.status).await?))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<Quote>> {
    Ok(Json(state.store.get_quote(quote_id).await?))
}

pub async fn create_quote(
    State(state): State<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<(StatusCode, Json<Quote>)> {
    let quote = quotes::create_quote(state.store.as_ref(), &state.events, payload).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn update_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Quote>> {
    let required = |field: &str| {
        classify_nullable(body.get(field))
            .and_then(|value| value.into_required_change(field))
            .map_err(AppError::bad_request)
    };
    let customer_name = required("customer_name")?;
    let phone_number = required("phone_number")?;
    let details = classify_nullable(body.get("details"))
        .map_err(AppError::bad_request)?
        .into_nullable_change()
        .map(Option::unwrap_or_default);
    let email = classify_nullable(body.get("email"))
        .map_err(AppError::bad_request)?
        .into_nullable_change();
    let amount = match body.get("amount") {
        None => None,
        Some(value) => Some(
            value
                .as_f64()
                .ok_or_else(|| AppError::bad_request("amount must be a number"))?,
        ),
    };
    let status = match body.get("status") {
        None => None,
        Some(value) => Some(serde_json::from_value::<QuoteStatus>(value.clone()).map_err(
            |_| AppError::bad_request("status must be pending, accepted or rejected"),
        )?),
    };

    let changes = QuoteChanges {
        customer_name,
        phone_number,
        email,
        amount,
        details,
        status,
    };
    let quote = quotes::update_quote(state.store.as_ref(), &state.events, quote_id, changes).await?;
    Ok(Json(quote))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: QuoteStatus,
}

pub async fn set_quote_status(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<Quote>> {
    let quote =
        quotes::set_status(state.store.as_ref(), &state.events, quote_id, payload.status).await?;
    Ok(Json(quote))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    quotes::delete_quote(state.store.as_ref(), &state.events, quote_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
