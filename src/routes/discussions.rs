use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    discussions::{aggregate, ConversationSummary},
    error::{AppError, AppResult},
    events::{ChangeEvent, Table},
    models::{Message, MessageOrigin, NewMessage},
    state::AppState,
    store::MessageStore,
};

#[derive(Deserialize)]
pub struct DiscussionQuery {
    pub q: Option<String>,
}

pub async fn list_discussions(
    State(state): State<AppState>,
    Query(query): Query<DiscussionQuery>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    state.board.reload(state.store.as_ref()).await?;
    let mut summaries = state.board.snapshot().await;
    if let Some(term) = query.q.as_deref() {
        summaries.retain(|summary| summary.matches(term));
    }
    Ok(Json(summaries))
}

pub async fn get_discussion(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<ConversationSummary>> {
    let rows = state.store.conversation_messages(&key).await?;
    aggregate(&rows)
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(AppError::not_found)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(state.store.conversation_messages(&key).await?))
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

pub async fn unread_total(State(state): State<AppState>) -> AppResult<Json<UnreadResponse>> {
    Ok(Json(UnreadResponse {
        unread: state.store.unread_total().await?,
    }))
}

#[derive(Deserialize)]
pub struct HandoffRequest {
    pub handoff: bool,
}

#[derive(Serialize)]
pub struct HandoffResponse {
    pub conversation_key: String,
    pub handoff: bool,
}

pub async fn get_handoff(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<HandoffResponse>> {
    let latest = state
        .store
        .latest_message(&key)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(HandoffResponse {
        conversation_key: key,
        handoff: latest.handoff,
    }))
}

/// Flips who answers the conversation. The board shows the new value right
/// away and goes back to the old one if the store write fails.
pub async fn set_handoff(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<HandoffRequest>,
) -> AppResult<Json<HandoffResponse>> {
    let ticket = state.board.begin_handoff(&key, payload.handoff).await;

    let outcome = state.store.set_handoff(&key, payload.handoff).await;
    let updated = match outcome {
        Ok(updated) if updated > 0 => updated,
        other => {
            if let Some(ticket) = &ticket {
                state.board.rollback(ticket).await;
            }
            return match other {
                Err(err) => {
                    warn!(conversation = %key, error = %err, "handoff update failed");
                    Err(err.into())
                }
                Ok(_) => Err(AppError::not_found()),
            };
        }
    };

    if let Some(ticket) = &ticket {
        state.board.settle(ticket).await;
    }
    info!(conversation = %key, handoff = payload.handoff, rows = updated, "handoff changed");
    state.events.publish(ChangeEvent::update(
        Table::Discussions,
        json!({ "conversation_key": key, "handoff": payload.handoff }),
    ));

    Ok(Json(HandoffResponse {
        conversation_key: key,
        handoff: payload.handoff,
    }))
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub body: String,
}

/// Sends a staff reply. Only allowed while staff hold the conversation; the
/// row is recorded after the gateway accepts the message.
pub async fn reply(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<ReplyRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("message body is required"));
    }

    let rows = state.store.conversation_messages(&key).await?;
    let (Some(first), Some(latest)) = (rows.first(), rows.last()) else {
        return Err(AppError::not_found());
    };
    if !latest.handoff {
        return Err(AppError::conflict(
            "the automated responder controls this conversation",
        ));
    }

    state.gateway.send_text(&key, body).await?;

    let message = state
        .store
        .insert_message(NewMessage {
            conversation_key: key.clone(),
            origin: MessageOrigin::Automated,
            body: body.to_string(),
            created_at: Utc::now(),
            customer_name: first.customer_name.clone(),
            read: true,
            handoff: latest.handoff,
        })
        .await?;

    info!(conversation = %key, message_id = message.id, "staff reply delivered");
    state
        .events
        .publish(ChangeEvent::insert(Table::Discussions, &message));
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<MarkReadResponse>> {
    let updated = state.store.mark_read(&key).await?;
    if updated > 0 {
        state.events.publish(ChangeEvent::update(
            Table::Discussions,
            json!({ "conversation_key": key, "read": true }),
        ));
    }
    Ok(Json(MarkReadResponse { updated }))
}

pub async fn delete_discussion(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<StatusCode> {
    let removed = state.store.delete_conversation(&key).await?;
    if removed == 0 {
        return Err(AppError::not_found());
    }
    info!(conversation = %key, rows = removed, "conversation deleted");
    state.events.publish(ChangeEvent::delete(
        Table::Discussions,
        json!({ "conversation_key": key }),
    ));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub conversation_key: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub origin: MessageOrigin,
    pub body: String,
}

/// Records a row coming from the customer channel or the automated
/// responder. Rows inherit the conversation's handoff flag, and the
/// responder may not write while staff hold the conversation.
pub async fn ingest_message(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let key = payload.conversation_key.trim();
    if key.is_empty() {
        return Err(AppError::bad_request("conversation_key is required"));
    }
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("message body is required"));
    }

    let latest = state.store.latest_message(key).await?;
    let handoff = latest.as_ref().is_some_and(|row| row.handoff);
    if payload.origin == MessageOrigin::Automated && handoff {
        return Err(AppError::conflict("staff control this conversation"));
    }

    let customer_name = payload
        .customer_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .or_else(|| latest.map(|row| row.customer_name))
        .unwrap_or_else(|| key.to_string());

    let message = state
        .store
        .insert_message(NewMessage {
            conversation_key: key.to_string(),
            origin: payload.origin,
            body: payload.body,
            created_at: Utc::now(),
            customer_name,
            read: payload.origin == MessageOrigin::Automated,
            handoff,
        })
        .await?;

    state
        .events
        .publish(ChangeEvent::insert(Table::Discussions, &message));
    Ok((StatusCode::CREATED, Json(message)))
}
