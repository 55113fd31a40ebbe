use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    events::{ChangeOp, Table},
    state::AppState,
};

/// Server-sent feed of one table's changes. Each event is named after the
/// operation and carries the JSON change record.
pub async fn stream_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let table: Table = table.parse().map_err(|_| AppError::not_found())?;

    let stream = state.events.subscribe(table).filter_map(|change| async move {
        let event_name = match change.op {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        };
        match Event::default().event(event_name).json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!(error = %err, "dropping change event that failed to encode");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
