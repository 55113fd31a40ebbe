use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::board::{ChangeOutcome, DiscussionBoard};
use crate::events::{ChangeHub, Table};
use crate::store::Store;

/// Keeps `board` in step with `discussions` changes until the hub closes.
pub fn spawn_board_watcher(
    board: DiscussionBoard,
    store: Arc<dyn Store>,
    hub: &ChangeHub,
) -> JoinHandle<()> {
    let events = hub.subscribe(Table::Discussions);
    tokio::spawn(async move {
        tokio::pin!(events);
        info!("discussion board watcher started");
        while let Some(event) = events.next().await {
            match board.apply_change(&event).await {
                ChangeOutcome::Patched => debug!("board patched from handoff change"),
                ChangeOutcome::Ignored => {}
                ChangeOutcome::ReloadNeeded => {
                    if let Err(err) = board.reload(store.as_ref()).await {
                        warn!(error = %err, "discussion reload failed; keeping previous snapshot");
                    }
                }
            }
        }
        info!("discussion board watcher stopped");
    })
}
