use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{aggregate, ConversationSummary};
use crate::events::{ChangeEvent, ChangeOp, Table};
use crate::store::{MessageStore, StoreResult};

/// Tentative handoff change applied to the board before the store confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTicket {
    pub correlation_id: Uuid,
    pub conversation_key: String,
    pub previous: bool,
}

/// What [`DiscussionBoard::apply_change`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Patched,
    ReloadNeeded,
    Ignored,
}

#[derive(Default)]
struct BoardState {
    summaries: Vec<ConversationSummary>,
    pending: HashMap<String, Uuid>,
}

impl BoardState {
    fn summary_mut(&mut self, key: &str) -> Option<&mut ConversationSummary> {
        self.summaries
            .iter_mut()
            .find(|summary| summary.conversation_key == key)
    }

    fn set_handoff(&mut self, key: &str, handoff: bool) -> Option<bool> {
        let summary = self.summary_mut(key)?;
        let previous = summary.handoff;
        summary.handoff = handoff;
        for message in &mut summary.messages {
            message.handoff = handoff;
        }
        summary.last_message.handoff = handoff;
        Some(previous)
    }
}

/// Owner of the current conversation list.
///
/// Readers get clones; only [`reload`](Self::reload), event patches and the
/// handoff ticket operations mutate it. A reload and a targeted patch are not
/// sequenced against each other, so whichever finishes last wins.
#[derive(Clone, Default)]
pub struct DiscussionBoard {
    inner: Arc<RwLock<BoardState>>,
}

impl DiscussionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<ConversationSummary> {
        self.inner.read().await.summaries.clone()
    }

    pub async fn get(&self, key: &str) -> Option<ConversationSummary> {
        self.inner
            .read()
            .await
            .summaries
            .iter()
            .find(|summary| summary.conversation_key == key)
            .cloned()
    }

    /// Reads every message row and replaces the snapshot. On a store error
    /// the previous snapshot stays in place.
    pub async fn reload<S>(&self, store: &S) -> StoreResult<usize>
    where
        S: MessageStore + ?Sized,
    {
        let rows = store.list_messages().await?;
        let summaries = aggregate(&rows);
        let count = summaries.len();
        self.inner.write().await.summaries = summaries;
        debug!(conversations = count, "discussion board reloaded");
        Ok(count)
    }

    /// Patches the snapshot from a `discussions` change when the event only
    /// carries a handoff flip; anything else needs a full reload.
    pub async fn apply_change(&self, event: &ChangeEvent) -> ChangeOutcome {
        if event.table != Table::Discussions {
            return ChangeOutcome::Ignored;
        }
        if event.op != ChangeOp::Update {
            return ChangeOutcome::ReloadNeeded;
        }

        let Some((key, handoff)) = event.new.as_ref().and_then(handoff_patch) else {
            return ChangeOutcome::ReloadNeeded;
        };

        let mut state = self.inner.write().await;
        match state.set_handoff(&key, handoff) {
            Some(_) => ChangeOutcome::Patched,
            None => ChangeOutcome::ReloadNeeded,
        }
    }

    /// Applies `handoff` locally and returns the ticket needed to undo it.
    /// `None` when the conversation is not on the board.
    pub async fn begin_handoff(&self, key: &str, handoff: bool) -> Option<HandoffTicket> {
        let mut state = self.inner.write().await;
        let previous = state.set_handoff(key, handoff)?;
        let correlation_id = Uuid::new_v4();
        state.pending.insert(key.to_string(), correlation_id);
        Some(HandoffTicket {
            correlation_id,
            conversation_key: key.to_string(),
            previous,
        })
    }

    /// Confirms a tentative change.
    pub async fn settle(&self, ticket: &HandoffTicket) {
        let mut state = self.inner.write().await;
        if state.pending.get(&ticket.conversation_key) == Some(&ticket.correlation_id) {
            state.pending.remove(&ticket.conversation_key);
        }
    }

    /// Restores the previous value unless a newer change to the same
    /// conversation superseded this ticket. Returns whether it restored.
    pub async fn rollback(&self, ticket: &HandoffTicket) -> bool {
        let mut state = self.inner.write().await;
        if state.pending.get(&ticket.conversation_key) != Some(&ticket.correlation_id) {
            return false;
        }
        state.pending.remove(&ticket.conversation_key);
        state
            .set_handoff(&ticket.conversation_key, ticket.previous)
            .is_some()
    }
}

fn handoff_patch(row: &Value) -> Option<(String, bool)> {
    let key = row.get("conversation_key")?.as_str()?;
    let handoff = row.get("handoff")?.as_bool()?;
    if row.get("read").is_some() || row.get("body").is_some() {
        return None;
    }
    Some((key.to_string(), handoff))
}
