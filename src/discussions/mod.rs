//! Conversation summaries built from flat message rows.

pub mod board;
pub mod watcher;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Message, MessageOrigin};

pub use board::{DiscussionBoard, HandoffTicket};

/// One conversation as the console lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_key: String,
    /// Where replies are delivered. Conversations are keyed by the customer
    /// contact, so this always equals `conversation_key`.
    pub customer_contact: String,
    pub customer_name: String,
    pub messages: Vec<Message>,
    pub last_message: Message,
    pub unread_count: usize,
    pub handoff: bool,
}

impl ConversationSummary {
    fn open(row: &Message) -> Self {
        Self {
            conversation_key: row.conversation_key.clone(),
            customer_contact: row.conversation_key.clone(),
            customer_name: row.customer_name.clone(),
            messages: Vec::new(),
            last_message: row.clone(),
            unread_count: 0,
            handoff: row.handoff,
        }
    }

    fn absorb(&mut self, row: &Message) {
        if row.created_at > self.last_message.created_at {
            self.last_message = row.clone();
        }
        if row.origin == MessageOrigin::Human && !row.read {
            self.unread_count += 1;
        }
        self.handoff = row.handoff;
        self.messages.push(row.clone());
    }

    /// Case-insensitive match on customer name or contact.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.customer_name.to_lowercase().contains(&term)
            || self.customer_contact.to_lowercase().contains(&term)
    }
}

/// Groups message rows into one summary per conversation key.
///
/// `rows` must be the complete table in ascending creation order. The handoff
/// flag of each summary ends up as the value carried by the last row seen for
/// that key. Output is ordered by last-message timestamp, newest first, with
/// ties broken by conversation key.
pub fn aggregate(rows: &[Message]) -> Vec<ConversationSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<ConversationSummary> = Vec::new();

    for row in rows {
        let slot = *index
            .entry(row.conversation_key.as_str())
            .or_insert_with(|| {
                summaries.push(ConversationSummary::open(row));
                summaries.len() - 1
            });
        summaries[slot].absorb(row);
    }

    summaries.sort_by(compare_recency);
    summaries
}

fn compare_recency(a: &ConversationSummary, b: &ConversationSummary) -> Ordering {
    b.last_message
        .created_at
        .cmp(&a.last_message.created_at)
        .then_with(|| a.conversation_key.cmp(&b.conversation_key))
}

pub fn total_unread(summaries: &[ConversationSummary]) -> usize {
    summaries.iter().map(|summary| summary.unread_count).sum()
}
