//! Table change notifications.
//!
//! Every write that goes through the API publishes a [`ChangeEvent`] on the
//! [`ChangeHub`]. Subscribers pick the table they care about and receive a
//! stream of `{op, new, old}` records, the same shape a row-level realtime
//! feed would deliver.

use std::fmt;
use std::str::FromStr;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Discussions,
    Quotes,
    Appointments,
    AvailableSlots,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Discussions => "discussions",
            Table::Quotes => "quotes",
            Table::Appointments => "appointments",
            Table::AvailableSlots => "available_slots",
        }
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "discussions" => Ok(Table::Discussions),
            "quotes" => Ok(Table::Quotes),
            "appointments" => Ok(Table::Appointments),
            "available_slots" => Ok(Table::AvailableSlots),
            other => Err(format!("unknown table: {other}")),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(table: Table, new: impl Serialize) -> Self {
        Self {
            table,
            op: ChangeOp::Insert,
            new: to_value(new),
            old: None,
        }
    }

    pub fn update(table: Table, new: impl Serialize) -> Self {
        Self {
            table,
            op: ChangeOp::Update,
            new: to_value(new),
            old: None,
        }
    }

    pub fn delete(table: Table, old: impl Serialize) -> Self {
        Self {
            table,
            op: ChangeOp::Delete,
            new: None,
            old: to_value(old),
        }
    }
}

fn to_value(row: impl Serialize) -> Option<Value> {
    match serde_json::to_value(row) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "failed to serialize change event row");
            None
        }
    }
}

#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget: having no subscriber is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        debug!(table = %event.table, op = ?event.op, "publishing change event");
        let _ = self.sender.send(event);
    }

    /// Events of a single table. A subscriber that falls behind skips the
    /// events it missed and keeps going.
    pub fn subscribe(&self, table: Table) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.table == table => yield event,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%table, skipped, "change subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
