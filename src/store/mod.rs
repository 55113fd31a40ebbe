//! Row store accessor.
//!
//! One trait per table family, combined into [`Store`] so handlers can hold a
//! single `Arc<dyn Store>`. [`pg::PgStore`] backs production, while
//! [`memory::MemoryStore`] keeps everything in process for tests and demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentChanges, Message, NewAppointment, NewMessage, NewQuote, NewSlot,
    NewUser, ProfileChanges, Quote, QuoteChanges, QuoteStatus, Session, Slot, SlotStatus, User,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid stored value: {0}")]
    InvalidValue(String),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => StoreError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => StoreError::Conflict(info.message().to_string()),
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All rows of every conversation, ascending by creation time.
    async fn list_messages(&self) -> StoreResult<Vec<Message>>;

    async fn conversation_messages(&self, key: &str) -> StoreResult<Vec<Message>>;

    /// Most recent row of a conversation.
    async fn latest_message(&self, key: &str) -> StoreResult<Option<Message>>;

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message>;

    /// Sets the handoff flag on every row of the conversation in one update.
    async fn set_handoff(&self, key: &str, handoff: bool) -> StoreResult<usize>;

    /// Marks the conversation's unread `human` rows as read.
    async fn mark_read(&self, key: &str) -> StoreResult<usize>;

    async fn delete_conversation(&self, key: &str) -> StoreResult<usize>;

    async fn unread_total(&self) -> StoreResult<i64>;

    /// Returns `(read, total)` over `human` rows.
    async fn human_read_ratio(&self) -> StoreResult<(i64, i64)>;

    async fn recent_messages(&self, limit: i64) -> StoreResult<Vec<Message>>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn list_quotes(&self, status: Option<QuoteStatus>) -> StoreResult<Vec<Quote>>;

    async fn get_quote(&self, id: Uuid) -> StoreResult<Quote>;

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote>;

    async fn update_quote(&self, id: Uuid, changes: QuoteChanges) -> StoreResult<Quote>;

    async fn delete_quote(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots ascending by datetime.
    async fn list_slots(&self, status: Option<SlotStatus>) -> StoreResult<Vec<Slot>>;

    async fn get_slot(&self, id: Uuid) -> StoreResult<Slot>;

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot>;

    /// Moves the slot only while it is still `available`; returns affected rows.
    async fn reschedule_if_available(&self, id: Uuid, datetime: DateTime<Utc>)
        -> StoreResult<usize>;

    /// Deletes the slot only while it is still `available`; returns affected rows.
    async fn delete_if_available(&self, id: Uuid) -> StoreResult<usize>;

    /// Removes every `available` slot whose datetime is before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>>;

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Appointment>;

    /// Inserts the appointment and marks its slot booked as one operation.
    ///
    /// Fails with [`StoreError::Conflict`] when the slot is no longer
    /// `available`; neither half is applied in that case.
    async fn book(&self, appointment: NewAppointment) -> StoreResult<(Appointment, Slot)>;

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> StoreResult<Appointment>;

    /// Flips a `confirmed` appointment to `cancelled` and frees its slot.
    ///
    /// Fails with [`StoreError::Conflict`] when the appointment is already
    /// cancelled; its slot may belong to another booking by then.
    async fn cancel(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)>;

    /// Removes the appointment. The slot is freed only when the appointment
    /// was still `confirmed`, otherwise the returned slot is `None`.
    async fn delete_appointment(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)>;

    async fn recent_appointments(&self, limit: i64) -> StoreResult<Vec<Appointment>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn get_user(&self, id: Uuid) -> StoreResult<User>;

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<User>;

    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>)
        -> StoreResult<Session>;

    /// Session that is neither revoked nor expired at `now`.
    async fn active_session(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Session>>;

    async fn revoke_session(&self, id: Uuid) -> StoreResult<usize>;
}

pub trait Store: MessageStore + QuoteStore + SlotStore + AppointmentStore + UserStore {}

impl<T> Store for T where T: MessageStore + QuoteStore + SlotStore + AppointmentStore + UserStore {}
