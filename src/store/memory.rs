use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AppointmentStore, MessageStore, QuoteStore, SlotStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, Message, MessageOrigin, NewAppointment,
    NewMessage, NewQuote, NewSlot, NewUser, ProfileChanges, Quote, QuoteChanges, QuoteStatus,
    Session, Slot, SlotStatus, User,
};

#[derive(Default)]
struct Tables {
    next_message_id: i64,
    messages: Vec<Message>,
    quotes: Vec<Quote>,
    slots: Vec<Slot>,
    appointments: Vec<Appointment>,
    users: Vec<User>,
    sessions: Vec<Session>,
}

impl Tables {
    fn slot_mut(&mut self, id: Uuid) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    fn with_schedule(&self, mut appointment: Appointment) -> Appointment {
        appointment.scheduled_for = self
            .slots
            .iter()
            .find(|slot| slot.id == appointment.slot_id)
            .map(|slot| slot.datetime);
        appointment
    }

    fn release_slot(&mut self, slot_id: Uuid) -> Option<Slot> {
        let slot = self.slot_mut(slot_id)?;
        slot.status = SlotStatus::Available;
        slot.customer_name = None;
        slot.customer_phone = None;
        Some(slot.clone())
    }
}

/// Process-local store. Every operation runs under a single lock, which makes
/// the two-table booking operations atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_created_desc<T: Clone>(rows: &[T], created: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows = rows.to_vec();
    rows.sort_by_key(|row| std::cmp::Reverse(created(row)));
    rows
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        let mut rows = tables.messages.clone();
        rows.sort_by_key(|row| (row.created_at, row.id));
        Ok(rows)
    }

    async fn conversation_messages(&self, key: &str) -> StoreResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Message> = tables
            .messages
            .iter()
            .filter(|row| row.conversation_key == key)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.created_at, row.id));
        Ok(rows)
    }

    async fn latest_message(&self, key: &str) -> StoreResult<Option<Message>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|row| row.conversation_key == key)
            .max_by_key(|row| (row.created_at, row.id))
            .cloned())
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        let mut tables = self.tables.lock().await;
        tables.next_message_id += 1;
        let row = Message {
            id: tables.next_message_id,
            conversation_key: message.conversation_key,
            origin: message.origin,
            body: message.body,
            created_at: message.created_at,
            customer_name: message.customer_name,
            read: message.read,
            handoff: message.handoff,
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn set_handoff(&self, key: &str, handoff: bool) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let mut updated = 0;
        for row in tables
            .messages
            .iter_mut()
            .filter(|row| row.conversation_key == key)
        {
            row.handoff = handoff;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_read(&self, key: &str) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let mut updated = 0;
        for row in tables.messages.iter_mut().filter(|row| {
            row.conversation_key == key && row.origin == MessageOrigin::Human && !row.read
        }) {
            row.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_conversation(&self, key: &str) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.messages.len();
        tables.messages.retain(|row| row.conversation_key != key);
        Ok(before - tables.messages.len())
    }

    async fn unread_total(&self) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|row| row.origin == MessageOrigin::Human && !row.read)
            .count() as i64)
    }

    async fn human_read_ratio(&self) -> StoreResult<(i64, i64)> {
        let tables = self.tables.lock().await;
        let human = tables
            .messages
            .iter()
            .filter(|row| row.origin == MessageOrigin::Human);
        let (read, total) = human.fold((0, 0), |(read, total), row| {
            (read + i64::from(row.read), total + 1)
        });
        Ok((read, total))
    }

    async fn recent_messages(&self, limit: i64) -> StoreResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        let mut rows = sorted_by_created_desc(&tables.messages, |row| row.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    async fn list_quotes(&self, status: Option<QuoteStatus>) -> StoreResult<Vec<Quote>> {
        let tables = self.tables.lock().await;
        let mut rows = sorted_by_created_desc(&tables.quotes, |quote| quote.created_at);
        if let Some(status) = status {
            rows.retain(|quote| quote.status == status);
        }
        Ok(rows)
    }

    async fn get_quote(&self, id: Uuid) -> StoreResult<Quote> {
        let tables = self.tables.lock().await;
        tables
            .quotes
            .iter()
            .find(|quote| quote.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let row = Quote {
            id: quote.id,
            customer_name: quote.customer_name,
            phone_number: quote.phone_number,
            email: quote.email,
            amount: quote.amount,
            details: quote.details,
            status: quote.status,
            created_at: now,
            updated_at: now,
        };
        tables.quotes.push(row.clone());
        Ok(row)
    }

    async fn update_quote(&self, id: Uuid, changes: QuoteChanges) -> StoreResult<Quote> {
        let mut tables = self.tables.lock().await;
        let quote = tables
            .quotes
            .iter_mut()
            .find(|quote| quote.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(value) = changes.customer_name {
            quote.customer_name = value;
        }
        if let Some(value) = changes.phone_number {
            quote.phone_number = value;
        }
        if let Some(value) = changes.email {
            quote.email = value;
        }
        if let Some(value) = changes.amount {
            quote.amount = value;
        }
        if let Some(value) = changes.details {
            quote.details = value;
        }
        if let Some(value) = changes.status {
            quote.status = value;
        }
        quote.updated_at = Utc::now();
        Ok(quote.clone())
    }

    async fn delete_quote(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.quotes.len();
        tables.quotes.retain(|quote| quote.id != id);
        if tables.quotes.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn list_slots(&self, status: Option<SlotStatus>) -> StoreResult<Vec<Slot>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Slot> = tables
            .slots
            .iter()
            .filter(|slot| status.map_or(true, |wanted| slot.status == wanted))
            .cloned()
            .collect();
        rows.sort_by_key(|slot| slot.datetime);
        Ok(rows)
    }

    async fn get_slot(&self, id: Uuid) -> StoreResult<Slot> {
        let tables = self.tables.lock().await;
        tables
            .slots
            .iter()
            .find(|slot| slot.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot> {
        let mut tables = self.tables.lock().await;
        let row = Slot {
            id: slot.id,
            datetime: slot.datetime,
            status: SlotStatus::Available,
            customer_name: None,
            customer_phone: None,
            created_at: Utc::now(),
        };
        tables.slots.push(row.clone());
        Ok(row)
    }

    async fn reschedule_if_available(
        &self,
        id: Uuid,
        datetime: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        match tables.slot_mut(id) {
            Some(slot) if slot.status == SlotStatus::Available => {
                slot.datetime = datetime;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_if_available(&self, id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.slots.len();
        tables
            .slots
            .retain(|slot| !(slot.id == id && slot.status == SlotStatus::Available));
        Ok(before - tables.slots.len())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut tables = self.tables.lock().await;
        let expired: Vec<Uuid> = tables
            .slots
            .iter()
            .filter(|slot| slot.is_expired(now))
            .map(|slot| slot.id)
            .collect();
        tables.slots.retain(|slot| !expired.contains(&slot.id));
        Ok(expired)
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        Ok(
            sorted_by_created_desc(&tables.appointments, |row| row.created_at)
                .into_iter()
                .map(|row| tables.with_schedule(row))
                .collect(),
        )
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Appointment> {
        let tables = self.tables.lock().await;
        let row = tables
            .appointments
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok(tables.with_schedule(row))
    }

    async fn book(&self, appointment: NewAppointment) -> StoreResult<(Appointment, Slot)> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .slot_mut(appointment.slot_id)
            .ok_or(StoreError::NotFound)?;
        if slot.status != SlotStatus::Available {
            return Err(StoreError::Conflict("slot is no longer available".into()));
        }
        slot.status = SlotStatus::Booked;
        slot.customer_name = Some(appointment.name.clone());
        slot.customer_phone = Some(appointment.phone.clone());
        let slot = slot.clone();

        let row = Appointment {
            id: appointment.id,
            slot_id: appointment.slot_id,
            name: appointment.name,
            phone: appointment.phone,
            email: appointment.email,
            brand: appointment.brand,
            model: appointment.model,
            year: appointment.year,
            service: appointment.service,
            fuel: appointment.fuel,
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
            scheduled_for: Some(slot.datetime),
        };
        tables.appointments.push(row.clone());
        Ok((row, slot))
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> StoreResult<Appointment> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .appointments
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(value) = changes.name {
            row.name = value;
        }
        if let Some(value) = changes.phone {
            row.phone = value;
        }
        if let Some(value) = changes.email {
            row.email = value;
        }
        if let Some(value) = changes.brand {
            row.brand = value;
        }
        if let Some(value) = changes.model {
            row.model = value;
        }
        if let Some(value) = changes.year {
            row.year = value;
        }
        if let Some(value) = changes.service {
            row.service = value;
        }
        if let Some(value) = changes.fuel {
            row.fuel = value;
        }
        let row = row.clone();
        Ok(tables.with_schedule(row))
    }

    async fn cancel(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .appointments
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound)?;
        if row.status != AppointmentStatus::Confirmed {
            return Err(StoreError::Conflict("appointment is already cancelled".into()));
        }
        row.status = AppointmentStatus::Cancelled;
        let row = row.clone();
        let slot = tables.release_slot(row.slot_id);
        Ok((tables.with_schedule(row), slot))
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        let mut tables = self.tables.lock().await;
        let index = tables
            .appointments
            .iter()
            .position(|row| row.id == id)
            .ok_or(StoreError::NotFound)?;
        let row = tables.appointments.remove(index);
        let slot = match row.status {
            AppointmentStatus::Confirmed => tables.release_slot(row.slot_id),
            AppointmentStatus::Cancelled => None,
        };
        Ok((tables.with_schedule(row), slot))
    }

    async fn recent_appointments(&self, limit: i64) -> StoreResult<Vec<Appointment>> {
        let mut rows = self.list_appointments().await?;
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        tables
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        let now = Utc::now();
        let row = User {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            phone: user.phone,
            avatar_url: None,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(phone) = changes.phone {
            user.phone = phone;
        }
        if let Some(avatar_url) = changes.avatar_url {
            user.avatar_url = avatar_url;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.lock().await;
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            issued_at: Utc::now(),
            expires_at,
            revoked_at: None,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn active_session(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| {
                session.id == id && session.revoked_at.is_none() && session.expires_at > now
            })
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut revoked = 0;
        for session in tables
            .sessions
            .iter_mut()
            .filter(|session| session.id == id && session.revoked_at.is_none())
        {
            session.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}
