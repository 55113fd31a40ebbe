//! Slot inventory and appointment booking rules.
//!
//! Handlers call into these functions so the rules hold no matter which
//! route triggers them. Every successful write publishes a change event.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{ChangeEvent, ChangeHub, Table};
use crate::models::{Appointment, AppointmentChanges, NewAppointment, NewSlot, Slot, SlotStatus};
use crate::store::{AppointmentStore, SlotStore, Store};

const MIN_VEHICLE_YEAR: i32 = 1900;
const MAX_VEHICLE_YEAR: i32 = 2100;

pub async fn create_slot(
    store: &dyn Store,
    events: &ChangeHub,
    datetime: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<Slot> {
    ensure_not_past(datetime, now)?;
    let slot = store
        .insert_slot(NewSlot {
            id: Uuid::new_v4(),
            datetime,
        })
        .await?;
    info!(slot_id = %slot.id, datetime = %slot.datetime, "slot created");
    events.publish(ChangeEvent::insert(Table::AvailableSlots, &slot));
    Ok(slot)
}

/// Deletes past-dated `available` slots. Failures are logged and swallowed so
/// a broken sweep never blocks a list load.
pub async fn sweep_expired_slots(
    store: &dyn Store,
    events: &ChangeHub,
    now: DateTime<Utc>,
) -> usize {
    match store.delete_expired(now).await {
        Ok(removed) => {
            if !removed.is_empty() {
                info!(count = removed.len(), "expired slots removed");
            }
            for id in &removed {
                events.publish(ChangeEvent::delete(Table::AvailableSlots, json!({ "id": id })));
            }
            removed.len()
        }
        Err(err) => {
            warn!(error = %err, "expired slot sweep failed");
            0
        }
    }
}

/// Sweeps expired slots, then lists what remains, ascending by datetime.
pub async fn list_slots(
    store: &dyn Store,
    events: &ChangeHub,
    status: Option<SlotStatus>,
    now: DateTime<Utc>,
) -> AppResult<Vec<Slot>> {
    sweep_expired_slots(store, events, now).await;
    Ok(store.list_slots(status).await?)
}

pub async fn reschedule_slot(
    store: &dyn Store,
    events: &ChangeHub,
    id: Uuid,
    datetime: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<Slot> {
    ensure_not_past(datetime, now)?;
    ensure_available(store, id, "booked slots cannot be rescheduled").await?;

    if store.reschedule_if_available(id, datetime).await? == 0 {
        return Err(AppError::conflict("slot was booked before the change applied"));
    }

    let slot = store.get_slot(id).await?;
    info!(slot_id = %id, datetime = %slot.datetime, "slot rescheduled");
    events.publish(ChangeEvent::update(Table::AvailableSlots, &slot));
    Ok(slot)
}

pub async fn delete_slot(store: &dyn Store, events: &ChangeHub, id: Uuid) -> AppResult<()> {
    let slot = ensure_available(store, id, "booked slots cannot be deleted").await?;

    if store.delete_if_available(id).await? == 0 {
        return Err(AppError::conflict("slot was booked before the change applied"));
    }

    info!(slot_id = %id, "slot deleted");
    events.publish(ChangeEvent::delete(Table::AvailableSlots, &slot));
    Ok(())
}

async fn ensure_available(store: &dyn Store, id: Uuid, message: &str) -> AppResult<Slot> {
    let slot = store.get_slot(id).await?;
    if slot.status != SlotStatus::Available {
        return Err(AppError::conflict(message));
    }
    Ok(slot)
}

fn ensure_not_past(datetime: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if datetime < now {
        return Err(AppError::bad_request("slot datetime must not be in the past"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub slot_id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub service: String,
    pub fuel: String,
}

impl BookingRequest {
    fn validate(self) -> AppResult<NewAppointment> {
        let name = required("name", &self.name)?;
        let phone = required("phone", &self.phone)?;
        let brand = required("brand", &self.brand)?;
        let model = required("model", &self.model)?;
        let service = required("service", &self.service)?;
        let fuel = required("fuel", &self.fuel)?;
        validate_year(self.year)?;
        let email = self
            .email
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(NewAppointment {
            id: Uuid::new_v4(),
            slot_id: self.slot_id,
            name,
            phone,
            email,
            brand,
            model,
            year: self.year,
            service,
            fuel,
        })
    }
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_year(year: i32) -> AppResult<()> {
    if !(MIN_VEHICLE_YEAR..=MAX_VEHICLE_YEAR).contains(&year) {
        return Err(AppError::bad_request("year is out of range"));
    }
    Ok(())
}

/// Books `request.slot_id`: the appointment row and the slot status change
/// land together or not at all.
pub async fn book_appointment(
    store: &dyn Store,
    events: &ChangeHub,
    request: BookingRequest,
) -> AppResult<Appointment> {
    let new_appointment = request.validate()?;
    let (appointment, slot) = store.book(new_appointment).await?;
    info!(appointment_id = %appointment.id, slot_id = %slot.id, "appointment booked");
    events.publish(ChangeEvent::insert(Table::Appointments, &appointment));
    events.publish(ChangeEvent::update(Table::AvailableSlots, &slot));
    Ok(appointment)
}

pub async fn cancel_appointment(
    store: &dyn Store,
    events: &ChangeHub,
    id: Uuid,
) -> AppResult<Appointment> {
    let (appointment, slot) = store.cancel(id).await?;
    info!(appointment_id = %id, "appointment cancelled");
    events.publish(ChangeEvent::update(Table::Appointments, &appointment));
    publish_released(events, appointment.slot_id, slot);
    Ok(appointment)
}

pub async fn delete_appointment(store: &dyn Store, events: &ChangeHub, id: Uuid) -> AppResult<()> {
    let (appointment, slot) = store.delete_appointment(id).await?;
    info!(appointment_id = %id, "appointment deleted");
    events.publish(ChangeEvent::delete(Table::Appointments, &appointment));
    publish_released(events, appointment.slot_id, slot);
    Ok(())
}

fn publish_released(events: &ChangeHub, slot_id: Uuid, slot: Option<Slot>) {
    match slot {
        Some(slot) => events.publish(ChangeEvent::update(Table::AvailableSlots, &slot)),
        None => info!(%slot_id, "appointment held no slot; nothing to release"),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentEdit {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub service: Option<String>,
    pub fuel: Option<String>,
}

/// Edits customer, vehicle and service details. The slot never changes here.
pub async fn update_appointment(
    store: &dyn Store,
    events: &ChangeHub,
    id: Uuid,
    edit: AppointmentEdit,
    email: Option<Option<String>>,
) -> AppResult<Appointment> {
    let optional = |field: &str, value: Option<String>| -> AppResult<Option<String>> {
        value.map(|value| required(field, &value)).transpose()
    };
    if let Some(year) = edit.year {
        validate_year(year)?;
    }
    let changes = AppointmentChanges {
        name: optional("name", edit.name)?,
        phone: optional("phone", edit.phone)?,
        email,
        brand: optional("brand", edit.brand)?,
        model: optional("model", edit.model)?,
        year: edit.year,
        service: optional("service", edit.service)?,
        fuel: optional("fuel", edit.fuel)?,
    };

    let appointment = store.update_appointment(id, changes).await?;
    events.publish(ChangeEvent::update(Table::Appointments, &appointment));
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::store::MemoryStore;
    use axum::http::StatusCode;
    use chrono::Duration;

    fn booking(slot_id: Uuid) -> BookingRequest {
        BookingRequest {
            slot_id,
            name: "Lucia Romero".into(),
            phone: "+34600111222".into(),
            email: Some("lucia@example.com".into()),
            brand: "Seat".into(),
            model: "Ibiza".into(),
            year: 2019,
            service: "oil change".into(),
            fuel: "petrol".into(),
        }
    }

    async fn future_slot(store: &MemoryStore, events: &ChangeHub) -> Slot {
        let now = Utc::now();
        create_slot(store, events, now + Duration::days(2), now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn past_slots_are_rejected_on_create() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let err = create_slot(&store, &ChangeHub::default(), now - Duration::hours(1), now)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_sweeps_expired_available_slots() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let now = Utc::now();
        let stale = store
            .insert_slot(NewSlot {
                id: Uuid::new_v4(),
                datetime: now - Duration::hours(3),
            })
            .await
            .unwrap();
        let upcoming = future_slot(&store, &events).await;

        let slots = list_slots(&store, &events, None, now).await.unwrap();

        assert!(slots.iter().all(|slot| slot.id != stale.id));
        assert!(slots.iter().any(|slot| slot.id == upcoming.id));
    }

    #[tokio::test]
    async fn booking_then_cancelling_restores_the_slot() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;

        let appointment = book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap();
        let booked = store.get_slot(slot.id).await.unwrap();
        assert_eq!(booked.status, SlotStatus::Booked);
        assert_eq!(booked.customer_name.as_deref(), Some("Lucia Romero"));

        let cancelled = cancel_appointment(&store, &events, appointment.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let released = store.get_slot(slot.id).await.unwrap();
        assert_eq!(released.status, SlotStatus::Available);
        assert_eq!(released.customer_name, None);
        assert_eq!(released.customer_phone, None);
    }

    #[tokio::test]
    async fn booked_slots_cannot_be_edited_or_deleted() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;
        book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap();
        let before = store.get_slot(slot.id).await.unwrap();

        let now = Utc::now();
        let err = reschedule_slot(&store, &events, slot.id, now + Duration::days(5), now)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = delete_slot(&store, &events, slot.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        assert_eq!(store.get_slot(slot.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn second_booking_of_a_slot_conflicts() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;
        book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap();

        let err = book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deleting_an_appointment_frees_its_slot() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;
        let appointment = book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap();

        delete_appointment(&store, &events, appointment.id)
            .await
            .unwrap();

        assert_eq!(
            store.get_slot(slot.id).await.unwrap().status,
            SlotStatus::Available
        );
    }

    async fn rebooked_after_cancel(store: &MemoryStore, events: &ChangeHub) -> (Uuid, Slot) {
        let slot = future_slot(store, events).await;
        let first = book_appointment(store, events, booking(slot.id))
            .await
            .unwrap();
        cancel_appointment(store, events, first.id).await.unwrap();
        let second = BookingRequest {
            name: "Pedro Alvarez".into(),
            phone: "+34600999888".into(),
            ..booking(slot.id)
        };
        book_appointment(store, events, second).await.unwrap();
        (first.id, slot)
    }

    #[tokio::test]
    async fn cancelling_twice_keeps_the_new_booking() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let (stale_id, slot) = rebooked_after_cancel(&store, &events).await;

        let err = cancel_appointment(&store, &events, stale_id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let held = store.get_slot(slot.id).await.unwrap();
        assert_eq!(held.status, SlotStatus::Booked);
        assert_eq!(held.customer_name.as_deref(), Some("Pedro Alvarez"));
    }

    #[tokio::test]
    async fn deleting_a_cancelled_appointment_keeps_the_new_booking() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let (stale_id, slot) = rebooked_after_cancel(&store, &events).await;

        delete_appointment(&store, &events, stale_id).await.unwrap();

        let held = store.get_slot(slot.id).await.unwrap();
        assert_eq!(held.status, SlotStatus::Booked);
        assert_eq!(held.customer_phone.as_deref(), Some("+34600999888"));
        assert!(store.get_appointment(stale_id).await.is_err());
    }

    #[tokio::test]
    async fn cancelling_an_unknown_appointment_is_not_found() {
        let store = MemoryStore::new();
        let err = cancel_appointment(&store, &ChangeHub::default(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn editing_details_keeps_the_slot() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;
        let appointment = book_appointment(&store, &events, booking(slot.id))
            .await
            .unwrap();

        let edit = AppointmentEdit {
            model: Some("Leon".into()),
            year: Some(2021),
            ..AppointmentEdit::default()
        };
        let updated = update_appointment(&store, &events, appointment.id, edit, Some(None))
            .await
            .unwrap();

        assert_eq!(updated.model, "Leon");
        assert_eq!(updated.year, 2021);
        assert_eq!(updated.email, None);
        assert_eq!(updated.slot_id, slot.id);
    }

    #[tokio::test]
    async fn blank_required_fields_are_rejected() {
        let store = MemoryStore::new();
        let events = ChangeHub::default();
        let slot = future_slot(&store, &events).await;
        let mut request = booking(slot.id);
        request.phone = "   ".into();

        let err = book_appointment(&store, &events, request).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            store.get_slot(slot.id).await.unwrap().status,
            SlotStatus::Available
        );
    }
}
