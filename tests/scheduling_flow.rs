mod common;

use anyhow::Result;
use axum::http::StatusCode;
use backoffice::models::{NewSlot, SlotStatus};
use backoffice::store::SlotStore;
use chrono::{DateTime, Duration, Utc};
use common::{read_json, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct SlotBody {
    id: Uuid,
    datetime: DateTime<Utc>,
    status: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppointmentBody {
    id: Uuid,
    slot_id: Uuid,
    status: String,
    model: String,
    scheduled_for: Option<DateTime<Utc>>,
}

fn booking(slot_id: Uuid) -> Value {
    json!({
        "slot_id": slot_id,
        "name": "Lucia Romero",
        "phone": "+34600111222",
        "email": "lucia@example.com",
        "brand": "Seat",
        "model": "Ibiza",
        "year": 2019,
        "service": "oil change",
        "fuel": "petrol"
    })
}

async fn create_slot(app: &TestApp, token: &str, datetime: DateTime<Utc>) -> Result<SlotBody> {
    let response = app
        .post_json("/api/slots", &json!({ "datetime": datetime }), Some(token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

#[tokio::test]
async fn slots_in_the_past_are_rejected() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;

    let response = app
        .post_json(
            "/api/slots",
            &json!({ "datetime": Utc::now() - Duration::hours(1) }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expired_slots_disappear_on_load() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let stale = app
        .store
        .insert_slot(NewSlot {
            id: Uuid::new_v4(),
            datetime: Utc::now() - Duration::hours(2),
        })
        .await?;
    let upcoming = create_slot(&app, &token, Utc::now() + Duration::days(1)).await?;

    let response = app.get("/api/slots", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let slots: Vec<SlotBody> = read_json(response).await?;

    assert!(slots.iter().all(|slot| slot.id != stale.id));
    assert!(slots.iter().any(|slot| slot.id == upcoming.id));
    Ok(())
}

#[tokio::test]
async fn slots_list_in_datetime_order_with_status_filter() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let later = create_slot(&app, &token, Utc::now() + Duration::days(3)).await?;
    let sooner = create_slot(&app, &token, Utc::now() + Duration::days(1)).await?;
    app.post_json("/api/appointments", &booking(later.id), Some(&token))
        .await?;

    let all: Vec<SlotBody> = read_json(app.get("/api/slots", Some(&token)).await?).await?;
    assert_eq!(
        all.iter().map(|slot| slot.id).collect::<Vec<_>>(),
        vec![sooner.id, later.id]
    );
    assert!(all[0].datetime < all[1].datetime);

    let available: Vec<SlotBody> =
        read_json(app.get("/api/slots?status=available", Some(&token)).await?).await?;
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, sooner.id);
    Ok(())
}

#[tokio::test]
async fn booking_and_cancelling_round_trips_the_slot() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;

    let response = app
        .post_json("/api/appointments", &booking(slot.id), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let appointment: AppointmentBody = read_json(response).await?;
    assert_eq!(appointment.status, "confirmed");
    assert_eq!(appointment.slot_id, slot.id);
    assert_eq!(appointment.scheduled_for, Some(slot.datetime));

    let booked: SlotBody =
        read_json(app.get(&format!("/api/slots/{}", slot.id), Some(&token)).await?).await?;
    assert_eq!(booked.status, "booked");
    assert_eq!(booked.customer_name.as_deref(), Some("Lucia Romero"));
    assert_eq!(booked.customer_phone.as_deref(), Some("+34600111222"));

    let response = app
        .post_json(
            &format!("/api/appointments/{}/cancel", appointment.id),
            &json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: AppointmentBody = read_json(response).await?;
    assert_eq!(cancelled.status, "cancelled");

    let released: SlotBody =
        read_json(app.get(&format!("/api/slots/{}", slot.id), Some(&token)).await?).await?;
    assert_eq!(released.status, "available");
    assert_eq!(released.customer_name, None);
    assert_eq!(released.customer_phone, None);
    Ok(())
}

#[tokio::test]
async fn booked_slot_rejects_edit_and_delete() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;
    app.post_json("/api/appointments", &booking(slot.id), Some(&token))
        .await?;
    let before = app.store.get_slot(slot.id).await?;

    let response = app
        .put_json(
            &format!("/api/slots/{}", slot.id),
            &json!({ "datetime": Utc::now() + Duration::days(9) }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .delete(&format!("/api/slots/{}", slot.id), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let after = app.store.get_slot(slot.id).await?;
    assert_eq!(after, before);
    assert_eq!(after.status, SlotStatus::Booked);
    Ok(())
}

#[tokio::test]
async fn available_slot_can_be_moved_and_removed() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;
    let target = Utc::now() + Duration::days(4);

    let response = app
        .put_json(
            &format!("/api/slots/{}", slot.id),
            &json!({ "datetime": target }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let moved: SlotBody = read_json(response).await?;
    assert_eq!(moved.datetime, target);

    let response = app
        .delete(&format!("/api/slots/{}", slot.id), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/slots/{}", slot.id), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn double_booking_conflicts() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;

    let first = app
        .post_json("/api/appointments", &booking(slot.id), Some(&token))
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app
        .post_json("/api/appointments", &booking(slot.id), Some(&token))
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let appointments: Vec<AppointmentBody> =
        read_json(app.get("/api/appointments", Some(&token)).await?).await?;
    assert_eq!(appointments.len(), 1);
    Ok(())
}

#[tokio::test]
async fn appointment_details_edit_and_delete() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;
    let appointment: AppointmentBody = read_json(
        app.post_json("/api/appointments", &booking(slot.id), Some(&token))
            .await?,
    )
    .await?;
    let path = format!("/api/appointments/{}", appointment.id);

    let response = app
        .patch_json(&path, &json!({ "model": "Leon", "email": null }), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let edited: AppointmentBody = read_json(response).await?;
    assert_eq!(edited.model, "Leon");

    let response = app
        .patch_json(&path, &json!({ "slot_id": Uuid::new_v4() }), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.delete(&path, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let freed = app.store.get_slot(slot.id).await?;
    assert_eq!(freed.status, SlotStatus::Available);
    Ok(())
}

#[tokio::test]
async fn stale_cancellations_leave_the_new_booking_alone() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;
    let slot = create_slot(&app, &token, Utc::now() + Duration::days(2)).await?;
    let stale: AppointmentBody = read_json(
        app.post_json("/api/appointments", &booking(slot.id), Some(&token))
            .await?,
    )
    .await?;
    let cancel_path = format!("/api/appointments/{}/cancel", stale.id);
    let response = app.post_json(&cancel_path, &json!({}), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let mut rebooking = booking(slot.id);
    rebooking["name"] = json!("Pedro Alvarez");
    let response = app
        .post_json("/api/appointments", &rebooking, Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.post_json(&cancel_path, &json!({}), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .delete(&format!("/api/appointments/{}", stale.id), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let held: SlotBody =
        read_json(app.get(&format!("/api/slots/{}", slot.id), Some(&token)).await?).await?;
    assert_eq!(held.status, "booked");
    assert_eq!(held.customer_name.as_deref(), Some("Pedro Alvarez"));
    Ok(())
}

#[tokio::test]
async fn cancelling_an_unknown_appointment_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let token = app.agent_token().await?;

    let response = app
        .post_json(
            &format!("/api/appointments/{}/cancel", Uuid::new_v4()),
            &json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
