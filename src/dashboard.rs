use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::models::{AppointmentStatus, MessageOrigin, QuoteStatus};
use crate::store::{AppointmentStore, MessageStore, QuoteStore, Store};

const RECENT_PER_KIND: usize = 5;
const NEW_CLIENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Message,
    Appointment,
    Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub customer: String,
    pub at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub unread_messages: i64,
    pub appointments_today: usize,
    pub pending_quotes: usize,
    pub new_clients: usize,
    /// Share of customer messages that staff have read, as a percentage.
    pub response_rate: f64,
    pub recent_activity: Vec<Activity>,
}

/// "Today" is the UTC calendar day containing `now`.
pub async fn load(store: &dyn Store, now: DateTime<Utc>) -> AppResult<DashboardStats> {
    let unread_messages = store.unread_total().await?;
    let (read, total) = store.human_read_ratio().await?;
    let appointments = store.list_appointments().await?;
    let pending_quotes = store.list_quotes(Some(QuoteStatus::Pending)).await?.len();

    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);
    let appointments_today = appointments
        .iter()
        .filter(|appointment| appointment.status == AppointmentStatus::Confirmed)
        .filter(|appointment| {
            appointment
                .scheduled_for
                .is_some_and(|at| at >= day_start && at < day_end)
        })
        .count();

    let window_start = now - Duration::days(NEW_CLIENT_WINDOW_DAYS);
    let new_clients = appointments
        .iter()
        .filter(|appointment| appointment.created_at >= window_start)
        .map(|appointment| appointment.name.as_str())
        .collect::<HashSet<_>>()
        .len();

    let response_rate = if total > 0 {
        read as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let mut recent_activity = Vec::new();
    for message in store.recent_messages(RECENT_PER_KIND as i64).await? {
        recent_activity.push(Activity {
            id: message.id.to_string(),
            kind: ActivityKind::Message,
            customer: message.customer_name,
            at: message.created_at,
            summary: match message.origin {
                MessageOrigin::Human => "sent a new message".to_string(),
                MessageOrigin::Automated => "message answered".to_string(),
            },
        });
    }
    for appointment in store.recent_appointments(RECENT_PER_KIND as i64).await? {
        recent_activity.push(Activity {
            id: appointment.id.to_string(),
            kind: ActivityKind::Appointment,
            customer: appointment.name,
            at: appointment.created_at,
            summary: format!("appointment {}", appointment.status),
        });
    }
    for quote in store
        .list_quotes(None)
        .await?
        .into_iter()
        .take(RECENT_PER_KIND)
    {
        recent_activity.push(Activity {
            id: quote.id.to_string(),
            kind: ActivityKind::Quote,
            customer: quote.customer_name,
            at: quote.created_at,
            summary: format!("quote {}", quote.status),
        });
    }
    recent_activity.sort_by(|a, b| b.at.cmp(&a.at));

    Ok(DashboardStats {
        unread_messages,
        appointments_today,
        pending_quotes,
        new_clients,
        response_rate,
        recent_activity,
    })
}
