use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($name), " value: {}"),
                        other
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(MessageOrigin {
    Human => "human",
    Automated => "automated",
});

text_enum!(QuoteStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

text_enum!(SlotStatus {
    Available => "available",
    Booked => "booked",
});

text_enum!(AppointmentStatus {
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

text_enum!(UserRole {
    Admin => "admin",
    Agent => "agent",
});

/// One row of the `discussions` table.
///
/// `conversation_key` is the customer's contact address and groups rows into
/// a thread. `handoff` is denormalized onto every row of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_key: String,
    pub origin: MessageOrigin,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub read: bool,
    pub handoff: bool,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_key: String,
    pub origin: MessageOrigin,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub read: bool,
    pub handoff: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub id: Uuid,
    pub customer_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub amount: f64,
    pub details: String,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuote {
    pub id: Uuid,
    pub customer_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub amount: f64,
    pub details: String,
    pub status: QuoteStatus,
}

/// Field-level edit of a quote; `None` leaves the column untouched and
/// `Some(None)` on `email` clears it.
#[derive(Debug, Clone, Default)]
pub struct QuoteChanges {
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<Option<String>>,
    pub amount: Option<f64>,
    pub details: Option<String>,
    pub status: Option<QuoteStatus>,
}

impl QuoteChanges {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.phone_number.is_none()
            && self.email.is_none()
            && self.amount.is_none()
            && self.details.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub id: Uuid,
    pub datetime: DateTime<Utc>,
    pub status: SlotStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Slot {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Available && self.datetime < now
    }
}

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub id: Uuid,
    pub datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub service: String,
    pub fuel: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    /// Datetime of the owning slot, absent when the slot row is gone.
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub service: String,
    pub fuel: String,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<Option<String>>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub service: Option<String>,
    pub fuel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}
