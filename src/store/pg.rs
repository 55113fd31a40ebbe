use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use super::{
    AppointmentStore, MessageStore, QuoteStore, SlotStore, StoreError, StoreResult, UserStore,
};
use crate::db::PgPool;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, Message, MessageOrigin, NewAppointment,
    NewMessage, NewQuote, NewSlot, NewUser, ProfileChanges, Quote, QuoteChanges, QuoteStatus,
    Session, Slot, SlotStatus, User,
};
use crate::schema::{appointments, available_slots, discussions, quotes, sessions, users};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

fn parse_column<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::InvalidValue)
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = discussions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct MessageRecord {
    id: i64,
    session_id: String,
    origin: String,
    message: String,
    created_at: DateTime<Utc>,
    client_name: String,
    read: bool,
    assigned_to_agent: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = StoreError;

    fn try_from(record: MessageRecord) -> StoreResult<Self> {
        Ok(Message {
            id: record.id,
            conversation_key: record.session_id,
            origin: parse_column(&record.origin)?,
            body: record.message,
            created_at: record.created_at,
            customer_name: record.client_name,
            read: record.read,
            handoff: record.assigned_to_agent,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = discussions)]
struct NewMessageRecord<'a> {
    session_id: &'a str,
    origin: &'a str,
    message: &'a str,
    created_at: DateTime<Utc>,
    client_name: &'a str,
    read: bool,
    assigned_to_agent: bool,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = quotes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct QuoteRecord {
    id: Uuid,
    customer_name: String,
    phone_number: String,
    email: Option<String>,
    amount: f64,
    details: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuoteRecord> for Quote {
    type Error = StoreError;

    fn try_from(record: QuoteRecord) -> StoreResult<Self> {
        Ok(Quote {
            id: record.id,
            customer_name: record.customer_name,
            phone_number: record.phone_number,
            email: record.email,
            amount: record.amount,
            details: record.details,
            status: parse_column(&record.status)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = quotes)]
struct NewQuoteRecord<'a> {
    id: Uuid,
    customer_name: &'a str,
    phone_number: &'a str,
    email: Option<&'a str>,
    amount: f64,
    details: &'a str,
    status: &'a str,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = quotes)]
struct QuoteChangeset<'a> {
    customer_name: Option<&'a str>,
    phone_number: Option<&'a str>,
    email: Option<Option<&'a str>>,
    amount: Option<f64>,
    details: Option<&'a str>,
    status: Option<&'a str>,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = available_slots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct SlotRecord {
    id: Uuid,
    datetime: DateTime<Utc>,
    status: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SlotRecord> for Slot {
    type Error = StoreError;

    fn try_from(record: SlotRecord) -> StoreResult<Self> {
        Ok(Slot {
            id: record.id,
            datetime: record.datetime,
            status: parse_column(&record.status)?,
            customer_name: record.customer_name,
            customer_phone: record.customer_phone,
            created_at: record.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = available_slots)]
struct NewSlotRecord<'a> {
    id: Uuid,
    datetime: DateTime<Utc>,
    status: &'a str,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct AppointmentRecord {
    id: Uuid,
    slot_id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    brand: String,
    model: String,
    year: i32,
    service: String,
    fuel: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl AppointmentRecord {
    fn into_appointment(self, scheduled_for: Option<DateTime<Utc>>) -> StoreResult<Appointment> {
        Ok(Appointment {
            id: self.id,
            slot_id: self.slot_id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            brand: self.brand,
            model: self.model,
            year: self.year,
            service: self.service,
            fuel: self.fuel,
            status: parse_column(&self.status)?,
            created_at: self.created_at,
            scheduled_for,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = appointments)]
struct NewAppointmentRecord<'a> {
    id: Uuid,
    slot_id: Uuid,
    name: &'a str,
    phone: &'a str,
    email: Option<&'a str>,
    brand: &'a str,
    model: &'a str,
    year: i32,
    service: &'a str,
    fuel: &'a str,
    status: &'a str,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = appointments)]
struct AppointmentChangeset<'a> {
    name: Option<&'a str>,
    phone: Option<&'a str>,
    email: Option<Option<&'a str>>,
    brand: Option<&'a str>,
    model: Option<&'a str>,
    year: Option<i32>,
    service: Option<&'a str>,
    fuel: Option<&'a str>,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    phone: Option<String>,
    avatar_url: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = StoreError;

    fn try_from(record: UserRecord) -> StoreResult<Self> {
        Ok(User {
            id: record.id,
            email: record.email,
            name: record.name,
            role: parse_column(&record.role)?,
            phone: record.phone,
            avatar_url: record.avatar_url,
            password_hash: record.password_hash,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUserRecord<'a> {
    id: Uuid,
    email: &'a str,
    name: &'a str,
    role: &'a str,
    phone: Option<&'a str>,
    password_hash: &'a str,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct ProfileChangeset<'a> {
    name: Option<&'a str>,
    phone: Option<Option<&'a str>>,
    avatar_url: Option<Option<&'a str>>,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Session {
            id: record.id,
            user_id: record.user_id,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
        }
    }
}

fn convert_all<R, T>(records: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    records.into_iter().map(T::try_from).collect()
}

/// Postgres-backed store. Queries run synchronously on a pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn conn(&self) -> StoreResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| StoreError::Pool(err.to_string()))
    }
}

fn release_slot(conn: &mut PgConnection, slot_id: Uuid) -> StoreResult<Option<Slot>> {
    let record = diesel::update(available_slots::table.find(slot_id))
        .set((
            available_slots::status.eq(SlotStatus::Available.as_str()),
            available_slots::customer_name.eq(None::<String>),
            available_slots::customer_phone.eq(None::<String>),
        ))
        .returning(SlotRecord::as_returning())
        .get_result::<SlotRecord>(conn)
        .optional()?;
    record.map(Slot::try_from).transpose()
}

fn slot_datetime(conn: &mut PgConnection, slot_id: Uuid) -> StoreResult<Option<DateTime<Utc>>> {
    Ok(available_slots::table
        .find(slot_id)
        .select(available_slots::datetime)
        .first::<DateTime<Utc>>(conn)
        .optional()?)
}

#[async_trait]
impl MessageStore for PgStore {
    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn()?;
        let records = discussions::table
            .order((discussions::created_at.asc(), discussions::id.asc()))
            .select(MessageRecord::as_select())
            .load::<MessageRecord>(&mut conn)?;
        convert_all(records)
    }

    async fn conversation_messages(&self, key: &str) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn()?;
        let records = discussions::table
            .filter(discussions::session_id.eq(key))
            .order((discussions::created_at.asc(), discussions::id.asc()))
            .select(MessageRecord::as_select())
            .load::<MessageRecord>(&mut conn)?;
        convert_all(records)
    }

    async fn latest_message(&self, key: &str) -> StoreResult<Option<Message>> {
        let mut conn = self.conn()?;
        let record = discussions::table
            .filter(discussions::session_id.eq(key))
            .order((discussions::created_at.desc(), discussions::id.desc()))
            .select(MessageRecord::as_select())
            .first::<MessageRecord>(&mut conn)
            .optional()?;
        record.map(Message::try_from).transpose()
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        let mut conn = self.conn()?;
        let record = NewMessageRecord {
            session_id: &message.conversation_key,
            origin: message.origin.as_str(),
            message: &message.body,
            created_at: message.created_at,
            client_name: &message.customer_name,
            read: message.read,
            assigned_to_agent: message.handoff,
        };
        let inserted = diesel::insert_into(discussions::table)
            .values(&record)
            .returning(MessageRecord::as_returning())
            .get_result::<MessageRecord>(&mut conn)?;
        Message::try_from(inserted)
    }

    async fn set_handoff(&self, key: &str, handoff: bool) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(
            diesel::update(discussions::table.filter(discussions::session_id.eq(key)))
                .set(discussions::assigned_to_agent.eq(handoff))
                .execute(&mut conn)?,
        )
    }

    async fn mark_read(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            discussions::table
                .filter(discussions::session_id.eq(key))
                .filter(discussions::origin.eq(MessageOrigin::Human.as_str()))
                .filter(discussions::read.eq(false)),
        )
        .set(discussions::read.eq(true))
        .execute(&mut conn)?)
    }

    async fn delete_conversation(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(
            diesel::delete(discussions::table.filter(discussions::session_id.eq(key)))
                .execute(&mut conn)?,
        )
    }

    async fn unread_total(&self) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(discussions::table
            .filter(discussions::origin.eq(MessageOrigin::Human.as_str()))
            .filter(discussions::read.eq(false))
            .count()
            .get_result(&mut conn)?)
    }

    async fn human_read_ratio(&self) -> StoreResult<(i64, i64)> {
        let mut conn = self.conn()?;
        let total: i64 = discussions::table
            .filter(discussions::origin.eq(MessageOrigin::Human.as_str()))
            .count()
            .get_result(&mut conn)?;
        let read: i64 = discussions::table
            .filter(discussions::origin.eq(MessageOrigin::Human.as_str()))
            .filter(discussions::read.eq(true))
            .count()
            .get_result(&mut conn)?;
        Ok((read, total))
    }

    async fn recent_messages(&self, limit: i64) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn()?;
        let records = discussions::table
            .order((discussions::created_at.desc(), discussions::id.desc()))
            .limit(limit)
            .select(MessageRecord::as_select())
            .load::<MessageRecord>(&mut conn)?;
        convert_all(records)
    }
}

#[async_trait]
impl QuoteStore for PgStore {
    async fn list_quotes(&self, status: Option<QuoteStatus>) -> StoreResult<Vec<Quote>> {
        let mut conn = self.conn()?;
        let mut query = quotes::table
            .order(quotes::created_at.desc())
            .select(QuoteRecord::as_select())
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(quotes::status.eq(status.as_str()));
        }
        convert_all(query.load::<QuoteRecord>(&mut conn)?)
    }

    async fn get_quote(&self, id: Uuid) -> StoreResult<Quote> {
        let mut conn = self.conn()?;
        let record = quotes::table
            .find(id)
            .select(QuoteRecord::as_select())
            .first::<QuoteRecord>(&mut conn)?;
        Quote::try_from(record)
    }

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        let mut conn = self.conn()?;
        let record = NewQuoteRecord {
            id: quote.id,
            customer_name: &quote.customer_name,
            phone_number: &quote.phone_number,
            email: quote.email.as_deref(),
            amount: quote.amount,
            details: &quote.details,
            status: quote.status.as_str(),
        };
        let inserted = diesel::insert_into(quotes::table)
            .values(&record)
            .returning(QuoteRecord::as_returning())
            .get_result::<QuoteRecord>(&mut conn)?;
        Quote::try_from(inserted)
    }

    async fn update_quote(&self, id: Uuid, changes: QuoteChanges) -> StoreResult<Quote> {
        let mut conn = self.conn()?;
        let changeset = QuoteChangeset {
            customer_name: changes.customer_name.as_deref(),
            phone_number: changes.phone_number.as_deref(),
            email: changes.email.as_ref().map(|value| value.as_deref()),
            amount: changes.amount,
            details: changes.details.as_deref(),
            status: changes.status.map(|status| status.as_str()),
        };
        let updated = diesel::update(quotes::table.find(id))
            .set((&changeset, quotes::updated_at.eq(Utc::now())))
            .returning(QuoteRecord::as_returning())
            .get_result::<QuoteRecord>(&mut conn)?;
        Quote::try_from(updated)
    }

    async fn delete_quote(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(quotes::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SlotStore for PgStore {
    async fn list_slots(&self, status: Option<SlotStatus>) -> StoreResult<Vec<Slot>> {
        let mut conn = self.conn()?;
        let mut query = available_slots::table
            .order(available_slots::datetime.asc())
            .select(SlotRecord::as_select())
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(available_slots::status.eq(status.as_str()));
        }
        convert_all(query.load::<SlotRecord>(&mut conn)?)
    }

    async fn get_slot(&self, id: Uuid) -> StoreResult<Slot> {
        let mut conn = self.conn()?;
        let record = available_slots::table
            .find(id)
            .select(SlotRecord::as_select())
            .first::<SlotRecord>(&mut conn)?;
        Slot::try_from(record)
    }

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot> {
        let mut conn = self.conn()?;
        let record = NewSlotRecord {
            id: slot.id,
            datetime: slot.datetime,
            status: SlotStatus::Available.as_str(),
        };
        let inserted = diesel::insert_into(available_slots::table)
            .values(&record)
            .returning(SlotRecord::as_returning())
            .get_result::<SlotRecord>(&mut conn)?;
        Slot::try_from(inserted)
    }

    async fn reschedule_if_available(
        &self,
        id: Uuid,
        datetime: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            available_slots::table
                .find(id)
                .filter(available_slots::status.eq(SlotStatus::Available.as_str())),
        )
        .set(available_slots::datetime.eq(datetime))
        .execute(&mut conn)?)
    }

    async fn delete_if_available(&self, id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(
            available_slots::table
                .find(id)
                .filter(available_slots::status.eq(SlotStatus::Available.as_str())),
        )
        .execute(&mut conn)?)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(
            available_slots::table
                .filter(available_slots::status.eq(SlotStatus::Available.as_str()))
                .filter(available_slots::datetime.lt(now)),
        )
        .returning(available_slots::id)
        .get_results::<Uuid>(&mut conn)?)
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn()?;
        let rows: Vec<(AppointmentRecord, Option<DateTime<Utc>>)> = appointments::table
            .left_join(available_slots::table)
            .order(appointments::created_at.desc())
            .select((
                AppointmentRecord::as_select(),
                available_slots::datetime.nullable(),
            ))
            .load(&mut conn)?;
        rows.into_iter()
            .map(|(record, scheduled_for)| record.into_appointment(scheduled_for))
            .collect()
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Appointment> {
        let mut conn = self.conn()?;
        let (record, scheduled_for): (AppointmentRecord, Option<DateTime<Utc>>) =
            appointments::table
                .left_join(available_slots::table)
                .filter(appointments::id.eq(id))
                .select((
                    AppointmentRecord::as_select(),
                    available_slots::datetime.nullable(),
                ))
                .first(&mut conn)?;
        record.into_appointment(scheduled_for)
    }

    async fn book(&self, appointment: NewAppointment) -> StoreResult<(Appointment, Slot)> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<_, StoreError, _>(|conn| {
            let booked = diesel::update(
                available_slots::table
                    .find(appointment.slot_id)
                    .filter(available_slots::status.eq(SlotStatus::Available.as_str())),
            )
            .set((
                available_slots::status.eq(SlotStatus::Booked.as_str()),
                available_slots::customer_name.eq(Some(appointment.name.as_str())),
                available_slots::customer_phone.eq(Some(appointment.phone.as_str())),
            ))
            .returning(SlotRecord::as_returning())
            .get_result::<SlotRecord>(conn)
            .optional()?;

            let slot = match booked {
                Some(record) => Slot::try_from(record)?,
                None => {
                    let exists = available_slots::table
                        .find(appointment.slot_id)
                        .select(available_slots::id)
                        .first::<Uuid>(conn)
                        .optional()?;
                    return Err(match exists {
                        Some(_) => StoreError::Conflict("slot is no longer available".into()),
                        None => StoreError::NotFound,
                    });
                }
            };

            let record = NewAppointmentRecord {
                id: appointment.id,
                slot_id: appointment.slot_id,
                name: &appointment.name,
                phone: &appointment.phone,
                email: appointment.email.as_deref(),
                brand: &appointment.brand,
                model: &appointment.model,
                year: appointment.year,
                service: &appointment.service,
                fuel: &appointment.fuel,
                status: AppointmentStatus::Confirmed.as_str(),
            };
            let inserted = diesel::insert_into(appointments::table)
                .values(&record)
                .returning(AppointmentRecord::as_returning())
                .get_result::<AppointmentRecord>(conn)?;

            Ok((inserted.into_appointment(Some(slot.datetime))?, slot))
        })
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> StoreResult<Appointment> {
        let mut conn = self.conn()?;
        let changeset = AppointmentChangeset {
            name: changes.name.as_deref(),
            phone: changes.phone.as_deref(),
            email: changes.email.as_ref().map(|value| value.as_deref()),
            brand: changes.brand.as_deref(),
            model: changes.model.as_deref(),
            year: changes.year,
            service: changes.service.as_deref(),
            fuel: changes.fuel.as_deref(),
        };
        // An empty changeset is rejected by diesel, so only write when
        // something actually changed.
        let record = if changes_present(&changes) {
            diesel::update(appointments::table.find(id))
                .set(&changeset)
                .returning(AppointmentRecord::as_returning())
                .get_result::<AppointmentRecord>(&mut conn)?
        } else {
            appointments::table
                .find(id)
                .select(AppointmentRecord::as_select())
                .first::<AppointmentRecord>(&mut conn)?
        };
        let scheduled_for = slot_datetime(&mut conn, record.slot_id)?;
        record.into_appointment(scheduled_for)
    }

    async fn cancel(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<_, StoreError, _>(|conn| {
            let cancelled = diesel::update(
                appointments::table
                    .find(id)
                    .filter(appointments::status.eq(AppointmentStatus::Confirmed.as_str())),
            )
            .set(appointments::status.eq(AppointmentStatus::Cancelled.as_str()))
            .returning(AppointmentRecord::as_returning())
            .get_result::<AppointmentRecord>(conn)
            .optional()?;

            let Some(record) = cancelled else {
                let exists = appointments::table
                    .find(id)
                    .select(appointments::id)
                    .first::<Uuid>(conn)
                    .optional()?;
                return Err(match exists {
                    Some(_) => StoreError::Conflict("appointment is already cancelled".into()),
                    None => StoreError::NotFound,
                });
            };
            let slot = release_slot(conn, record.slot_id)?;
            let scheduled_for = slot.as_ref().map(|slot| slot.datetime);
            Ok((record.into_appointment(scheduled_for)?, slot))
        })
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<_, StoreError, _>(|conn| {
            let record = diesel::delete(appointments::table.find(id))
                .returning(AppointmentRecord::as_returning())
                .get_result::<AppointmentRecord>(conn)?;
            // A cancelled appointment's slot may already hold another booking.
            let slot = if record.status == AppointmentStatus::Confirmed.as_str() {
                release_slot(conn, record.slot_id)?
            } else {
                None
            };
            let scheduled_for = match &slot {
                Some(slot) => Some(slot.datetime),
                None => slot_datetime(conn, record.slot_id)?,
            };
            Ok((record.into_appointment(scheduled_for)?, slot))
        })
    }

    async fn recent_appointments(&self, limit: i64) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn()?;
        let rows: Vec<(AppointmentRecord, Option<DateTime<Utc>>)> = appointments::table
            .left_join(available_slots::table)
            .order(appointments::created_at.desc())
            .limit(limit)
            .select((
                AppointmentRecord::as_select(),
                available_slots::datetime.nullable(),
            ))
            .load(&mut conn)?;
        rows.into_iter()
            .map(|(record, scheduled_for)| record.into_appointment(scheduled_for))
            .collect()
    }
}

fn changes_present(changes: &AppointmentChanges) -> bool {
    changes.name.is_some()
        || changes.phone.is_some()
        || changes.email.is_some()
        || changes.brand.is_some()
        || changes.model.is_some()
        || changes.year.is_some()
        || changes.service.is_some()
        || changes.fuel.is_some()
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let record = users::table
            .filter(users::email.eq(email.to_lowercase()))
            .select(UserRecord::as_select())
            .first::<UserRecord>(&mut conn)
            .optional()?;
        record.map(User::try_from).transpose()
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let mut conn = self.conn()?;
        let record = users::table
            .find(id)
            .select(UserRecord::as_select())
            .first::<UserRecord>(&mut conn)?;
        User::try_from(record)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        let email = user.email.to_lowercase();
        let record = NewUserRecord {
            id: user.id,
            email: &email,
            name: &user.name,
            role: user.role.as_str(),
            phone: user.phone.as_deref(),
            password_hash: &user.password_hash,
        };
        let inserted = diesel::insert_into(users::table)
            .values(&record)
            .returning(UserRecord::as_returning())
            .get_result::<UserRecord>(&mut conn)?;
        User::try_from(inserted)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<User> {
        let mut conn = self.conn()?;
        let changeset = ProfileChangeset {
            name: changes.name.as_deref(),
            phone: changes.phone.as_ref().map(|value| value.as_deref()),
            avatar_url: changes.avatar_url.as_ref().map(|value| value.as_deref()),
        };
        let updated = diesel::update(users::table.find(id))
            .set((&changeset, users::updated_at.eq(Utc::now())))
            .returning(UserRecord::as_returning())
            .get_result::<UserRecord>(&mut conn)?;
        User::try_from(updated)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut conn = self.conn()?;
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            issued_at: Utc::now(),
            expires_at,
            revoked_at: None,
        };
        let inserted = diesel::insert_into(sessions::table)
            .values(&record)
            .returning(SessionRecord::as_returning())
            .get_result::<SessionRecord>(&mut conn)?;
        Ok(inserted.into())
    }

    async fn active_session(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Session>> {
        let mut conn = self.conn()?;
        let record = sessions::table
            .find(id)
            .filter(sessions::revoked_at.is_null())
            .filter(sessions::expires_at.gt(now))
            .select(SessionRecord::as_select())
            .first::<SessionRecord>(&mut conn)
            .optional()?;
        Ok(record.map(Session::from))
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            sessions::table
                .find(id)
                .filter(sessions::revoked_at.is_null()),
        )
        .set(sessions::revoked_at.eq(Some(Utc::now())))
        .execute(&mut conn)?)
    }
}
