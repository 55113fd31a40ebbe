use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use backoffice::auth::jwt::JwtService;
use backoffice::auth::password::hash_password;
use backoffice::config::{AppConfig, WhatsAppConfig, DEFAULT_WHATSAPP_API_URL};
use backoffice::db;
use backoffice::messaging::{DeliveryError, MessageGateway};
use backoffice::models::{
    Appointment, AppointmentChanges, Message, MessageOrigin, NewAppointment, NewMessage, NewQuote,
    NewSlot, NewUser, ProfileChanges, Quote, QuoteChanges, QuoteStatus, Session, Slot, SlotStatus,
    User, UserRole,
};
use backoffice::routes;
use backoffice::state::AppState;
use backoffice::store::{
    AppointmentStore, MemoryStore, MessageStore, QuoteStore, SlotStore, Store, StoreError,
    StoreResult, UserStore,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeGateway {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

#[async_trait]
impl MessageGateway for FakeGateway {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .await
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

impl FakeGateway {
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    #[allow(dead_code)]
    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

/// Memory store whose bulk handoff update can be made to fail.
#[allow(dead_code)]
pub struct FlakyHandoffStore {
    inner: Arc<MemoryStore>,
    failing: AtomicBool,
}

impl FlakyHandoffStore {
    #[allow(dead_code)]
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    #[allow(dead_code)]
    pub fn fail_handoff(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for FlakyHandoffStore {
    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        self.inner.list_messages().await
    }

    async fn conversation_messages(&self, key: &str) -> StoreResult<Vec<Message>> {
        self.inner.conversation_messages(key).await
    }

    async fn latest_message(&self, key: &str) -> StoreResult<Option<Message>> {
        self.inner.latest_message(key).await
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        self.inner.insert_message(message).await
    }

    async fn set_handoff(&self, key: &str, handoff: bool) -> StoreResult<usize> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("connection refused".to_string()));
        }
        self.inner.set_handoff(key, handoff).await
    }

    async fn mark_read(&self, key: &str) -> StoreResult<usize> {
        self.inner.mark_read(key).await
    }

    async fn delete_conversation(&self, key: &str) -> StoreResult<usize> {
        self.inner.delete_conversation(key).await
    }

    async fn unread_total(&self) -> StoreResult<i64> {
        self.inner.unread_total().await
    }

    async fn human_read_ratio(&self) -> StoreResult<(i64, i64)> {
        self.inner.human_read_ratio().await
    }

    async fn recent_messages(&self, limit: i64) -> StoreResult<Vec<Message>> {
        self.inner.recent_messages(limit).await
    }
}

#[async_trait]
impl QuoteStore for FlakyHandoffStore {
    async fn list_quotes(&self, status: Option<QuoteStatus>) -> StoreResult<Vec<Quote>> {
        self.inner.list_quotes(status).await
    }

    async fn get_quote(&self, id: Uuid) -> StoreResult<Quote> {
        self.inner.get_quote(id).await
    }

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        self.inner.insert_quote(quote).await
    }

    async fn update_quote(&self, id: Uuid, changes: QuoteChanges) -> StoreResult<Quote> {
        self.inner.update_quote(id, changes).await
    }

    async fn delete_quote(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_quote(id).await
    }
}

#[async_trait]
impl SlotStore for FlakyHandoffStore {
    async fn list_slots(&self, status: Option<SlotStatus>) -> StoreResult<Vec<Slot>> {
        self.inner.list_slots(status).await
    }

    async fn get_slot(&self, id: Uuid) -> StoreResult<Slot> {
        self.inner.get_slot(id).await
    }

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot> {
        self.inner.insert_slot(slot).await
    }

    async fn reschedule_if_available(
        &self,
        id: Uuid,
        datetime: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.inner.reschedule_if_available(id, datetime).await
    }

    async fn delete_if_available(&self, id: Uuid) -> StoreResult<usize> {
        self.inner.delete_if_available(id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        self.inner.delete_expired(now).await
    }
}

#[async_trait]
impl AppointmentStore for FlakyHandoffStore {
    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        self.inner.list_appointments().await
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Appointment> {
        self.inner.get_appointment(id).await
    }

    async fn book(&self, appointment: NewAppointment) -> StoreResult<(Appointment, Slot)> {
        self.inner.book(appointment).await
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> StoreResult<Appointment> {
        self.inner.update_appointment(id, changes).await
    }

    async fn cancel(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        self.inner.cancel(id).await
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<(Appointment, Option<Slot>)> {
        self.inner.delete_appointment(id).await
    }

    async fn recent_appointments(&self, limit: i64) -> StoreResult<Vec<Appointment>> {
        self.inner.recent_appointments(limit).await
    }
}

#[async_trait]
impl UserStore for FlakyHandoffStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.inner.get_user(id).await
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.insert_user(user).await
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<User> {
        self.inner.update_profile(id, changes).await
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        self.inner.create_session(user_id, expires_at).await
    }

    async fn active_session(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Session>> {
        self.inner.active_session(id, now).await
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<usize> {
        self.inner.revoke_session(id).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    router: Router,
    gateway: Arc<FakeGateway>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        session_expiry_days: 7,
        cors_allowed_origin: None,
        whatsapp: WhatsAppConfig {
            api_url: DEFAULT_WHATSAPP_API_URL.to_string(),
            access_token: None,
            phone_number_id: None,
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(store.clone(), store)
    }

    /// Serves requests from `store` while seeding goes straight to `memory`.
    pub fn with_store(store: Arc<dyn Store>, memory: Arc<MemoryStore>) -> Self {
        let config = test_config();
        let gateway = Arc::new(FakeGateway::default());
        let jwt = JwtService::from_config(&config);
        let state = AppState::new(store, config, gateway.clone(), jwt);
        let router = routes::create_router(state.clone());

        Self {
            state,
            store: memory,
            router,
            gateway,
        }
    }

    #[allow(dead_code)]
    pub fn gateway(&self) -> Arc<FakeGateway> {
        self.gateway.clone()
    }

    pub async fn insert_user(&self, email: &str, password: &str, role: UserRole) -> Result<Uuid> {
        let user = self
            .store
            .insert_user(NewUser {
                id: Uuid::new_v4(),
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                role,
                phone: None,
                password_hash: hash_password(password)?,
            })
            .await?;
        Ok(user.id)
    }

    /// Creates an agent account and signs it in.
    #[allow(dead_code)]
    pub async fn agent_token(&self) -> Result<String> {
        self.insert_user("agent@garage.test", "agent-password", UserRole::Agent)
            .await?;
        self.login_token("agent@garage.test", "agent-password").await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.access_token)
    }

    #[allow(dead_code)]
    pub async fn seed_message(
        &self,
        key: &str,
        origin: MessageOrigin,
        read: bool,
        handoff: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        Ok(self
            .store
            .insert_message(NewMessage {
                conversation_key: key.to_string(),
                origin,
                body: format!("{origin} message"),
                created_at,
                customer_name: format!("Customer {key}"),
                read,
                handoff,
            })
            .await?)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}
