//! Outbound delivery of staff replies.
//!
//! The only production transport is the WhatsApp Cloud API. Delivery is a
//! single attempt; the caller decides what to do with a failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::WhatsAppConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("messaging gateway is not configured")]
    NotConfigured,
    #[error("delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected the message with {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Sends a plain text message to the customer contact `to`.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct OutgoingText<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Clone)]
pub struct WhatsAppGateway {
    client: Client,
    api_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsAppGateway {
    pub fn new(
        api_url: impl Into<String>,
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/messages", self.api_url, self.phone_number_id)
    }
}

#[async_trait]
impl MessageGateway for WhatsAppGateway {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        let payload = OutgoingText {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "whatsapp message accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(%status, body = %body, "whatsapp rejected message");
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Stand-in used when no messaging credentials are configured.
pub struct DisabledGateway;

#[async_trait]
impl MessageGateway for DisabledGateway {
    async fn send_text(&self, _to: &str, _body: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}

pub fn gateway_from_config(config: &WhatsAppConfig) -> Result<Arc<dyn MessageGateway>, DeliveryError> {
    match (&config.access_token, &config.phone_number_id) {
        (Some(token), Some(phone_number_id)) => Ok(Arc::new(WhatsAppGateway::new(
            config.api_url.clone(),
            token.clone(),
            phone_number_id.clone(),
        )?)),
        _ => {
            warn!("whatsapp credentials missing; replies cannot be delivered");
            Ok(Arc::new(DisabledGateway))
        }
    }
}
