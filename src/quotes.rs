//! Quote bookkeeping: create, edit, transition and remove.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{ChangeEvent, ChangeHub, Table};
use crate::models::{NewQuote, Quote, QuoteChanges, QuoteStatus};
use crate::store::{QuoteStore, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub customer_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub details: String,
}

fn validate_amount(amount: f64) -> AppResult<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::bad_request("amount must be a non-negative number"));
    }
    Ok(amount)
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub async fn create_quote(
    store: &dyn Store,
    events: &ChangeHub,
    request: QuoteRequest,
) -> AppResult<Quote> {
    let quote = store
        .insert_quote(NewQuote {
            id: Uuid::new_v4(),
            customer_name: required("customer_name", &request.customer_name)?,
            phone_number: required("phone_number", &request.phone_number)?,
            email: request
                .email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
            amount: validate_amount(request.amount)?,
            details: request.details.trim().to_string(),
            status: QuoteStatus::Pending,
        })
        .await?;
    info!(quote_id = %quote.id, amount = quote.amount, "quote created");
    events.publish(ChangeEvent::insert(Table::Quotes, &quote));
    Ok(quote)
}

/// Applies a field-level edit. Required text fields arrive already trimmed.
pub async fn update_quote(
    store: &dyn Store,
    events: &ChangeHub,
    id: Uuid,
    changes: QuoteChanges,
) -> AppResult<Quote> {
    if let Some(amount) = changes.amount {
        validate_amount(amount)?;
    }
    if changes.is_empty() {
        return Ok(store.get_quote(id).await?);
    }
    let quote = store.update_quote(id, changes).await?;
    events.publish(ChangeEvent::update(Table::Quotes, &quote));
    Ok(quote)
}

pub async fn set_status(
    store: &dyn Store,
    events: &ChangeHub,
    id: Uuid,
    status: QuoteStatus,
) -> AppResult<Quote> {
    let changes = QuoteChanges {
        status: Some(status),
        ..QuoteChanges::default()
    };
    let quote = store.update_quote(id, changes).await?;
    info!(quote_id = %id, %status, "quote status changed");
    events.publish(ChangeEvent::update(Table::Quotes, &quote));
    Ok(quote)
}

pub async fn delete_quote(store: &dyn Store, events: &ChangeHub, id: Uuid) -> AppResult<()> {
    let quote = store.get_quote(id).await?;
    store.delete_quote(id).await?;
    events.publish(ChangeEvent::delete(Table::Quotes, &quote));
    Ok(())
}
