//! Stripe integration
//!
//! [`PaymentGateway`] covers the Stripe endpoints the platform uses:
//! customers, payment intents, refunds and setup intents. [`StripeClient`]
//! implements it over Stripe's form-encoded REST API. Webhook payloads are
//! authenticated with [`verify_webhook_signature`] before being parsed.

use async_trait::async_trait;
use data_encoding::HEXLOWER_PERMISSIVE;
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::Sha256;
use std::collections::HashMap;

use crate::config::StripeConfig;

/// Maximum age of a webhook signature timestamp, in seconds
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stripe request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LastPaymentError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SetupIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    /// Cumulative refunded amount
    pub amount_refunded: i64,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// Parameters for a new PaymentIntent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateIntentParams {
    pub amount: i64,
    pub currency: String,
    pub customer: Option<String>,
    pub description: Option<String>,
    pub receipt_email: Option<String>,
    pub metadata: Vec<(String, String)>,
}

impl CreateIntentParams {
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(customer) = &self.customer {
            form.push(("customer".to_string(), customer.clone()));
        }
        if let Some(description) = &self.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(email) = &self.receipt_email {
            form.push(("receipt_email".to_string(), email.clone()));
        }
        for (key, value) in &self.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        form
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(&self, name: &str, email: &str) -> Result<Customer, StripeError>;

    async fn create_payment_intent(&self, params: &CreateIntentParams) -> Result<PaymentIntent, StripeError>;

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError>;

    /// Refund a payment intent, fully when `amount` is `None`
    async fn create_refund(&self, payment_intent: &str, amount: Option<i64>) -> Result<Refund, StripeError>;

    async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, StripeError>;
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe REST client
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> Result<T, StripeError> {
        if self.secret_key.is_empty() {
            return Err(StripeError::NotConfigured);
        }
        let response = self
            .http
            .post(format!("{}/v1/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        if self.secret_key.is_empty() {
            return Err(StripeError::NotConfigured);
        }
        let response = self
            .http
            .get(format!("{}/v1/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| status.to_string());
        Err(StripeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, name: &str, email: &str) -> Result<Customer, StripeError> {
        let form = vec![
            ("name".to_string(), name.to_string()),
            ("email".to_string(), email.to_string()),
        ];
        self.post("customers", &form).await
    }

    async fn create_payment_intent(&self, params: &CreateIntentParams) -> Result<PaymentIntent, StripeError> {
        self.post("payment_intents", &params.to_form()).await
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.get(&format!("payment_intents/{}", id)).await
    }

    async fn create_refund(&self, payment_intent: &str, amount: Option<i64>) -> Result<Refund, StripeError> {
        let mut form = vec![("payment_intent".to_string(), payment_intent.to_string())];
        if let Some(amount) = amount {
            form.push(("amount".to_string(), amount.to_string()));
        }
        self.post("refunds", &form).await
    }

    async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, StripeError> {
        let form = vec![
            ("customer".to_string(), customer.to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        self.post("setup_intents", &form).await
    }
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WebhookError {
    #[error("Signature header has no timestamp")]
    MissingTimestamp,

    #[error("Signature header has no v1 signature")]
    NoSignatures,

    #[error("No signature matches the payload")]
    SignatureMismatch,

    #[error("Signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Deserialize the event's object
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed content is `"{t}.{payload}"` under HMAC-SHA256 with the
/// endpoint secret. Any matching `v1` entry is accepted.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(WebhookError::NoSignatures);
    }
    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let matches = signatures.iter().any(|sig| {
        let Ok(expected) = HEXLOWER_PERMISSIVE.decode(sig.as_bytes()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Verify and parse a webhook delivery
pub fn construct_event(payload: &[u8], header: &str, secret: &str) -> Result<WebhookEvent, WebhookError> {
    verify_webhook_signature(payload, header, secret, chrono::Utc::now().timestamp())?;
    serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

/// Compute a `Stripe-Signature` header value for a test delivery
#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, HEXLOWER_PERMISSIVE.encode(&mac.finalize().into_bytes()))
}
