//! Shared fixtures for service, GraphQL and HTTP tests

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::email::EmailService;
use super::stripe::{
    sign_payload, CreateIntentParams, Customer, LastPaymentError, PaymentGateway, PaymentIntent,
    Refund, SetupIntent, StripeError,
};
use super::Services;
use crate::cache::Cache;
use crate::config::Config;
use crate::db::Repositories;
use crate::models::{User, UserRole};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// In-process stand-in for Stripe
#[derive(Default)]
pub struct MockGateway {
    next_id: AtomicU64,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    refunds: Mutex<Vec<Refund>>,
    customers: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    fn id(&self, prefix: &str) -> String {
        format!("{}_test_{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub async fn intent(&self, id: &str) -> PaymentIntent {
        self.intents.lock().await.get(id).cloned().expect("unknown intent")
    }

    /// Mark an intent as paid, as the client-side confirmation would
    pub async fn succeed(&self, id: &str) -> PaymentIntent {
        let mut intents = self.intents.lock().await;
        let intent = intents.get_mut(id).expect("unknown intent");
        intent.status = "succeeded".to_string();
        intent.clone()
    }

    pub async fn fail(&self, id: &str, message: &str) -> PaymentIntent {
        let mut intents = self.intents.lock().await;
        let intent = intents.get_mut(id).expect("unknown intent");
        intent.status = "requires_payment_method".to_string();
        intent.last_payment_error = Some(LastPaymentError {
            message: Some(message.to_string()),
        });
        intent.clone()
    }

    pub async fn refunds(&self) -> Vec<Refund> {
        self.refunds.lock().await.clone()
    }

    pub async fn customer_count(&self) -> usize {
        self.customers.lock().await.len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_customer(&self, name: &str, email: &str) -> Result<Customer, StripeError> {
        self.customers
            .lock()
            .await
            .push((name.to_string(), email.to_string()));
        Ok(Customer { id: self.id("cus") })
    }

    async fn create_payment_intent(&self, params: &CreateIntentParams) -> Result<PaymentIntent, StripeError> {
        let id = self.id("pi");
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{}_secret", id)),
            amount: params.amount,
            currency: params.currency.clone(),
            status: "requires_payment_method".to_string(),
            customer: params.customer.clone(),
            metadata: params.metadata.iter().cloned().collect(),
            last_payment_error: None,
        };
        self.intents.lock().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.intents
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                status: 404,
                message: format!("No such payment_intent: '{}'", id),
            })
    }

    async fn create_refund(&self, payment_intent: &str, amount: Option<i64>) -> Result<Refund, StripeError> {
        let intent = self.retrieve_payment_intent(payment_intent).await?;
        let mut refunds = self.refunds.lock().await;
        let refunded: i64 = refunds
            .iter()
            .filter(|r| r.payment_intent.as_deref() == Some(payment_intent))
            .map(|r| r.amount)
            .sum();
        let amount = amount.unwrap_or(intent.amount - refunded);
        if amount <= 0 || refunded + amount > intent.amount {
            return Err(StripeError::Api {
                status: 400,
                message: "Refund exceeds the charge amount".to_string(),
            });
        }
        let refund = Refund {
            id: self.id("re"),
            amount,
            status: Some("succeeded".to_string()),
            payment_intent: Some(payment_intent.to_string()),
        };
        refunds.push(refund.clone());
        Ok(refund)
    }

    async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, StripeError> {
        let id = self.id("seti");
        Ok(SetupIntent {
            client_secret: Some(format!("{}_secret", id)),
            id,
            status: "requires_payment_method".to_string(),
            customer: Some(customer.to_string()),
        })
    }
}

/// Services over in-memory stores, mock email and the mock gateway
pub struct TestEnv {
    pub services: Arc<Services>,
    pub repos: Repositories,
    pub gateway: Arc<MockGateway>,
    pub cache: Arc<Cache>,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let config = Self::config();
        let repos = Repositories::in_memory();
        let cache = Arc::new(Cache::new());
        let gateway = Arc::new(MockGateway::default());
        let services = Arc::new(Services::new(
            &config,
            repos.clone(),
            cache.clone(),
            Arc::new(EmailService::mock()),
            gateway.clone(),
        ));
        Self {
            services,
            repos,
            gateway,
            cache,
            config,
        }
    }

    pub fn config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = JWT_SECRET.to_string();
        config.stripe.secret_key = "sk_test".to_string();
        config.stripe.webhook_secret = WEBHOOK_SECRET.to_string();
        config
    }

    async fn insert_user(&self, name: &str, role: UserRole, member: bool) -> User {
        let mut user = User::new(
            name.to_string(),
            format!("{}@example.org", name.to_lowercase()),
            "not-a-real-hash".to_string(),
        );
        user.role = role;
        user.is_group_member = member;
        self.repos.users.insert(&user).await.expect("insert user");
        user
    }

    pub async fn admin(&self) -> User {
        self.insert_user("Admin", UserRole::Admin, false).await
    }

    /// Group member; trusted to publish without review
    pub async fn member(&self, name: &str) -> User {
        self.insert_user(name, UserRole::User, true).await
    }

    pub async fn user(&self, name: &str) -> User {
        self.insert_user(name, UserRole::User, false).await
    }

    pub fn token(&self, user: &User) -> String {
        super::auth::generate_token(user, &super::auth::JwtConfig::from(&self.config.auth)).expect("sign token")
    }

    /// A signed webhook delivery for an event of `event_type` wrapping `object`
    pub fn webhook(event_type: &str, object: serde_json::Value) -> (Vec<u8>, String) {
        let payload = serde_json::json!({
            "id": format!("evt_{}", ObjectId::new().to_hex()),
            "type": event_type,
            "data": { "object": object },
        })
        .to_string()
        .into_bytes();
        let signature = sign_payload(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        (payload, signature)
    }
}

/// JSON shape of a PaymentIntent as Stripe sends it in webhooks
pub fn intent_json(intent: &PaymentIntent) -> serde_json::Value {
    serde_json::json!({
        "id": intent.id,
        "object": "payment_intent",
        "amount": intent.amount,
        "currency": intent.currency,
        "status": intent.status,
        "customer": intent.customer,
        "metadata": intent.metadata,
        "last_payment_error": intent.last_payment_error.as_ref().map(|e| serde_json::json!({ "message": e.message })),
    })
}
