//! Payment service
//!
//! Donations and store purchases are paid through Stripe PaymentIntents.
//! A payment is created as `pending` when the intent is created and becomes
//! `succeeded` either through the webhook or an explicit confirmation. Both
//! paths go through [`PaymentService::record_success`], which claims the
//! transition with a guarded update so the side effects (donation record,
//! donor totals, campaign progress, stock, receipt) run exactly once.
//!
//! Refunds are tracked as cumulative totals. Applying a total that is not
//! larger than the stored one is a no-op, so a refund seen both from the
//! admin mutation and from the `charge.refunded` webhook counts once.

use bson::oid::ObjectId;
use bson::Bson;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;

use super::email::EmailService;
use super::error::{OrNotFound, ServiceError, ServiceResult};
use super::stripe::{
    construct_event, Charge, CreateIntentParams, PaymentGateway, PaymentIntent, StripeError,
    WebhookError,
};
use super::validation;
use crate::cache::{Cache, CacheLayer};
use crate::config::StripeConfig;
use crate::db::{Filter, Page, Query, Repositories, SortOrder, StoreError, Update};
use crate::models::{
    CreatePaymentIntentInput, Donation, Donor, Payment, PaymentIntentPayload, PaymentPurpose,
    PaymentStatus, SetupIntentPayload, User,
};

/// Smallest chargeable amount in minor units
pub const MIN_AMOUNT: i64 = 50;

/// Attempts at a contended refund update before giving up
const REFUND_RETRIES: usize = 5;

/// Statuses a payment may still leave for `succeeded` or `failed`
const OPEN_STATUSES: [&str; 2] = ["pending", "failed"];

impl From<StripeError> for ServiceError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Api { message, .. } => ServiceError::Payment(message),
            StripeError::Http(e) => {
                tracing::error!(error = %e, "Stripe request failed");
                ServiceError::Payment("Payment provider is unavailable".to_string())
            }
            StripeError::NotConfigured => {
                ServiceError::Internal(anyhow::anyhow!("Stripe is not configured"))
            }
        }
    }
}

impl From<WebhookError> for ServiceError {
    fn from(err: WebhookError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// A store purchase request
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub item_id: ObjectId,
    pub quantity: i64,
    pub name: String,
    pub email: String,
}

pub struct PaymentService {
    repos: Repositories,
    gateway: Arc<dyn PaymentGateway>,
    email: Arc<EmailService>,
    cache: Arc<Cache>,
    currency: String,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        email: Arc<EmailService>,
        cache: Arc<Cache>,
        config: &StripeConfig,
    ) -> Self {
        Self {
            repos,
            gateway,
            email,
            cache,
            currency: config.currency.to_lowercase(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Start a donation, optionally towards a campaign
    pub async fn create_payment_intent(
        &self,
        viewer: Option<&User>,
        input: CreatePaymentIntentInput,
    ) -> ServiceResult<PaymentIntentPayload> {
        let name = validation::required("Name", &input.name)?;
        let email = validation::email(&input.email)?;
        if input.amount < MIN_AMOUNT {
            return Err(ServiceError::validation(format!(
                "Amount must be at least {} minor units",
                MIN_AMOUNT
            )));
        }

        let mut currency = match input.currency.as_deref() {
            Some(c) => validation::currency(c)?,
            None => self.currency.clone(),
        };
        let mut description = "Donation".to_string();
        if let Some(campaign_id) = input.campaign_id {
            let campaign = self
                .repos
                .campaigns
                .get(campaign_id)
                .await?
                .or_not_found("Campaign")?;
            if !campaign.is_active_at(Utc::now()) {
                return Err(ServiceError::validation("Campaign is not accepting donations"));
            }
            if input.currency.is_some() && currency != campaign.currency {
                return Err(ServiceError::validation(format!(
                    "Campaign accepts donations in {}",
                    campaign.currency.to_uppercase()
                )));
            }
            currency = campaign.currency.clone();
            description = format!("Donation to {}", campaign.title);
        }

        let donor = self
            .find_or_create_donor(&name, &email, viewer.map(|u| u.id))
            .await?;
        let customer = self.ensure_customer(&donor).await?;

        let mut metadata = vec![
            ("purpose".to_string(), PaymentPurpose::Donation.as_str().to_string()),
            ("donor_id".to_string(), donor.id.to_hex()),
            ("anonymous".to_string(), input.anonymous.unwrap_or(false).to_string()),
        ];
        if let Some(campaign_id) = input.campaign_id {
            metadata.push(("campaign_id".to_string(), campaign_id.to_hex()));
        }
        if let Some(user) = viewer {
            metadata.push(("user_id".to_string(), user.id.to_hex()));
        }
        if let Some(message) = input.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            metadata.push(("message".to_string(), message.to_string()));
        }

        let params = CreateIntentParams {
            amount: input.amount,
            currency,
            customer: Some(customer),
            description: Some(description),
            receipt_email: Some(email),
            metadata,
        };
        self.start(params).await
    }

    /// Start a store purchase; proceeds go to the item's campaign when it has one
    pub async fn purchase_store_item(
        &self,
        viewer: Option<&User>,
        request: PurchaseRequest,
    ) -> ServiceResult<PaymentIntentPayload> {
        let name = validation::required("Name", &request.name)?;
        let email = validation::email(&request.email)?;
        if request.quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }

        let item = self
            .repos
            .store_items
            .get(request.item_id)
            .await?
            .filter(|item| item.active)
            .or_not_found("Store item")?;
        if item.stock < request.quantity {
            return Err(ServiceError::validation(format!(
                "Only {} left in stock",
                item.stock
            )));
        }
        let amount = item
            .price
            .checked_mul(request.quantity)
            .ok_or_else(|| ServiceError::validation("Order total is too large"))?;
        if amount < MIN_AMOUNT {
            return Err(ServiceError::validation(format!(
                "Order total must be at least {} minor units",
                MIN_AMOUNT
            )));
        }

        let donor = self
            .find_or_create_donor(&name, &email, viewer.map(|u| u.id))
            .await?;
        let customer = self.ensure_customer(&donor).await?;

        let mut metadata = vec![
            ("purpose".to_string(), PaymentPurpose::StorePurchase.as_str().to_string()),
            ("donor_id".to_string(), donor.id.to_hex()),
            ("store_item_id".to_string(), item.id.to_hex()),
            ("quantity".to_string(), request.quantity.to_string()),
        ];
        if let Some(campaign_id) = item.campaign_id {
            metadata.push(("campaign_id".to_string(), campaign_id.to_hex()));
        }
        if let Some(user) = viewer {
            metadata.push(("user_id".to_string(), user.id.to_hex()));
        }

        let params = CreateIntentParams {
            amount,
            currency: item.currency.clone(),
            customer: Some(customer),
            description: Some(format!("{} x {}", request.quantity, item.name)),
            receipt_email: Some(email),
            metadata,
        };
        self.start(params).await
    }

    /// Create the intent at Stripe and record it as pending
    async fn start(&self, params: CreateIntentParams) -> ServiceResult<PaymentIntentPayload> {
        let intent = self.gateway.create_payment_intent(&params).await?;
        let client_secret = intent
            .client_secret
            .clone()
            .ok_or_else(|| ServiceError::Payment("Payment intent has no client secret".to_string()))?;

        let payment = payment_from_intent(&intent, PaymentStatus::Pending)?;
        match self.repos.payments.insert(&payment).await {
            Ok(()) | Err(StoreError::Duplicate(_)) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            payment_intent = %intent.id,
            amount = intent.amount,
            purpose = payment.purpose.as_str(),
            "Payment intent created"
        );

        Ok(PaymentIntentPayload {
            client_secret,
            payment_intent_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    /// Setup intent for saving a card on the viewer's donor profile
    pub async fn create_setup_intent(&self, viewer: &User) -> ServiceResult<SetupIntentPayload> {
        let donor = self
            .find_or_create_donor(&viewer.name, &viewer.email, Some(viewer.id))
            .await?;
        let customer = self.ensure_customer(&donor).await?;
        let intent = self.gateway.create_setup_intent(&customer).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| ServiceError::Payment("Setup intent has no client secret".to_string()))?;
        Ok(SetupIntentPayload {
            client_secret,
            setup_intent_id: intent.id,
        })
    }

    /// Explicit confirmation after the client completed the payment
    pub async fn confirm_payment(&self, payment_intent_id: &str) -> ServiceResult<Payment> {
        let payment_intent_id = validation::payment_intent_id(payment_intent_id.trim())?;
        let intent = self.gateway.retrieve_payment_intent(payment_intent_id).await?;
        if !intent.is_succeeded() {
            return Err(ServiceError::Payment(format!(
                "Payment has not succeeded (status: {})",
                intent.status
            )));
        }
        self.record_success(&intent).await
    }

    // ========================================================================
    // Donors
    // ========================================================================

    async fn find_or_create_donor(
        &self,
        name: &str,
        email: &str,
        user_id: Option<ObjectId>,
    ) -> ServiceResult<Donor> {
        let by_email = || Filter::all().eq("email", email);

        if let Some(donor) = self.repos.donors.find_one(by_email()).await? {
            if donor.user_id.is_none() {
                if let Some(user_id) = user_id {
                    return self
                        .repos
                        .donors
                        .update_one(Filter::id(donor.id), Update::new().set("user_id", user_id))
                        .await?
                        .or_not_found("Donor");
                }
            }
            return Ok(donor);
        }

        let donor = Donor::new(name.to_string(), email.to_string(), user_id);
        match self.repos.donors.insert(&donor).await {
            Ok(()) => Ok(donor),
            Err(StoreError::Duplicate(_)) => {
                self.repos.donors.find_one(by_email()).await?.or_not_found("Donor")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stripe customer id of a donor, created on first use
    async fn ensure_customer(&self, donor: &Donor) -> ServiceResult<String> {
        if let Some(id) = &donor.stripe_customer_id {
            return Ok(id.clone());
        }
        let customer = self.gateway.create_customer(&donor.name, &donor.email).await?;
        self.repos
            .donors
            .update_one(
                Filter::id(donor.id),
                Update::new().set("stripe_customer_id", customer.id.clone()),
            )
            .await?;
        Ok(customer.id)
    }

    // ========================================================================
    // Outcomes
    // ========================================================================

    /// Record a succeeded intent; side effects run only for the first caller
    pub async fn record_success(&self, intent: &PaymentIntent) -> ServiceResult<Payment> {
        let fresh = payment_from_intent(intent, PaymentStatus::Succeeded)?;
        let payment = match self.repos.payments.insert(&fresh).await {
            Ok(()) => fresh,
            Err(StoreError::Duplicate(_)) => {
                let claimed = self
                    .repos
                    .payments
                    .update_one(
                        Filter::all()
                            .eq("stripe_payment_intent_id", intent.id.as_str())
                            .is_in("status", OPEN_STATUSES),
                        Update::new()
                            .set("status", PaymentStatus::Succeeded.as_str())
                            .set("failure_message", Bson::Null)
                            .set("updated_at", Utc::now()),
                    )
                    .await?;
                match claimed {
                    Some(payment) => payment,
                    None => {
                        tracing::debug!(payment_intent = %intent.id, "Payment already recorded");
                        return self.by_intent(&intent.id).await;
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        self.apply_success(&payment, intent).await?;
        tracing::info!(
            payment_id = %payment.id,
            payment_intent = %payment.stripe_payment_intent_id,
            amount = payment.amount,
            "Payment succeeded"
        );
        Ok(payment)
    }

    async fn apply_success(&self, payment: &Payment, intent: &PaymentIntent) -> ServiceResult<()> {
        let now = Utc::now();
        let donor = self.repos.donors.get(payment.donor_id).await?;

        match payment.purpose {
            PaymentPurpose::Donation => {
                let donation = Donation {
                    id: ObjectId::new(),
                    donor_id: payment.donor_id,
                    campaign_id: payment.campaign_id,
                    payment_id: payment.id,
                    amount: payment.amount,
                    currency: payment.currency.clone(),
                    message: intent.meta("message").map(str::to_string),
                    anonymous: intent.meta("anonymous") == Some("true"),
                    created_at: now,
                };
                match self.repos.donations.insert(&donation).await {
                    Ok(()) | Err(StoreError::Duplicate(_)) => {}
                    Err(e) => return Err(e.into()),
                }

                self.repos
                    .donors
                    .update_one(
                        Filter::id(payment.donor_id),
                        Update::new()
                            .inc("total_donations", payment.amount)
                            .inc("donation_count", 1i64)
                            .set("last_donation_at", now),
                    )
                    .await?;

                let mut campaign_title = None;
                if let Some(campaign_id) = payment.campaign_id {
                    campaign_title = self
                        .repos
                        .campaigns
                        .update_one(
                            Filter::id(campaign_id),
                            Update::new()
                                .inc("current_amount", payment.amount)
                                .inc("donor_count", 1i64),
                        )
                        .await?
                        .map(|c| c.title);
                }

                if let Some(donor) = &donor {
                    self.email
                        .send_donation_receipt(
                            &donor.name,
                            &donor.email,
                            payment.amount,
                            &payment.currency,
                            campaign_title.as_deref(),
                        )
                        .await;
                }
            }
            PaymentPurpose::StorePurchase => {
                let mut item_name = "item".to_string();
                if let Some(item_id) = payment.store_item_id {
                    let decremented = self
                        .repos
                        .store_items
                        .update_one(
                            Filter::id(item_id).gte("stock", payment.quantity),
                            Update::new()
                                .inc("stock", -payment.quantity)
                                .set("updated_at", now),
                        )
                        .await?;
                    match decremented {
                        Some(item) => item_name = item.name,
                        None => tracing::warn!(
                            payment_id = %payment.id,
                            store_item_id = %item_id,
                            quantity = payment.quantity,
                            "Store item oversold; refund required"
                        ),
                    }
                }

                if let Some(campaign_id) = payment.campaign_id {
                    self.repos
                        .campaigns
                        .update_one(
                            Filter::id(campaign_id),
                            Update::new().inc("current_amount", payment.amount),
                        )
                        .await?;
                }

                if let Some(donor) = &donor {
                    self.email
                        .send_purchase_receipt(
                            &donor.name,
                            &donor.email,
                            &item_name,
                            payment.quantity,
                            payment.amount,
                            &payment.currency,
                        )
                        .await;
                }
            }
        }

        self.invalidate().await;
        Ok(())
    }

    /// Record a failed intent unless it already settled
    pub async fn record_failure(&self, intent: &PaymentIntent) -> ServiceResult<()> {
        let message = intent
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| "Payment failed".to_string());

        let updated = self
            .repos
            .payments
            .update_one(
                Filter::all()
                    .eq("stripe_payment_intent_id", intent.id.as_str())
                    .is_in("status", OPEN_STATUSES),
                Update::new()
                    .set("status", PaymentStatus::Failed.as_str())
                    .set("failure_message", message.as_str())
                    .set("updated_at", Utc::now()),
            )
            .await?;
        if updated.is_some() {
            tracing::info!(payment_intent = %intent.id, reason = %message, "Payment failed");
            return Ok(());
        }

        if self
            .repos
            .payments
            .find_one(Filter::all().eq("stripe_payment_intent_id", intent.id.as_str()))
            .await?
            .is_some()
        {
            tracing::debug!(payment_intent = %intent.id, "Ignoring failure for settled payment");
            return Ok(());
        }

        let mut payment = payment_from_intent(intent, PaymentStatus::Failed)?;
        payment.failure_message = Some(message);
        match self.repos.payments.insert(&payment).await {
            Ok(()) | Err(StoreError::Duplicate(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Refunds
    // ========================================================================

    /// Refund a captured payment, fully when `amount` is `None`
    pub async fn refund(&self, actor: &User, payment_id: ObjectId, amount: Option<i64>) -> ServiceResult<Payment> {
        validation::ensure_admin(actor)?;
        let payment = self
            .repos
            .payments
            .get(payment_id)
            .await?
            .or_not_found("Payment")?;
        if !payment.status.is_settled() {
            return Err(ServiceError::validation("Only captured payments can be refunded"));
        }

        let remaining = payment.net_amount();
        if remaining <= 0 {
            return Err(ServiceError::validation("Payment is already fully refunded"));
        }
        let amount = amount.unwrap_or(remaining);
        if amount < 1 || amount > remaining {
            return Err(ServiceError::validation(format!(
                "Refund amount must be between 1 and {}",
                remaining
            )));
        }

        let refund = self
            .gateway
            .create_refund(&payment.stripe_payment_intent_id, Some(amount))
            .await?;
        tracing::info!(
            payment_id = %payment.id,
            refund_id = %refund.id,
            amount = refund.amount,
            by = %actor.id,
            "Refund issued"
        );
        self.apply_refund_total(
            &payment.stripe_payment_intent_id,
            payment.amount_refunded + refund.amount,
        )
        .await
    }

    /// Bring the stored refund total up to `total`, reversing the difference
    pub async fn apply_refund_total(&self, payment_intent_id: &str, total: i64) -> ServiceResult<Payment> {
        for _ in 0..REFUND_RETRIES {
            let payment = self.by_intent(payment_intent_id).await?;
            if !payment.status.is_settled() {
                tracing::warn!(payment_intent = %payment_intent_id, status = %payment.status, "Refund for uncaptured payment ignored");
                return Ok(payment);
            }

            let total = total.min(payment.amount);
            if total <= payment.amount_refunded {
                return Ok(payment);
            }
            let delta = total - payment.amount_refunded;
            let status = if total >= payment.amount {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::PartiallyRefunded
            };

            let Some(updated) = self
                .repos
                .payments
                .update_one(
                    Filter::id(payment.id).eq("amount_refunded", payment.amount_refunded),
                    Update::new()
                        .set("amount_refunded", total)
                        .set("status", status.as_str())
                        .set("updated_at", Utc::now()),
                )
                .await?
            else {
                continue;
            };

            self.reverse(&updated, delta).await?;
            return Ok(updated);
        }

        Err(ServiceError::Conflict(
            "Payment was modified concurrently, try again".to_string(),
        ))
    }

    async fn reverse(&self, payment: &Payment, delta: i64) -> ServiceResult<()> {
        if let Some(campaign_id) = payment.campaign_id {
            self.repos
                .campaigns
                .update_one(
                    Filter::id(campaign_id),
                    Update::new().inc("current_amount", -delta),
                )
                .await?;
        }
        if payment.purpose == PaymentPurpose::Donation {
            self.repos
                .donors
                .update_one(
                    Filter::id(payment.donor_id),
                    Update::new().inc("total_donations", -delta),
                )
                .await?;
        }
        self.invalidate().await;

        if let Some(donor) = self.repos.donors.get(payment.donor_id).await? {
            self.email
                .send_refund_notice(&donor.name, &donor.email, delta, &payment.currency)
                .await;
        }
        Ok(())
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Verify and apply a Stripe webhook delivery
    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> ServiceResult<()> {
        if self.webhook_secret.is_empty() {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Stripe webhook secret is not configured"
            )));
        }
        let event = construct_event(payload, signature, &self.webhook_secret).map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook delivery");
            ServiceError::from(e)
        })?;
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Webhook received");

        match event.event_type.as_str() {
            "payment_intent.succeeded" | "payment_intent.payment_failed" => {
                let intent: PaymentIntent = event.object()?;
                // Intents created elsewhere on the account carry no donor
                if intent.meta("donor_id").is_none() {
                    tracing::warn!(
                        event_id = %event.id,
                        payment_intent = %intent.id,
                        "Ignoring payment intent without platform metadata"
                    );
                    return Ok(());
                }
                if event.event_type == "payment_intent.succeeded" {
                    self.record_success(&intent).await?;
                } else {
                    self.record_failure(&intent).await?;
                }
            }
            "charge.refunded" => {
                let charge: Charge = event.object()?;
                let Some(intent_id) = charge.payment_intent else {
                    tracing::warn!(charge = %charge.id, "Refunded charge has no payment intent");
                    return Ok(());
                };
                match self.apply_refund_total(&intent_id, charge.amount_refunded).await {
                    Ok(_) => {}
                    Err(ServiceError::NotFound(_)) => {
                        tracing::warn!(payment_intent = %intent_id, "Refund for unknown payment");
                    }
                    Err(e) => return Err(e),
                }
            }
            "setup_intent.succeeded" => {
                tracing::info!(event_id = %event.id, "Payment method saved");
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring webhook event");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn by_intent(&self, payment_intent_id: &str) -> ServiceResult<Payment> {
        self.repos
            .payments
            .find_one(Filter::all().eq("stripe_payment_intent_id", payment_intent_id))
            .await?
            .or_not_found("Payment")
    }

    /// A payment visible to its owner or an admin
    pub async fn get(&self, actor: &User, id: ObjectId) -> ServiceResult<Payment> {
        let payment = self.repos.payments.get(id).await?.or_not_found("Payment")?;
        if !actor.is_admin() && payment.user_id != Some(actor.id) {
            return Err(ServiceError::forbidden());
        }
        Ok(payment)
    }

    pub async fn list(&self, actor: &User, status: Option<PaymentStatus>, page: Page) -> ServiceResult<Vec<Payment>> {
        validation::ensure_admin(actor)?;
        let filter = Filter::all().eq_opt("status", status.map(|s| s.as_str()));
        Ok(self
            .repos
            .payments
            .find(Query::new(filter).newest_first().page(page))
            .await?)
    }

    pub async fn my_payments(&self, actor: &User, page: Page) -> ServiceResult<Vec<Payment>> {
        Ok(self
            .repos
            .payments
            .find(Query::new(Filter::all().eq("user_id", actor.id)).newest_first().page(page))
            .await?)
    }

    pub async fn donors(&self, actor: &User, page: Page) -> ServiceResult<Vec<Donor>> {
        validation::ensure_admin(actor)?;
        Ok(self
            .repos
            .donors
            .find(
                Query::new(Filter::all())
                    .sort("total_donations", SortOrder::Descending)
                    .page(page),
            )
            .await?)
    }

    pub async fn donor(&self, actor: &User, id: ObjectId) -> ServiceResult<Option<Donor>> {
        validation::ensure_admin(actor)?;
        Ok(self.repos.donors.get(id).await?)
    }

    /// The donor profile linked to a user account
    pub async fn donor_for_user(&self, user: &User) -> ServiceResult<Option<Donor>> {
        Ok(self
            .repos
            .donors
            .find_one(Filter::all().eq("user_id", user.id))
            .await?)
    }

    pub async fn campaign_donations(&self, campaign_id: ObjectId, page: Page) -> ServiceResult<Vec<Donation>> {
        Ok(self
            .repos
            .donations
            .find(
                Query::new(Filter::all().eq("campaign_id", campaign_id))
                    .newest_first()
                    .page(page),
            )
            .await?)
    }

    pub async fn donor_donations(
        &self,
        donor_id: ObjectId,
        include_anonymous: bool,
        page: Page,
    ) -> ServiceResult<Vec<Donation>> {
        let mut filter = Filter::all().eq("donor_id", donor_id);
        if !include_anonymous {
            filter = filter.eq("anonymous", false);
        }
        Ok(self
            .repos
            .donations
            .find(
                Query::new(filter)
                    .newest_first()
                    .page(page),
            )
            .await?)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern("campaign:*").await {
            tracing::warn!(error = %e, "Failed to invalidate campaign cache");
        }
    }
}

/// Build a payment record from an intent and its metadata
fn payment_from_intent(intent: &PaymentIntent, status: PaymentStatus) -> ServiceResult<Payment> {
    let object_id = |key: &str| -> ServiceResult<Option<ObjectId>> {
        intent
            .meta(key)
            .map(|v| {
                ObjectId::parse_str(v).map_err(|_| {
                    ServiceError::validation(format!("Payment intent has an invalid {}", key))
                })
            })
            .transpose()
    };

    let purpose = intent
        .meta("purpose")
        .map(PaymentPurpose::from_str)
        .transpose()
        .map_err(|e| ServiceError::validation(e.to_string()))?
        .unwrap_or_default();
    let donor_id = object_id("donor_id")?
        .ok_or_else(|| ServiceError::validation("Payment intent has no donor"))?;
    let quantity = intent
        .meta("quantity")
        .and_then(|q| q.parse::<i64>().ok())
        .unwrap_or(1);

    let now = Utc::now();
    Ok(Payment {
        id: ObjectId::new(),
        stripe_payment_intent_id: intent.id.clone(),
        amount: intent.amount,
        currency: intent.currency.to_lowercase(),
        status,
        purpose,
        donor_id,
        campaign_id: object_id("campaign_id")?,
        user_id: object_id("user_id")?,
        store_item_id: object_id("store_item_id")?,
        quantity,
        amount_refunded: 0,
        failure_message: None,
        created_at: now,
        updated_at: now,
    })
}
