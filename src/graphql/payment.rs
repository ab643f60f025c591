//! Donations, payments and refunds

use async_graphql::{Context, Object, Result, ResultExt};
use bson::oid::ObjectId;

use super::context::{page, ContextExt};
use crate::models::{CreatePaymentIntentInput, Donor, Payment, PaymentIntentPayload, PaymentStatus, SetupIntentPayload};

#[derive(Default)]
pub struct PaymentQuery;

#[Object]
impl PaymentQuery {
    async fn payments(
        &self,
        ctx: &Context<'_>,
        status: Option<PaymentStatus>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Payment>> {
        let actor = ctx.require_user()?;
        ctx.services()
            .payments
            .list(actor, status, page(limit, offset))
            .await
            .extend()
    }

    async fn payment(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Payment> {
        let actor = ctx.require_user()?;
        ctx.services().payments.get(actor, id).await.extend()
    }

    async fn my_payments(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<Payment>> {
        let actor = ctx.require_user()?;
        ctx.services()
            .payments
            .my_payments(actor, page(limit, offset))
            .await
            .extend()
    }

    /// Donor profile linked to the current account
    async fn my_donor_profile(&self, ctx: &Context<'_>) -> Result<Option<Donor>> {
        let actor = ctx.require_user()?;
        ctx.services().payments.donor_for_user(actor).await.extend()
    }

    async fn donors(&self, ctx: &Context<'_>, limit: Option<i32>, offset: Option<i32>) -> Result<Vec<Donor>> {
        let actor = ctx.require_user()?;
        ctx.services()
            .payments
            .donors(actor, page(limit, offset))
            .await
            .extend()
    }

    async fn donor(&self, ctx: &Context<'_>, id: ObjectId) -> Result<Option<Donor>> {
        let actor = ctx.require_user()?;
        ctx.services().payments.donor(actor, id).await.extend()
    }
}

#[derive(Default)]
pub struct PaymentMutation;

#[Object]
impl PaymentMutation {
    /// Start a donation; anonymous visitors may donate too
    async fn create_payment_intent(
        &self,
        ctx: &Context<'_>,
        input: CreatePaymentIntentInput,
    ) -> Result<PaymentIntentPayload> {
        ctx.services()
            .payments
            .create_payment_intent(ctx.viewer(), input)
            .await
            .extend()
    }

    /// Record a payment the client has completed
    async fn confirm_payment(&self, ctx: &Context<'_>, payment_intent_id: String) -> Result<Payment> {
        ctx.services()
            .payments
            .confirm_payment(&payment_intent_id)
            .await
            .extend()
    }

    async fn create_setup_intent(&self, ctx: &Context<'_>) -> Result<SetupIntentPayload> {
        let actor = ctx.require_user()?;
        ctx.services().payments.create_setup_intent(actor).await.extend()
    }

    /// Full refund unless an amount is given
    async fn refund_payment(&self, ctx: &Context<'_>, payment_id: ObjectId, amount: Option<i64>) -> Result<Payment> {
        let actor = ctx.require_user()?;
        ctx.services()
            .payments
            .refund(actor, payment_id, amount)
            .await
            .extend()
    }
}
