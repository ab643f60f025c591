//! Payment model
//!
//! One record per Stripe PaymentIntent. The intent id is unique, which is what
//! makes success recording idempotent across the webhook and explicit
//! confirmation paths.

use async_graphql::{Enum, InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{Entity, IndexSpec};

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub stripe_payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub purpose: PaymentPurpose,
    pub donor_id: ObjectId,
    pub campaign_id: Option<ObjectId>,
    pub user_id: Option<ObjectId>,
    pub store_item_id: Option<ObjectId>,
    pub quantity: i64,
    /// Cumulative refunded amount as last reported by Stripe
    pub amount_refunded: i64,
    pub failure_message: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn net_amount(&self) -> i64 {
        self.amount - self.amount_refunded
    }
}

impl Entity for Payment {
    const COLLECTION: &'static str = "payments";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[
            IndexSpec {
                fields: &["stripe_payment_intent_id"],
                unique: true,
            },
            IndexSpec {
                fields: &["user_id"],
                unique: false,
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    /// Money was captured (possibly partially returned since)
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    #[default]
    Donation,
    StorePurchase,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Donation => "donation",
            PaymentPurpose::StorePurchase => "store_purchase",
        }
    }
}

impl FromStr for PaymentPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donation" => Ok(PaymentPurpose::Donation),
            "store_purchase" => Ok(PaymentPurpose::StorePurchase),
            _ => Err(anyhow::anyhow!("Invalid payment purpose: {}", s)),
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct CreatePaymentIntentInput {
    /// Amount in minor units
    pub amount: i64,
    pub currency: Option<String>,
    pub campaign_id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub message: Option<String>,
    pub anonymous: Option<bool>,
}

/// What the client needs to confirm a PaymentIntent
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct PaymentIntentPayload {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct SetupIntentPayload {
    pub client_secret: String,
    pub setup_intent_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            bson::to_bson(&PaymentStatus::PartiallyRefunded).unwrap(),
            bson::Bson::String(PaymentStatus::PartiallyRefunded.as_str().to_string())
        );
        assert_eq!(
            bson::to_bson(&PaymentPurpose::StorePurchase).unwrap(),
            bson::Bson::String("store_purchase".into())
        );
    }

    #[test]
    fn test_settled_states() {
        assert!(PaymentStatus::Succeeded.is_settled());
        assert!(PaymentStatus::PartiallyRefunded.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
    }
}
