//! BSON date encoding for optional chrono timestamps.
//!
//! Required timestamps use `bson::serde_helpers::chrono_datetime_as_bson_datetime`
//! directly; this module covers `Option<DateTime<Utc>>` so range filters work on
//! both kinds the same way.

use bson::DateTime as BsonDateTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(dt) => BsonDateTime::from_chrono(*dt).serialize(serializer),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<BsonDateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
}
