//! Wire types for the order aggregate.
//!
//! The JSON shape is shared by the Kafka feed, the HTTP API and the seed
//! producer. Field names follow the feed encoding; `order_id` and
//! `shard_key` are accepted as aliases on decode.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::datetime};

/// A complete order: scalar attributes plus exactly one delivery, exactly one
/// payment and an ordered list of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, alias = "order_id")]
    pub order_uid: String,
    #[serde(default)]
    pub track_number: String,
    #[serde(default)]
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default, alias = "shard_key")]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i32,
    /// Absent on the wire decodes as `0001-01-01T00:00:00Z`.
    #[serde(with = "time::serde::rfc3339", default = "unset_date_created")]
    pub date_created: OffsetDateTime,
    #[serde(default)]
    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i32,
    /// Unix timestamp in seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i32,
    pub goods_total: i32,
    pub custom_fee: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i32,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i32,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

fn unset_date_created() -> OffsetDateTime {
    datetime!(0001-01-01 00:00 UTC)
}

impl Order {
    /// True when the order carries a usable identifier.
    pub fn has_uid(&self) -> bool {
        !self.order_uid.trim().is_empty()
    }
}
