//! The order aggregate and the checks every accepted order must pass.

pub use orderline_api_types::{Delivery, Item, Order, Payment};

use time::OffsetDateTime;

use super::error::DomainError;

/// Bring an accepted order to the form the store keeps: `order_uid` without
/// surrounding whitespace and `date_created` at microsecond precision.
pub fn normalize(mut order: Order) -> Order {
    let order_uid = order.order_uid.trim();
    if order_uid.len() != order.order_uid.len() {
        order.order_uid = order_uid.to_string();
    }
    order.date_created = truncate_to_micros(order.date_created);
    order
}

fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_nanosecond(at.nanosecond() / 1_000 * 1_000)
        .unwrap_or(at)
}

/// Reject orders that cannot be keyed in the cache or the store.
pub fn ensure_identified(order: &Order) -> Result<(), DomainError> {
    if order.has_uid() {
        Ok(())
    } else {
        Err(DomainError::validation("`order_uid` must not be empty"))
    }
}

/// Item positions are stored as `INTEGER`; anything beyond that cannot round-trip.
pub fn ensure_storable(order: &Order) -> Result<(), DomainError> {
    if i32::try_from(order.items.len()).is_err() {
        return Err(DomainError::invariant(format!(
            "order `{}` has {} items which exceeds the storable maximum",
            order.order_uid,
            order.items.len()
        )));
    }
    Ok(())
}
