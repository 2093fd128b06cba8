//! Sample orders for exercising a running pipeline.

use rand::Rng;
use time::OffsetDateTime;

use crate::domain::orders::{Delivery, Item, Order, Payment};

const TRACK_NUMBER: &str = "WBILMTESTTRACK";

/// Build a plausible order whose identifier is unique per `index` and second.
pub fn generate_test_order(index: usize) -> Order {
    generate_test_order_at(index, OffsetDateTime::now_utc())
}

pub fn generate_test_order_at(index: usize, now: OffsetDateTime) -> Order {
    let mut rng = rand::thread_rng();
    let order_uid = format!("test_order_{}_{index}", now.unix_timestamp());

    let item_count = rng.gen_range(1..=3);
    let items: Vec<Item> = (0..item_count)
        .map(|position| {
            let price = rng.gen_range(100..=5_000);
            let sale = rng.gen_range(0..=50);
            Item {
                chrt_id: 9_934_930 + i64::from(position),
                track_number: TRACK_NUMBER.to_string(),
                price,
                rid: format!("{order_uid}_rid_{position}"),
                name: format!("Test item {position}"),
                sale,
                size: "0".to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: 2_389_212 + i64::from(position),
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }
        })
        .collect();

    let goods_total: i32 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = 1_500;

    Order {
        order_uid: order_uid.clone(),
        track_number: TRACK_NUMBER.to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: format!("Test Customer {index}"),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: format!("Ploshad Mira {}", index + 1),
            region: "Kraiot".to_string(),
            email: format!("customer{index}@example.com"),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: now.unix_timestamp(),
            bank: "alpha".to_string(),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: format!("customer{index}"),
        delivery_service: "meest".to_string(),
        shardkey: (index % 10).to_string(),
        sm_id: 99,
        date_created: now,
        oof_shard: "1".to_string(),
    }
}
