#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use orderline::application::repos::{OrdersRepo, RepoError};
use orderline::domain::orders::{Delivery, Item, Order, Payment};
use time::{Duration, macros::datetime};

#[derive(Default)]
pub struct MemoryRepo {
    orders: Mutex<HashMap<String, Order>>,
    pub fail_saves: AtomicBool,
    pub fail_reads: AtomicBool,
    pub saves: AtomicUsize,
    pub finds: AtomicUsize,
}

impl MemoryRepo {
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let repo = Self::default();
        {
            let mut stored = repo.orders.lock().expect("orders lock");
            for order in orders {
                stored.insert(order.order_uid.clone(), order);
            }
        }
        repo
    }

    pub fn stored(&self, order_uid: &str) -> Option<Order> {
        self.orders
            .lock()
            .expect("orders lock")
            .get(order_uid)
            .cloned()
    }

    pub fn set_failing(&self, saves: bool, reads: bool) {
        self.fail_saves.store(saves, Ordering::SeqCst);
        self.fail_reads.store(reads, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrdersRepo for MemoryRepo {
    async fn save_order(&self, order: &Order) -> Result<(), RepoError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .expect("orders lock")
            .insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(self.stored(order_uid))
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .expect("orders lock")
            .values()
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(orders)
    }
}

pub fn sample_order(uid: &str, minutes: i64) -> Order {
    Order {
        order_uid: uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1937,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 437,
            custom_fee: 0,
        },
        items: vec![
            Item {
                chrt_id: 9_934_930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2_389_212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            },
            Item {
                chrt_id: 9_934_931,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 120,
                rid: "ab4219087a764ae0btest2".to_string(),
                name: "Lipstick".to_string(),
                sale: 0,
                size: "0".to_string(),
                total_price: 120,
                nm_id: 2_389_213,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            },
        ],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: datetime!(2021-11-26 06:22:19 UTC) + Duration::minutes(minutes),
        oof_shard: "1".to_string(),
    }
}
