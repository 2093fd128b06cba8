use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, Transaction, query, query_as};
use time::OffsetDateTime;

use crate::application::repos::{OrdersRepo, RepoError};
use crate::domain::orders::{Delivery, Item, Order, Payment, ensure_storable};

use super::{PgOrderStore, map_sqlx_error};

const ORDER_SELECT: &str = "SELECT \
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature, o.customer_id, \
        o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard, \
        d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip, \
        d.city AS delivery_city, d.address AS delivery_address, d.region AS delivery_region, \
        d.email AS delivery_email, \
        p.transaction AS payment_transaction, p.request_id AS payment_request_id, \
        p.currency AS payment_currency, p.provider AS payment_provider, \
        p.amount AS payment_amount, p.payment_dt AS payment_dt, p.bank AS payment_bank, \
        p.delivery_cost AS payment_delivery_cost, p.goods_total AS payment_goods_total, \
        p.custom_fee AS payment_custom_fee \
    FROM orders o \
    JOIN deliveries d ON d.order_uid = o.order_uid \
    JOIN payments p ON p.order_uid = o.order_uid";

const ITEM_COLUMNS: &str = "order_uid, chrt_id, track_number, price, rid, name, sale, size, \
    total_price, nm_id, brand, status";

#[derive(Debug, FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: OffsetDateTime,
    oof_shard: String,
    delivery_name: String,
    delivery_phone: String,
    delivery_zip: String,
    delivery_city: String,
    delivery_address: String,
    delivery_region: String,
    delivery_email: String,
    payment_transaction: String,
    payment_request_id: String,
    payment_currency: String,
    payment_provider: String,
    payment_amount: i32,
    payment_dt: i64,
    payment_bank: String,
    payment_delivery_cost: i32,
    payment_goods_total: i32,
    payment_custom_fee: i32,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    order_uid: String,
    chrt_id: i64,
    track_number: String,
    price: i32,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i32,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl OrderRow {
    fn into_order(self, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.payment_transaction,
                request_id: self.payment_request_id,
                currency: self.payment_currency,
                provider: self.payment_provider,
                amount: self.payment_amount,
                payment_dt: self.payment_dt,
                bank: self.payment_bank,
                delivery_cost: self.payment_delivery_cost,
                goods_total: self.payment_goods_total,
                custom_fee: self.payment_custom_fee,
            },
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

impl PgOrderStore {
    /// Read-only transaction in which every statement sees the same snapshot,
    /// so an order and its items are never read across a concurrent replace.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, RepoError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(tx)
    }
}

#[async_trait]
impl OrdersRepo for PgOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), RepoError> {
        ensure_storable(order)?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Children go with the parent through ON DELETE CASCADE.
        query("DELETE FROM orders WHERE order_uid = $1")
            .bind(&order.order_uid)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        insert_order(&mut tx, order).await?;
        insert_delivery(&mut tx, &order.order_uid, &order.delivery).await?;
        insert_payment(&mut tx, &order.order_uid, &order.payment).await?;
        insert_items(&mut tx, &order.order_uid, &order.items).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, RepoError> {
        let mut tx = self.begin_snapshot().await?;

        let Some(row) = fetch_order_row(&mut tx, order_uid).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut tx, order_uid).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(Some(row.into_order(items)))
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepoError> {
        let mut tx = self.begin_snapshot().await?;

        let sql = format!("{ORDER_SELECT} ORDER BY o.date_created DESC, o.order_uid");
        let rows = query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY order_uid, position");
        let item_rows = query_as::<_, ItemRow>(&sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        let mut items_by_order: HashMap<String, Vec<Item>> = HashMap::with_capacity(rows.len());
        for row in item_rows {
            items_by_order
                .entry(row.order_uid.clone())
                .or_default()
                .push(Item::from(row));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.order_uid).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

async fn fetch_order_row(
    conn: &mut PgConnection,
    order_uid: &str,
) -> Result<Option<OrderRow>, RepoError> {
    let sql = format!("{ORDER_SELECT} WHERE o.order_uid = $1");
    query_as::<_, OrderRow>(&sql)
        .bind(order_uid)
        .fetch_optional(conn)
        .await
        .map_err(map_sqlx_error)
}

async fn fetch_items(conn: &mut PgConnection, order_uid: &str) -> Result<Vec<Item>, RepoError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE order_uid = $1 ORDER BY position");
    let rows = query_as::<_, ItemRow>(&sql)
        .bind(order_uid)
        .fetch_all(conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rows.into_iter().map(Item::from).collect())
}

async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), RepoError> {
    query(
        r#"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature, customer_id,
            delivery_service, shardkey, sm_id, date_created, oof_shard
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn insert_delivery(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    delivery: &Delivery,
) -> Result<(), RepoError> {
    query(
        r#"
        INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    payment: &Payment,
) -> Result<(), RepoError> {
    query(
        r#"
        INSERT INTO payments (
            order_uid, transaction, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order_uid)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    items: &[Item],
) -> Result<(), RepoError> {
    if items.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO items (order_uid, position, chrt_id, track_number, price, rid, name, sale, \
         size, total_price, nm_id, brand, status) ",
    );
    builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        row.push_bind(order_uid)
            .push_bind(position as i32)
            .push_bind(item.chrt_id)
            .push_bind(&item.track_number)
            .push_bind(item.price)
            .push_bind(&item.rid)
            .push_bind(&item.name)
            .push_bind(item.sale)
            .push_bind(&item.size)
            .push_bind(item.total_price)
            .push_bind(item.nm_id)
            .push_bind(&item.brand)
            .push_bind(item.status);
    });

    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}
