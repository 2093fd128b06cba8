//! Postgres order store.

mod orders;
mod util;

pub use util::map_sqlx_error;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};
use tracing::info;

use crate::config::DatabaseSettings;
use crate::infra::error::InfraError;

/// Orders persisted across the `orders`, `deliveries`, `payments` and `items` tables.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Wrap a pool whose schema is already in place.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, apply the order schema and check the store answers.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        let url = settings.url.as_deref().ok_or_else(|| {
            InfraError::configuration(
                "database.url must be configured (set ORDERLINE__DATABASE__URL or --database-url)",
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .connect(url)
            .await
            .map_err(|err| InfraError::database(format!("failed to connect: {err}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| InfraError::database(format!("failed to apply order schema: {err}")))?;

        query("SELECT 1 FROM orders LIMIT 1")
            .execute(&pool)
            .await
            .map_err(|err| InfraError::database(format!("order store is not readable: {err}")))?;

        info!(
            target = "orderline::infra::db",
            max_connections = settings.max_connections.get(),
            "Order store ready"
        );
        Ok(Self::new(pool))
    }
}
