//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{error::DomainError, orders::Order};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable storage for whole order aggregates.
#[async_trait]
pub trait OrdersRepo: Send + Sync {
    /// Write the order with its delivery, payment and items in one transaction,
    /// fully replacing any prior version with the same `order_uid`.
    async fn save_order(&self, order: &Order) -> Result<(), RepoError>;

    /// `Ok(None)` when no order with that identifier exists.
    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, RepoError>;

    /// Every stored order, newest `date_created` first.
    async fn list_all(&self) -> Result<Vec<Order>, RepoError>;
}
