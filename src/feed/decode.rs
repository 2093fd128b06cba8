use thiserror::Error;

use crate::domain::{
    error::DomainError,
    orders::{Order, ensure_identified},
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed order payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

impl DecodeError {
    /// Metric label for the drop reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Invalid(_) => "invalid",
        }
    }
}

pub fn decode_order(payload: &[u8]) -> Result<Order, DecodeError> {
    let order: Order = serde_json::from_slice(payload)?;
    ensure_identified(&order)?;
    Ok(order)
}
