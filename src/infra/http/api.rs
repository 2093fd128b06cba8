use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::domain::orders::Order;

use super::{ApiState, error::ApiError};

const SOURCE: &str = "infra::http::api::get_order";

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub cache_size: usize,
    pub cache_capacity: usize,
}

pub async fn get_order(
    State(state): State<ApiState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Arc<Order>>, ApiError> {
    let order_uid = order_uid.trim();
    if order_uid.is_empty() {
        return Err(ApiError::bad_request("Order uid is required"));
    }

    match state.orders.get_order(order_uid).await {
        Ok(Some(order)) => Ok(Json(order)),
        Ok(None) => Err(ApiError::not_found(
            "Order not found",
            format!("order `{order_uid}` not found"),
        )),
        Err(err) => Err(ApiError::from_repo(SOURCE, &err)),
    }
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthBody> {
    let stats = state.orders.cache_stats();
    Json(HealthBody {
        status: "ok",
        cache_size: stats.size,
        cache_capacity: stats.capacity,
    })
}
