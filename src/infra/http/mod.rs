//! HTTP surface: order lookup and health check.

pub mod api;
mod error;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::RequestContext;

use std::sync::Arc;

use axum::{Router, middleware::from_fn, routing::get};

use crate::application::orders::OrderService;

#[derive(Clone)]
pub struct ApiState {
    pub orders: Arc<OrderService>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/order/{order_uid}", get(api::get_order))
        .route("/api/health", get(api::health))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
}
