//! orderline: ingest orders from Kafka, persist them in Postgres and serve
//! cached lookups over HTTP.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod feed;
pub mod infra;
pub mod shutdown;
