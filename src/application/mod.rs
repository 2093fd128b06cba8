//! Application services: ingestion, read path and seed data.

pub mod error;
pub mod orders;
pub mod repos;
pub mod seed;
