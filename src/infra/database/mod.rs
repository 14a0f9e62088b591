//! Deposit and strategy persistence.

pub mod postgres;
pub mod rest;

pub use postgres::{PostgresClient, PostgresConfig};
pub use rest::RestDepositStore;
