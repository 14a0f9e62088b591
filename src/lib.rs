//! Solana yield aggregator: a deposit/strategy backend and the client-side
//! deposit/withdraw transaction flow.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
