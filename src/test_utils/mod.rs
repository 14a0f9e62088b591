//! Test doubles for every collaborator trait.

pub mod mocks;

pub use mocks::{MockBlockchainClient, MockConfig, MockDatabaseClient, MockWalletSigner};
