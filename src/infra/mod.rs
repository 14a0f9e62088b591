//! Infrastructure layer implementations.

pub mod blockchain;
pub mod cache;
pub mod database;
pub mod wallet;

pub use blockchain::{RpcBlockchainClient, RpcClientConfig};
pub use cache::{CachedDepositStore, DepositCacheConfig};
pub use database::{PostgresClient, PostgresConfig, RestDepositStore};
pub use wallet::{KeypairWallet, signing_key_from_base58};
