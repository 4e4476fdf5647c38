/// Store module
///
/// Durable keyed storage for tokens with expiry-based eviction, and a factory
/// to build the configured backend.
pub mod memory;
pub mod redis_store;
pub mod token;

use std::future::Future;

use tracing::info;

use crate::config::types::StoreConfig;
use crate::error::StoreError;

pub use memory::MemoryTokenStore;
pub use redis_store::RedisTokenStore;
pub use token::Token;

pub trait TokenStore: Send + Sync + 'static {
    /// Upsert a token; the backend evicts it at `token.expiry`
    fn add_token(&self, token: &Token) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All stored, non-expired tokens owned by one of `owner_ids`
    fn get_tokens(
        &self,
        owner_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Token>, StoreError>> + Send;

    fn remove_token(&self, session_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Store backend selected by `store.type`
#[derive(Clone)]
pub enum StoreKind {
    Memory(MemoryTokenStore),
    Redis(RedisTokenStore),
}

impl StoreKind {
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        match config {
            StoreConfig::Memory => {
                info!("using in-memory token store");
                Ok(StoreKind::Memory(MemoryTokenStore::new()))
            }
            StoreConfig::Redis { url, key_prefix } => {
                info!("connecting redis token store, key prefix '{}'", key_prefix);
                let store = RedisTokenStore::connect(url, key_prefix).await?;
                Ok(StoreKind::Redis(store))
            }
        }
    }
}

impl TokenStore for StoreKind {
    async fn add_token(&self, token: &Token) -> Result<(), StoreError> {
        match self {
            StoreKind::Memory(store) => store.add_token(token).await,
            StoreKind::Redis(store) => store.add_token(token).await,
        }
    }

    async fn get_tokens(&self, owner_ids: &[String]) -> Result<Vec<Token>, StoreError> {
        match self {
            StoreKind::Memory(store) => store.get_tokens(owner_ids).await,
            StoreKind::Redis(store) => store.get_tokens(owner_ids).await,
        }
    }

    async fn remove_token(&self, session_id: &str) -> Result<(), StoreError> {
        match self {
            StoreKind::Memory(store) => store.remove_token(session_id).await,
            StoreKind::Redis(store) => store.remove_token(session_id).await,
        }
    }
}
