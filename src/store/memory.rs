use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{Token, TokenStore};

/// Process-local token store: session_id -> token.
/// Expired entries are filtered on read and purged on write.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<HashMap<String, Token>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tokens
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.inner
            .read()
            .await
            .values()
            .filter(|token| !token.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl TokenStore for MemoryTokenStore {
    async fn add_token(&self, token: &Token) -> Result<(), StoreError> {
        let now = Utc::now();
        if token.is_expired(now) {
            return Err(StoreError::Expired {
                session_id: token.session_id.to_owned(),
            });
        }
        let mut map = self.inner.write().await;
        map.retain(|_, stored| !stored.is_expired(now));
        map.insert(token.session_id.to_owned(), token.clone());
        debug!("stored token {} for {}", token.session_id, token.owner_id);
        Ok(())
    }

    async fn get_tokens(&self, owner_ids: &[String]) -> Result<Vec<Token>, StoreError> {
        let now = Utc::now();
        let map = self.inner.read().await;
        Ok(map
            .values()
            .filter(|token| !token.is_expired(now))
            .filter(|token| owner_ids.iter().any(|id| *id == token.owner_id))
            .cloned()
            .collect())
    }

    async fn remove_token(&self, session_id: &str) -> Result<(), StoreError> {
        self.inner.write().await.remove(session_id);
        Ok(())
    }
}
