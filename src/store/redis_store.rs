use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{Token, TokenStore};

/// Redis-backed token store.
///
/// Key layout:
/// - `{prefix}:session:{session_id}` JSON token, expires with the token
/// - `{prefix}:owner:{owner_id}` set of session ids owned by that login
///
/// Session keys expire on their own; owner sets are pruned of dangling ids
/// whenever they are read.
#[derive(Clone)]
pub struct RedisTokenStore {
    redis: ConnectionManager,
    key_prefix: String,
}

impl RedisTokenStore {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::new(redis, key_prefix))
    }

    pub fn new(redis: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.to_owned(),
        }
    }

    fn session_key(&self, session_id: &str) -> String {
        session_key(&self.key_prefix, session_id)
    }

    fn owner_key(&self, owner_id: &str) -> String {
        owner_key(&self.key_prefix, owner_id)
    }
}

fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}:session:{}", prefix, session_id)
}

fn owner_key(prefix: &str, owner_id: &str) -> String {
    format!("{}:owner:{}", prefix, owner_id)
}

/// TTL for an owner index after adding a session living `token_ttl` seconds.
/// `current` is the redis `TTL` reply (-2 missing, -1 no expiry).
/// The index never expires before any session it lists.
fn owner_index_ttl(current: i64, token_ttl: u64) -> Option<u64> {
    match current {
        -1 => None,
        current if current > 0 => Some(token_ttl.max(current as u64)),
        _ => Some(token_ttl),
    }
}

/// Split MGET replies into live tokens and session ids whose key is gone
fn partition_sessions(
    session_ids: &[String],
    values: Vec<Option<String>>,
    now: DateTime<Utc>,
) -> Result<(Vec<Token>, Vec<String>), StoreError> {
    let mut tokens = Vec::new();
    let mut dangling = Vec::new();
    for (session_id, value) in session_ids.iter().zip(values) {
        match value {
            Some(json) => {
                let token: Token = serde_json::from_str(&json)?;
                if !token.is_expired(now) {
                    tokens.push(token);
                }
            }
            None => dangling.push(session_id.to_owned()),
        }
    }
    Ok((tokens, dangling))
}

impl TokenStore for RedisTokenStore {
    async fn add_token(&self, token: &Token) -> Result<(), StoreError> {
        let ttl_secs = token.remaining(Utc::now()).as_secs();
        if ttl_secs == 0 {
            return Err(StoreError::Expired {
                session_id: token.session_id.to_owned(),
            });
        }
        let json = serde_json::to_string(token)?;
        let session_key = self.session_key(&token.session_id);
        let owner_key = self.owner_key(&token.owner_id);

        let mut conn = self.redis.clone();
        let current_ttl: i64 = conn.ttl(&owner_key).await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(&session_key)
            .arg(json)
            .arg("EX")
            .arg(ttl_secs)
            .ignore()
            .cmd("SADD")
            .arg(&owner_key)
            .arg(&token.session_id)
            .ignore();
        if let Some(index_ttl) = owner_index_ttl(current_ttl, ttl_secs) {
            pipe.cmd("EXPIRE").arg(&owner_key).arg(index_ttl).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        debug!("stored token {} for {} (ttl {}s)", token.session_id, token.owner_id, ttl_secs);
        Ok(())
    }

    async fn get_tokens(&self, owner_ids: &[String]) -> Result<Vec<Token>, StoreError> {
        let now = Utc::now();
        let mut conn = self.redis.clone();
        let mut tokens = Vec::new();

        for owner_id in owner_ids {
            let owner_key = self.owner_key(owner_id);
            let session_ids: Vec<String> = conn.smembers(&owner_key).await?;
            if session_ids.is_empty() {
                continue;
            }

            let keys: Vec<String> = session_ids.iter().map(|id| self.session_key(id)).collect();
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(&keys)
                .query_async::<_, Vec<Option<String>>>(&mut conn)
                .await?;

            let (live, dangling) = partition_sessions(&session_ids, values, now)?;
            tokens.extend(live);
            if !dangling.is_empty() {
                debug!("pruning {} expired session ids of {}", dangling.len(), owner_id);
                conn.srem::<_, _, ()>(&owner_key, dangling).await?;
            }
        }

        Ok(tokens)
    }

    async fn remove_token(&self, session_id: &str) -> Result<(), StoreError> {
        let session_key = self.session_key(session_id);
        let mut conn = self.redis.clone();
        let stored: Option<String> = conn.get(&session_key).await?;
        if let Some(json) = stored {
            let token: Token = serde_json::from_str(&json)?;
            conn.srem::<_, _, ()>(self.owner_key(&token.owner_id), session_id).await?;
        }
        conn.del::<_, ()>(&session_key).await?;
        Ok(())
    }
}
