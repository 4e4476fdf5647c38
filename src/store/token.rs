use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live issuer session for one credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// unique key, issuer-assigned
    pub session_id: String,
    /// service the token authenticates against
    pub app_id: String,
    /// `Credential::id` that produced it
    pub owner_id: String,
    pub value: String,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// Time left until expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expiry - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("session_id", &self.session_id)
            .field("app_id", &self.app_id)
            .field("owner_id", &self.owner_id)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
